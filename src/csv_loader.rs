use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::errors::DatasetError;
use crate::labels::NUM_CLASSES;

/// One row of a dataset manifest (`Test.csv`). Other columns are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ManifestEntry {
    #[serde(rename = "ClassId")]
    pub class_id: usize,
    /// Image path relative to the dataset root
    #[serde(rename = "Path")]
    pub path: PathBuf,
}

pub fn load_manifest(path: &Path) -> Result<Vec<ManifestEntry>, DatasetError> {
    let file = std::fs::File::open(path)?;
    read_manifest(file)
}

pub fn read_manifest<R: Read>(source: R) -> Result<Vec<ManifestEntry>, DatasetError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(source);

    let mut entries = Vec::new();
    for (row, result) in reader.deserialize().enumerate() {
        let entry: ManifestEntry = result?;
        if entry.class_id >= NUM_CLASSES {
            return Err(DatasetError::ClassOutOfRange {
                row: row + 1,
                class_id: entry.class_id,
            });
        }
        entries.push(entry);
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = "\
Width,Height,Roi.X1,Roi.Y1,Roi.X2,Roi.Y2,ClassId,Path
53,54,6,5,48,49,16,Test/00000.png
42,45,5,5,36,40,1,Test/00001.png
48,52,6,6,43,47,38,Test/00002.png
";

    #[test]
    fn test_reads_class_and_path_columns() {
        let entries = read_manifest(MANIFEST.as_bytes()).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].class_id, 16);
        assert_eq!(entries[0].path, PathBuf::from("Test/00000.png"));
        assert_eq!(entries[2].class_id, 38);
    }

    #[test]
    fn test_column_order_does_not_matter() {
        let csv = "Path,ClassId\nTest/a.png,14\n";
        let entries = read_manifest(csv.as_bytes()).unwrap();
        assert_eq!(entries, vec![ManifestEntry { class_id: 14, path: "Test/a.png".into() }]);
    }

    #[test]
    fn test_rejects_unknown_class() {
        let csv = "ClassId,Path\n3,a.png\n43,b.png\n";
        match read_manifest(csv.as_bytes()) {
            Err(DatasetError::ClassOutOfRange { row, class_id }) => {
                assert_eq!(row, 2);
                assert_eq!(class_id, 43);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_missing_column_is_error() {
        let csv = "Width,Path\n3,a.png\n";
        assert!(matches!(read_manifest(csv.as_bytes()), Err(DatasetError::Manifest(_))));
    }
}
