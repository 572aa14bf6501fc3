//! Model archive persistence
//!
//! A trained model is one tar.gz file:
//! - metadata.json - [`ModelMetadata`]
//! - model.bin     - framework weights (opaque bytes)

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tar::{Archive, Builder};

use crate::model::model_metadata::ModelMetadata;

const METADATA_ENTRY: &str = "metadata.json";
const WEIGHTS_ENTRY: &str = "model.bin";

/// Path the archive is actually written to (`.tar.gz` appended unless the
/// path already ends in `.gz`).
pub fn archive_path(output_path: &Path) -> PathBuf {
    if output_path.extension().and_then(|s| s.to_str()) == Some("gz") {
        output_path.to_path_buf()
    } else {
        output_path.with_extension("tar.gz")
    }
}

/// Write metadata and weights into one tar.gz. Returns the written path.
pub fn save_model_archive(
    output_path: &Path,
    metadata: &ModelMetadata,
    weights: &[u8],
) -> Result<PathBuf> {
    let tar_gz_path = archive_path(output_path);

    if let Some(parent) = tar_gz_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create parent directory: {:?}", parent))?;
    }

    let tar_gz_file = File::create(&tar_gz_path)
        .with_context(|| format!("Failed to create tar.gz file: {:?}", tar_gz_path))?;
    let encoder = GzEncoder::new(tar_gz_file, Compression::default());
    let mut tar_builder = Builder::new(encoder);

    let json = metadata.to_json_string()?;
    append_entry(&mut tar_builder, METADATA_ENTRY, json.as_bytes())?;
    append_entry(&mut tar_builder, WEIGHTS_ENTRY, weights)?;

    tar_builder
        .into_inner()
        .context("Failed to finalize tar archive")?
        .finish()
        .context("Failed to finalize gzip stream")?;

    Ok(tar_gz_path)
}

fn append_entry<W: std::io::Write>(builder: &mut Builder<W>, name: &str, data: &[u8]) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_path(name)?;
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append(&header, data)
        .with_context(|| format!("Failed to add {} to tar", name))
}

fn open_archive(tar_gz_path: &Path) -> Result<Archive<GzDecoder<File>>> {
    let file = File::open(tar_gz_path)
        .with_context(|| format!("Failed to open model archive: {:?}", tar_gz_path))?;
    Ok(Archive::new(GzDecoder::new(file)))
}

/// Read only the metadata of a model archive.
pub fn load_metadata(tar_gz_path: &Path) -> Result<ModelMetadata> {
    let mut archive = open_archive(tar_gz_path)?;

    for entry in archive.entries()? {
        let mut entry = entry?;
        if entry.path()?.to_str() == Some(METADATA_ENTRY) {
            let mut json = String::new();
            entry.read_to_string(&mut json)?;
            return ModelMetadata::from_json_string(&json);
        }
    }

    Err(anyhow::anyhow!("{} not found in model archive", METADATA_ENTRY))
}

/// Read metadata and weights together.
pub fn load_model_archive(tar_gz_path: &Path) -> Result<(ModelMetadata, Vec<u8>)> {
    let mut archive = open_archive(tar_gz_path)?;

    let mut metadata = None;
    let mut weights = None;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.to_string_lossy().to_string();

        match path.as_str() {
            METADATA_ENTRY => {
                let mut json = String::new();
                entry.read_to_string(&mut json)?;
                metadata = Some(ModelMetadata::from_json_string(&json)?);
            }
            WEIGHTS_ENTRY => {
                let mut buffer = Vec::new();
                entry.read_to_end(&mut buffer)?;
                weights = Some(buffer);
            }
            _ => {}
        }
    }

    match (metadata, weights) {
        (Some(metadata), Some(weights)) => Ok((metadata, weights)),
        (None, _) => Err(anyhow::anyhow!("{} not found in model archive", METADATA_ENTRY)),
        (_, None) => Err(anyhow::anyhow!("{} not found in model archive", WEIGHTS_ENTRY)),
    }
}

/// Multi-line human readable summary of the metadata
pub fn describe_metadata(metadata: &ModelMetadata) -> String {
    format!(
        "classes: {}\ninput: {}x{} ({})\nepochs: {}\nbatch size: {}\nlearning rate: {}\ntraining samples: {}\ntrained at: {}",
        metadata.class_labels.len(),
        metadata.model_input_size,
        metadata.model_input_size,
        metadata.channel_order,
        metadata.num_epochs,
        metadata.batch_size,
        metadata.learning_rate,
        metadata.train_samples,
        metadata.trained_at,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::ChannelOrder;

    #[test]
    fn test_archive_path_extension() {
        assert_eq!(archive_path(Path::new("models/sign")), PathBuf::from("models/sign.tar.gz"));
        assert_eq!(
            archive_path(Path::new("models/sign.tar.gz")),
            PathBuf::from("models/sign.tar.gz")
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = ModelMetadata::new(ChannelOrder::Bgr, 3);
        let weights = vec![1u8, 2, 3, 4, 5];

        let written = save_model_archive(&dir.path().join("nested/model"), &metadata, &weights).unwrap();
        assert!(written.ends_with("model.tar.gz"));

        assert_eq!(load_metadata(&written).unwrap(), metadata);
        let (loaded_metadata, loaded_weights) = load_model_archive(&written).unwrap();
        assert_eq!(loaded_metadata.channel_order, ChannelOrder::Bgr);
        assert_eq!(loaded_weights, weights);
    }

    #[test]
    fn test_missing_archive() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_model_archive(&dir.path().join("absent.tar.gz")).is_err());
    }
}
