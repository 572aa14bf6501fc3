//! Loaded image history for the interactive shell
//!
//! Ordered list of decoded images, de-duplicated by path. Opening a path that
//! is already present moves it to the end, and the newest entry is selected.

use image::DynamicImage;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub path: PathBuf,
    pub image: DynamicImage,
}

impl HistoryEntry {
    /// File name shown in listings
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

#[derive(Debug, Default)]
pub struct ImageHistory {
    entries: Vec<HistoryEntry>,
    selected: Option<usize>,
}

impl ImageHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or move to the end) and select the entry. Returns its index.
    pub fn push(&mut self, path: PathBuf, image: DynamicImage) -> usize {
        if let Some(pos) = self.position(&path) {
            self.entries.remove(pos);
        }
        self.entries.push(HistoryEntry { path, image });
        let index = self.entries.len() - 1;
        self.selected = Some(index);
        index
    }

    /// Select by index; returns the entry when the index exists.
    pub fn select(&mut self, index: usize) -> Option<&HistoryEntry> {
        if index < self.entries.len() {
            self.selected = Some(index);
            self.entries.get(index)
        } else {
            None
        }
    }

    pub fn selected(&self) -> Option<&HistoryEntry> {
        self.selected.and_then(|i| self.entries.get(i))
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn position(&self, path: &Path) -> Option<usize> {
        self.entries.iter().position(|e| e.path == path)
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
