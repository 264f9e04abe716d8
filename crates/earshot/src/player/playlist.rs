//! Playlist discovery
//!
//! Walks a music directory once at startup and collects playable files in a
//! stable order.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{PlayerError, Result};

/// One playable file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub path: PathBuf,
    /// Display name (the file name)
    pub label: String,
}

impl Track {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, label }
    }

    /// Lowercased file extension, if any
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

/// Ordered, immutable list of tracks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Playlist {
    root: PathBuf,
    tracks: Vec<Track>,
}

impl Playlist {
    pub fn new(root: impl Into<PathBuf>, tracks: Vec<Track>) -> Self {
        Self {
            root: root.into(),
            tracks,
        }
    }

    /// Directory the playlist was discovered from
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Track> {
        self.tracks.iter()
    }
}

impl<'a> IntoIterator for &'a Playlist {
    type Item = &'a Track;
    type IntoIter = std::slice::Iter<'a, Track>;

    fn into_iter(self) -> Self::IntoIter {
        self.tracks.iter()
    }
}

/// Check whether `path` has one of `extensions` (case-insensitive, no dot)
pub fn has_supported_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|s| s.eq_ignore_ascii_case(ext)))
}

/// Recursively collect files under `root` whose extension is supported.
///
/// Entries are visited sorted by file name, so the order is stable across
/// runs. Any traversal error aborts discovery.
pub fn discover(root: &Path, extensions: &[String]) -> Result<Playlist> {
    let mut tracks = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|source| PlayerError::Scan {
            root: root.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() && has_supported_extension(entry.path(), extensions) {
            tracks.push(Track::new(entry.into_path()));
        }
    }

    log::info!("Found {} playable files in {}", tracks.len(), root.display());
    Ok(Playlist::new(root, tracks))
}
