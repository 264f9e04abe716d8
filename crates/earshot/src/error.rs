//! Error types for Earshot
//!
//! Centralized error handling using thiserror.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the Earshot player
#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Could not scan {}: {source}", root.display())]
    Scan {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("No playable files found in {}", .0.display())]
    EmptyPlaylist(PathBuf),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for Earshot
pub type Result<T> = std::result::Result<T, PlayerError>;

impl PlayerError {
    /// Whether this error should abort the whole run rather than one track
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PlayerError::Audio(_)
                | PlayerError::Scan { .. }
                | PlayerError::EmptyPlaylist(_)
                | PlayerError::Config(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_display() {
        let err = PlayerError::Decode("no audio track".to_string());
        assert_eq!(err.to_string(), "Decode error: no audio track");
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: PlayerError = io.into();
        assert!(matches!(err, PlayerError::Io(_)));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn fatal_classification() {
        assert!(PlayerError::Audio("no device".into()).is_fatal());
        assert!(PlayerError::Config("bad".into()).is_fatal());
        assert!(!PlayerError::Decode("bad frame".into()).is_fatal());
        assert!(PlayerError::EmptyPlaylist(PathBuf::from("./music")).is_fatal());
        assert!(!PlayerError::Timeout("probe".into()).is_fatal());
    }

    #[test]
    fn scan_error_mentions_root() {
        let source = walkdir::WalkDir::new("/definitely/not/here/earshot")
            .into_iter()
            .find_map(|entry| entry.err())
            .unwrap();
        let err = PlayerError::Scan {
            root: PathBuf::from("/definitely/not/here/earshot"),
            source,
        };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("/definitely/not/here/earshot"));
    }
}
