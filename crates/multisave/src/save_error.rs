// ---------------------------------------------------------------------------
// SaveError: typed errors for save/load operations
// ---------------------------------------------------------------------------

use std::fmt;

/// Errors that can occur during save/load operations.
///
/// Per-record and per-file failures are logged where they happen and never
/// abort a multi-record operation; this type is what the individual steps
/// propagate to the point where that isolation decision is made.
#[derive(Debug)]
pub enum SaveError {
    /// I/O error (file not found, permission denied, disk full, etc.)
    Io(std::io::Error),
    /// A field blob or archive body could not be decoded.
    Decode(String),
    /// Envelope marker mismatch, empty file, bad checksum or decompression failure.
    CorruptArchive(String),
    /// The entity or type does not declare the persistence capability.
    MissingCapability(String),
    /// A resolved type could not be instantiated for a saved record.
    SpawnFailure(String),
    /// A save or load of overlapping scope is already running.
    OverlappingOperation,
    /// Save/load start calls are refused while the world is paused.
    WorldPaused,
    /// A required live object (player, game mode) does not exist yet.
    NotReady(&'static str),
    /// No save data was available to load.
    NoData,
}

impl fmt::Display for SaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveError::Io(e) => write!(f, "I/O error: {e}"),
            SaveError::Decode(msg) => write!(f, "Decoding error: {msg}"),
            SaveError::CorruptArchive(msg) => write!(f, "Corrupt archive: {msg}"),
            SaveError::MissingCapability(what) => {
                write!(f, "Missing persistence capability: {what}")
            }
            SaveError::SpawnFailure(msg) => write!(f, "Spawn failed: {msg}"),
            SaveError::OverlappingOperation => {
                write!(f, "Another save or load of overlapping scope is active")
            }
            SaveError::WorldPaused => write!(f, "Cannot save or load while the world is paused"),
            SaveError::NotReady(what) => write!(f, "Not ready: {what} does not exist yet"),
            SaveError::NoData => write!(f, "No save data available to load"),
        }
    }
}

impl std::error::Error for SaveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SaveError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SaveError {
    fn from(e: std::io::Error) -> Self {
        SaveError::Io(e)
    }
}

impl From<bitcode::Error> for SaveError {
    fn from(e: bitcode::Error) -> Self {
        SaveError::Decode(e.to_string())
    }
}

impl SaveError {
    /// True for errors that mean the file on disk is absent rather than bad.
    pub fn is_not_found(&self) -> bool {
        match self {
            SaveError::NoData => true,
            SaveError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_error_display_io() {
        let err = SaveError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ));
        let msg = format!("{err}");
        assert!(msg.contains("I/O error"), "got: {msg}");
        assert!(msg.contains("file not found"), "got: {msg}");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_save_error_display_corrupt() {
        let err = SaveError::CorruptArchive("empty file".to_string());
        let msg = format!("{err}");
        assert!(msg.contains("Corrupt archive"), "got: {msg}");
        assert!(msg.contains("empty file"), "got: {msg}");
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_save_error_display_not_ready() {
        let err = SaveError::NotReady("player pawn");
        let msg = format!("{err}");
        assert!(msg.contains("player pawn"), "got: {msg}");
    }

    #[test]
    fn test_save_error_display_overlap() {
        let msg = format!("{}", SaveError::OverlappingOperation);
        assert!(msg.contains("overlapping"), "got: {msg}");
    }

    #[test]
    fn test_save_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let save_err: SaveError = io_err.into();
        assert!(matches!(save_err, SaveError::Io(_)));
        assert!(std::error::Error::source(&save_err).is_some());
    }

    #[test]
    fn test_save_error_debug() {
        let err = SaveError::SpawnFailure("Crate_3".to_string());
        let debug = format!("{err:?}");
        assert!(debug.contains("SpawnFailure"), "got: {debug}");
    }
}
