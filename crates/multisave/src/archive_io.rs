//! Archive bytes <-> files.
//!
//! `encode_archive`/`decode_archive` are pure and safe to run on a worker
//! thread; the file helpers add the read or the atomic write on top.

use std::path::Path;

use bevy::prelude::*;
use bitcode::{DecodeOwned, Encode};

use crate::atomic_write::atomic_write;
use crate::file_header::{decode_envelope, encode_envelope};
use crate::save_error::SaveError;

pub fn encode_archive<T: Encode>(archive: &T) -> Vec<u8> {
    encode_envelope(&bitcode::encode(archive))
}

pub fn decode_archive<T: DecodeOwned>(bytes: &[u8]) -> Result<T, SaveError> {
    let raw = decode_envelope(bytes)?;
    bitcode::decode(&raw).map_err(|e| SaveError::CorruptArchive(format!("archive body: {e}")))
}

pub fn write_archive<T: Encode>(path: &Path, archive: &T) -> Result<(), SaveError> {
    let bytes = encode_archive(archive);
    atomic_write(path, &bytes)?;
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

pub fn read_archive<T: DecodeOwned>(path: &Path) -> Result<T, SaveError> {
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => SaveError::NoData,
        _ => SaveError::Io(e),
    })?;
    decode_archive(&bytes)
}

/// Read an archive, treating a missing file as absent and any other failure
/// as absent with a warning.
pub fn read_archive_or_warn<T: DecodeOwned>(path: &Path) -> Option<T> {
    match read_archive(path) {
        Ok(archive) => Some(archive),
        Err(e) if e.is_not_found() => None,
        Err(e) => {
            warn!("Ignoring {}: {}", path.display(), e);
            None
        }
    }
}
