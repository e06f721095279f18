// ---------------------------------------------------------------------------
// file_header – compressed envelope wrapping every persisted archive
// ---------------------------------------------------------------------------
//
// Header format (24 bytes, fixed-size, little-endian):
//   [0..4]   Magic bytes: "EMSV"
//   [4..8]   Header format version (u32)
//   [8..12]  Flags (u32: bit 0 = lz4-compressed)
//   [12..16] Uncompressed data size (u32)
//   [16..20] Payload length in bytes (u32)
//   [20..24] xxHash32 checksum of the payload (everything after the header)
//
// On save: compress raw bytes -> prepend header (checksum of compressed payload)
// On load: check magic -> validate lengths and checksum -> decompress -> verify size
//
// Every decode failure is a `SaveError::CorruptArchive`; nothing here panics on
// hostile input.

use xxhash_rust::xxh32::xxh32;

use crate::save_error::SaveError;

/// Magic bytes identifying a multisave envelope.
pub const MAGIC: [u8; 4] = *b"EMSV";

/// Size of the envelope header in bytes.
pub const HEADER_SIZE: usize = 24;

/// Current header layout version.
pub const HEADER_FORMAT_VERSION: u32 = 1;

/// Flag bit: payload is an lz4 block with the uncompressed size prepended.
pub const FLAG_COMPRESSED: u32 = 1;

/// Seed for xxHash32 checksum.
const XXHASH_SEED: u32 = 0;

/// Parsed envelope header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub format_version: u32,
    pub flags: u32,
    pub uncompressed_size: u32,
    pub payload_len: u32,
    pub checksum: u32,
}

impl FileHeader {
    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&self.format_version.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.uncompressed_size.to_le_bytes());
        out.extend_from_slice(&self.payload_len.to_le_bytes());
        out.extend_from_slice(&self.checksum.to_le_bytes());
    }
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Compress `raw` and wrap it in an envelope.
///
/// The whole envelope is built in memory; callers hand the result to
/// `atomic_write` so a file is either fully replaced or left untouched.
pub fn encode_envelope(raw: &[u8]) -> Vec<u8> {
    let payload = lz4_flex::compress_prepend_size(raw);
    let header = FileHeader {
        format_version: HEADER_FORMAT_VERSION,
        flags: FLAG_COMPRESSED,
        uncompressed_size: raw.len() as u32,
        payload_len: payload.len() as u32,
        checksum: xxh32(&payload, XXHASH_SEED),
    };

    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    header.write_to(&mut out);
    out.extend_from_slice(&payload);
    out
}

/// Parse and validate the header, returning it with the payload slice.
pub fn unwrap_header(bytes: &[u8]) -> Result<(FileHeader, &[u8]), SaveError> {
    if bytes.is_empty() {
        return Err(SaveError::CorruptArchive("archive is empty".into()));
    }
    if bytes.len() < MAGIC.len() || bytes[..4] != MAGIC {
        return Err(SaveError::CorruptArchive(
            "archive does not start with the EMSV marker".into(),
        ));
    }
    if bytes.len() < HEADER_SIZE {
        return Err(SaveError::CorruptArchive(format!(
            "archive is too short ({} bytes, need at least {} for header)",
            bytes.len(),
            HEADER_SIZE
        )));
    }

    let header = FileHeader {
        format_version: read_u32(bytes, 4),
        flags: read_u32(bytes, 8),
        uncompressed_size: read_u32(bytes, 12),
        payload_len: read_u32(bytes, 16),
        checksum: read_u32(bytes, 20),
    };

    if header.format_version > HEADER_FORMAT_VERSION {
        return Err(SaveError::CorruptArchive(format!(
            "archive uses header format version {}, this build supports up to {}",
            header.format_version, HEADER_FORMAT_VERSION
        )));
    }

    let payload = &bytes[HEADER_SIZE..];
    if payload.len() != header.payload_len as usize {
        return Err(SaveError::CorruptArchive(format!(
            "archive payload is {} bytes, header says {}",
            payload.len(),
            header.payload_len
        )));
    }

    let computed = xxh32(payload, XXHASH_SEED);
    if computed != header.checksum {
        return Err(SaveError::CorruptArchive(format!(
            "checksum mismatch (expected {:#010X}, got {:#010X})",
            header.checksum, computed
        )));
    }

    Ok((header, payload))
}

/// Validate and decompress an envelope back into the raw archive bytes.
pub fn decode_envelope(bytes: &[u8]) -> Result<Vec<u8>, SaveError> {
    let (header, payload) = unwrap_header(bytes)?;

    if !header.is_compressed() {
        return Err(SaveError::CorruptArchive("payload is not compressed".into()));
    }

    let raw = lz4_flex::decompress_size_prepended(payload)
        .map_err(|e| SaveError::CorruptArchive(format!("decompression failed: {e}")))?;

    if raw.len() != header.uncompressed_size as usize {
        return Err(SaveError::CorruptArchive(format!(
            "decompressed {} bytes, header says {}",
            raw.len(),
            header.uncompressed_size
        )));
    }
    Ok(raw)
}
