// ---------------------------------------------------------------------------
// field_codec – tagged little-endian encoding of captured field values
// ---------------------------------------------------------------------------
//
// Blob layout:
//   [0]      Format byte (FIELD_FORMAT)
//   [1..5]   Entry count (u32)
//   entries: name (u32 length + UTF-8), value (tag byte + body)
//
// Value bodies:
//   Bool u8 | Int i64 | UInt u64 | Float f64 | Text str | Vec3 3xf32 | Quat 4xf32
//   Struct count + (name, value)* | List count + value* | Map count + (value, value)*
//
// Decoding never trusts a count for allocation and caps nesting depth, so a
// hostile blob produces `SaveError::Decode` rather than a panic or OOM. The
// encoder applies the same cap, so every blob it writes decodes again.

use bevy::prelude::*;

use crate::field_value::{FieldValue, StructValue};
use crate::save_error::SaveError;

const FIELD_FORMAT: u8 = 1;

/// Deepest value nesting accepted by both encoder and decoder. A stack guard
/// only: real field trees stay far below it.
pub const MAX_DEPTH: usize = 512;

const TAG_BOOL: u8 = 0;
const TAG_INT: u8 = 1;
const TAG_UINT: u8 = 2;
const TAG_FLOAT: u8 = 3;
const TAG_TEXT: u8 = 4;
const TAG_VEC3: u8 = 5;
const TAG_QUAT: u8 = 6;
const TAG_STRUCT: u8 = 7;
const TAG_LIST: u8 = 8;
const TAG_MAP: u8 = 9;

/// Encode captured entries. An entry nested deeper than `MAX_DEPTH` is left
/// out with a warning instead of producing a blob that cannot be read back.
pub fn encode_fields(entries: &[(String, FieldValue)]) -> Vec<u8> {
    let kept: Vec<&(String, FieldValue)> = entries
        .iter()
        .filter(|(name, value)| {
            let depth = nesting_depth(value);
            if depth > MAX_DEPTH {
                warn!(
                    "Field '{}' not saved: nested {} deep, limit is {}",
                    name, depth, MAX_DEPTH
                );
                return false;
            }
            true
        })
        .collect();

    let mut out = Vec::with_capacity(64);
    out.push(FIELD_FORMAT);
    put_len(&mut out, kept.len());
    for (name, value) in kept {
        put_str(&mut out, name);
        put_value(&mut out, value);
    }
    out
}

/// Deepest level the decoder reaches inside `value`; 0 for a scalar or an
/// empty container.
pub fn nesting_depth(value: &FieldValue) -> usize {
    match value {
        FieldValue::Struct(s) => deepest(s.entries().iter().map(|(_, v)| v)),
        FieldValue::List(items) => deepest(items.iter()),
        FieldValue::Map(pairs) => deepest(pairs.iter().flat_map(|(k, v)| [k, v])),
        _ => 0,
    }
}

fn deepest<'a>(children: impl Iterator<Item = &'a FieldValue>) -> usize {
    children.map(|c| 1 + nesting_depth(c)).max().unwrap_or(0)
}

pub fn decode_fields(bytes: &[u8]) -> Result<Vec<(String, FieldValue)>, SaveError> {
    // An empty blob is a record that saved no fields.
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    let mut reader = Reader { bytes, pos: 0 };
    let format = reader.u8()?;
    if format != FIELD_FORMAT {
        return Err(SaveError::Decode(format!(
            "unknown field blob format {format}"
        )));
    }
    let count = reader.len()?;
    let mut entries = Vec::with_capacity(count.min(reader.remaining()));
    for _ in 0..count {
        let name = reader.string()?;
        let value = reader.value(0)?;
        entries.push((name, value));
    }
    if reader.remaining() != 0 {
        return Err(SaveError::Decode(format!(
            "{} trailing bytes after field blob",
            reader.remaining()
        )));
    }
    Ok(entries)
}

fn put_len(out: &mut Vec<u8>, len: usize) {
    out.extend_from_slice(&(len as u32).to_le_bytes());
}

fn put_str(out: &mut Vec<u8>, s: &str) {
    put_len(out, s.len());
    out.extend_from_slice(s.as_bytes());
}

fn put_f32s(out: &mut Vec<u8>, values: &[f32]) {
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

fn put_value(out: &mut Vec<u8>, value: &FieldValue) {
    match value {
        FieldValue::Bool(b) => {
            out.push(TAG_BOOL);
            out.push(u8::from(*b));
        }
        FieldValue::Int(v) => {
            out.push(TAG_INT);
            out.extend_from_slice(&v.to_le_bytes());
        }
        FieldValue::UInt(v) => {
            out.push(TAG_UINT);
            out.extend_from_slice(&v.to_le_bytes());
        }
        FieldValue::Float(v) => {
            out.push(TAG_FLOAT);
            out.extend_from_slice(&v.to_le_bytes());
        }
        FieldValue::Text(s) => {
            out.push(TAG_TEXT);
            put_str(out, s);
        }
        FieldValue::Vec3(v) => {
            out.push(TAG_VEC3);
            put_f32s(out, v);
        }
        FieldValue::Quat(q) => {
            out.push(TAG_QUAT);
            put_f32s(out, q);
        }
        FieldValue::Struct(s) => {
            out.push(TAG_STRUCT);
            put_len(out, s.len());
            for (name, v) in s.entries() {
                put_str(out, name);
                put_value(out, v);
            }
        }
        FieldValue::List(items) => {
            out.push(TAG_LIST);
            put_len(out, items.len());
            for item in items {
                put_value(out, item);
            }
        }
        FieldValue::Map(pairs) => {
            out.push(TAG_MAP);
            put_len(out, pairs.len());
            for (k, v) in pairs {
                put_value(out, k);
                put_value(out, v);
            }
        }
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], SaveError> {
        if self.remaining() < n {
            return Err(SaveError::Decode(format!(
                "field blob truncated at byte {} (wanted {n} more)",
                self.pos
            )));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], SaveError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    fn u8(&mut self) -> Result<u8, SaveError> {
        Ok(self.take(1)?[0])
    }

    fn len(&mut self) -> Result<usize, SaveError> {
        Ok(u32::from_le_bytes(self.array()?) as usize)
    }

    fn f32(&mut self) -> Result<f32, SaveError> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    fn string(&mut self) -> Result<String, SaveError> {
        let len = self.len()?;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec())
            .map_err(|e| SaveError::Decode(format!("field name is not UTF-8: {e}")))
    }

    fn value(&mut self, depth: usize) -> Result<FieldValue, SaveError> {
        if depth > MAX_DEPTH {
            return Err(SaveError::Decode(format!(
                "field values nested deeper than {MAX_DEPTH}"
            )));
        }
        let tag = self.u8()?;
        let value = match tag {
            TAG_BOOL => match self.u8()? {
                0 => FieldValue::Bool(false),
                1 => FieldValue::Bool(true),
                other => {
                    return Err(SaveError::Decode(format!("invalid bool byte {other}")));
                }
            },
            TAG_INT => FieldValue::Int(i64::from_le_bytes(self.array()?)),
            TAG_UINT => FieldValue::UInt(u64::from_le_bytes(self.array()?)),
            TAG_FLOAT => FieldValue::Float(f64::from_le_bytes(self.array()?)),
            TAG_TEXT => FieldValue::Text(self.string()?),
            TAG_VEC3 => FieldValue::Vec3([self.f32()?, self.f32()?, self.f32()?]),
            TAG_QUAT => FieldValue::Quat([self.f32()?, self.f32()?, self.f32()?, self.f32()?]),
            TAG_STRUCT => {
                let count = self.len()?;
                let mut entries = Vec::with_capacity(count.min(self.remaining()));
                for _ in 0..count {
                    let name = self.string()?;
                    entries.push((name, self.value(depth + 1)?));
                }
                FieldValue::Struct(StructValue::from_entries(entries))
            }
            TAG_LIST => {
                let count = self.len()?;
                let mut items = Vec::with_capacity(count.min(self.remaining()));
                for _ in 0..count {
                    items.push(self.value(depth + 1)?);
                }
                FieldValue::List(items)
            }
            TAG_MAP => {
                let count = self.len()?;
                let mut pairs = Vec::with_capacity(count.min(self.remaining()));
                for _ in 0..count {
                    let k = self.value(depth + 1)?;
                    let v = self.value(depth + 1)?;
                    pairs.push((k, v));
                }
                FieldValue::Map(pairs)
            }
            other => {
                return Err(SaveError::Decode(format!("unknown field value tag {other}")));
            }
        };
        Ok(value)
    }
}
