//! Decoder for the Typecho binary backup format.
//!
//! The file is a sequence of length-prefixed blocks between a 21-byte header
//! and an identical footer. Each block carries a little-endian metadata
//! prefix, a JSON column->byte-length schema, the row payload and a 32-char
//! lowercase-hex MD5 over prefix+schema+payload. The legacy `FILE` variant
//! omits the body length and derives it from the schema instead.
//!
//! The cursor is an explicit value threaded through every read so block
//! boundaries can be unit tested without decoder state.

use std::collections::BTreeMap;

use md5::{Digest, Md5};
use thiserror::Error;
use tracing::warn;

/// One decoded row: column name to value, `None` for SQL NULL.
pub type Row = BTreeMap<String, Option<String>>;

/// Tables recovered from a backup, in block order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupData {
    pub contents: Vec<Row>,
    pub comments: Vec<Row>,
    pub metas: Vec<Row>,
    pub relationships: Vec<Row>,
    pub users: Vec<Row>,
    pub fields: Vec<Row>,
}

#[derive(Debug, Error)]
pub enum BackupDecodeError {
    #[error("invalid backup file: header mismatch or unsupported format")]
    InvalidHeader,
}

const MARKER_LEN: usize = 21;
const MD5_HEX_LEN: usize = 32;
const LEGACY_VERSION: &str = "FILE";

/// Decode a backup buffer into its tables.
///
/// A bad header is fatal. A checksum or framing mismatch mid-file stops
/// block iteration and returns whatever decoded cleanly before it; trailing
/// corruption must not discard valid tables. A block whose schema JSON is
/// malformed is skipped when the body length is known independently.
pub fn decode(buffer: &[u8]) -> Result<BackupData, BackupDecodeError> {
    let version = parse_marker(buffer, 0)
        .filter(|_| buffer.len() >= MARKER_LEN * 2)
        .ok_or(BackupDecodeError::InvalidHeader)?;

    let mut data = BackupData::default();
    let mut cursor = MARKER_LEN;
    let end = buffer.len() - MARKER_LEN;

    while cursor < end {
        match read_block(buffer, cursor, &version) {
            BlockRead::Ok { block, next } => {
                route_row(&mut data, &block);
                cursor = next;
            }
            BlockRead::SkipBlock { next } => {
                warn!(offset = cursor, "skipping backup block with malformed schema json");
                cursor = next;
            }
            BlockRead::Stop => {
                warn!(
                    offset = cursor,
                    "stopping backup decode: checksum or framing mismatch, keeping decoded tables"
                );
                break;
            }
        }
    }

    if parse_marker(buffer, buffer.len() - MARKER_LEN).as_deref() != Some(version.as_str()) {
        warn!("backup footer mismatch or missing, file may be truncated");
    }

    Ok(data)
}

/// `%TYPECHO_BACKUP_XXXX%` where XXXX is the four-char version tag.
fn parse_marker(buffer: &[u8], offset: usize) -> Option<String> {
    let marker = buffer.get(offset..offset + MARKER_LEN)?;
    if !marker.starts_with(b"%TYPECHO_BACKUP_") || marker[MARKER_LEN - 1] != b'%' {
        return None;
    }
    let version = &marker[16..20];
    if !version
        .iter()
        .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
    {
        return None;
    }
    Some(String::from_utf8_lossy(version).into_owned())
}

#[derive(Debug)]
struct Block {
    type_code: u16,
    schema: Vec<(String, Option<usize>)>,
    body: Vec<u8>,
}

enum BlockRead {
    Ok { block: Block, next: usize },
    SkipBlock { next: usize },
    Stop,
}

fn read_block(buffer: &[u8], start: usize, version: &str) -> BlockRead {
    let legacy = version == LEGACY_VERSION;
    let meta_len = if legacy { 6 } else { 8 };

    let Some(meta) = buffer.get(start..start + meta_len) else {
        return BlockRead::Stop;
    };
    let type_code = u16::from_le_bytes([meta[0], meta[1]]);
    let header_len = u16::from_le_bytes([meta[2], meta[3]]) as usize;
    let stored_body_len =
        (!legacy).then(|| u32::from_le_bytes([meta[4], meta[5], meta[6], meta[7]]) as usize);

    let header_start = start + meta_len;
    let Some(header_bytes) = buffer.get(header_start..header_start + header_len) else {
        return BlockRead::Stop;
    };
    let header_text = String::from_utf8_lossy(header_bytes);
    let schema = parse_schema(&header_text);

    // The legacy variant stores no body length: it is the sum of the non-null
    // column lengths, which means a broken schema is unrecoverable there.
    let body_len = match (&schema, stored_body_len) {
        (_, Some(len)) => len,
        (Some(schema), None) => schema.iter().filter_map(|(_, len)| *len).sum(),
        (None, None) => return BlockRead::Stop,
    };

    let body_start = header_start + header_len;
    let checksum_start = body_start + body_len;
    let next = checksum_start + MD5_HEX_LEN;
    if next > buffer.len() {
        return BlockRead::Stop;
    }
    let Some(body) = buffer.get(body_start..checksum_start) else {
        return BlockRead::Stop;
    };
    let Some(stored_md5) = buffer.get(checksum_start..next) else {
        return BlockRead::Stop;
    };

    let mut hasher = Md5::new();
    hasher.update(meta);
    hasher.update(header_bytes);
    hasher.update(body);
    let computed = format!("{:x}", hasher.finalize());
    if stored_md5 != computed.as_bytes() {
        return BlockRead::Stop;
    }

    match schema {
        Some(schema) => BlockRead::Ok {
            block: Block {
                type_code,
                schema,
                body: body.to_vec(),
            },
            next,
        },
        // Modern block with an explicit body length: frame is intact, only
        // the schema is junk, so skip just this block.
        None => BlockRead::SkipBlock { next },
    }
}

/// Parse the block header as an ordered column -> byte-length map.
/// `null` marks a SQL NULL column that consumes no payload bytes.
fn parse_schema(header: &str) -> Option<Vec<(String, Option<usize>)>> {
    let value: serde_json::Value = serde_json::from_str(header).ok()?;
    let object = value.as_object()?;
    let mut schema = Vec::with_capacity(object.len());
    for (column, len) in object {
        let len = match len {
            serde_json::Value::Null => None,
            serde_json::Value::Number(n) => Some(n.as_u64()? as usize),
            _ => return None,
        };
        schema.push((column.clone(), len));
    }
    Some(schema)
}

fn route_row(data: &mut BackupData, block: &Block) {
    let Some(row) = slice_row(&block.schema, &block.body) else {
        warn!(
            type_code = block.type_code,
            "skipping backup row: schema lengths exceed body size"
        );
        return;
    };
    match block.type_code {
        1 => data.contents.push(row),
        2 => data.comments.push(row),
        3 => data.metas.push(row),
        4 => data.relationships.push(row),
        5 => data.users.push(row),
        6 => data.fields.push(row),
        other => warn!(type_code = other, "skipping backup row with unknown table code"),
    }
}

fn slice_row(schema: &[(String, Option<usize>)], body: &[u8]) -> Option<Row> {
    let mut row = Row::new();
    let mut offset = 0usize;
    for (column, len) in schema {
        match len {
            None => {
                row.insert(column.clone(), None);
            }
            Some(len) => {
                let slice = body.get(offset..offset + len)?;
                row.insert(column.clone(), Some(normalize_value(slice)));
                offset += len;
            }
        }
    }
    Some(row)
}

/// Typecho stores two wide-space HTML entity artifacts inside values.
fn normalize_value(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .replace("&#8195;", " ")
        .replace("&emsp;", " ")
}

/// Test-only backup builder shared with the Typecho parser tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub struct BlockSpec<'a> {
        pub type_code: u16,
        pub columns: &'a [(&'a str, Option<&'a str>)],
    }

    pub fn encode_backup(version: &str, blocks: &[BlockSpec<'_>]) -> Vec<u8> {
        let marker = format!("%TYPECHO_BACKUP_{version}%");
        let mut out = marker.clone().into_bytes();
        for block in blocks {
            out.extend_from_slice(&encode_block(version, block, false));
        }
        out.extend_from_slice(marker.as_bytes());
        out
    }

    pub fn encode_block(version: &str, block: &BlockSpec<'_>, corrupt_md5: bool) -> Vec<u8> {
        let legacy = version == LEGACY_VERSION;
        let mut header = String::from("{");
        let mut body: Vec<u8> = Vec::new();
        for (i, (column, value)) in block.columns.iter().enumerate() {
            if i > 0 {
                header.push(',');
            }
            match value {
                None => header.push_str(&format!("\"{column}\":null")),
                Some(value) => {
                    header.push_str(&format!("\"{column}\":{}", value.len()));
                    body.extend_from_slice(value.as_bytes());
                }
            }
        }
        header.push('}');

        let mut meta = Vec::new();
        meta.extend_from_slice(&block.type_code.to_le_bytes());
        meta.extend_from_slice(&(header.len() as u16).to_le_bytes());
        if legacy {
            // Legacy meta is 6 bytes: the body length slot is absent and the
            // remaining two bytes are unused.
            meta.extend_from_slice(&[0, 0]);
        } else {
            meta.extend_from_slice(&(body.len() as u32).to_le_bytes());
        }

        let mut hasher = Md5::new();
        hasher.update(&meta);
        hasher.update(header.as_bytes());
        hasher.update(&body);
        let mut checksum = format!("{:x}", hasher.finalize());
        if corrupt_md5 {
            checksum = "0".repeat(MD5_HEX_LEN);
        }

        let mut out = meta;
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(&body);
        out.extend_from_slice(checksum.as_bytes());
        out
    }
}
