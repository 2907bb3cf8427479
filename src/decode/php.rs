//! Recursive-descent deserializer for PHP's native serialization format.
//!
//! Supports the subset Typecho actually writes: `N` (null), `i` (integer),
//! `s` (byte-length-prefixed string, multi-byte safe) and `a` (ordered
//! key/value map). Errors carry the byte offset of the offending input.

use std::collections::HashMap;

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PhpKey {
    Int(i64),
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PhpValue {
    Null,
    Int(i64),
    String(String),
    Array(Vec<(PhpKey, PhpValue)>),
}

impl PhpValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PhpValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PhpValue::Int(i) => Some(*i),
            // Numeric fields sometimes arrive as strings.
            PhpValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Look up a string-keyed entry in an `a` map.
    pub fn get(&self, key: &str) -> Option<&PhpValue> {
        match self {
            PhpValue::Array(entries) => entries
                .iter()
                .find(|(k, _)| matches!(k, PhpKey::String(s) if s == key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Flatten an `a` map into string keys and values, dropping the rest.
    pub fn to_string_map(&self) -> HashMap<String, String> {
        let PhpValue::Array(entries) = self else {
            return HashMap::new();
        };
        entries
            .iter()
            .filter_map(|(k, v)| {
                let key = match k {
                    PhpKey::String(s) => s.clone(),
                    PhpKey::Int(i) => i.to_string(),
                };
                v.as_str().map(|v| (key, v.to_string()))
            })
            .collect()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{message} at offset {offset}")]
pub struct PhpParseError {
    pub offset: usize,
    pub message: String,
}

fn err(offset: usize, message: impl Into<String>) -> PhpParseError {
    PhpParseError {
        offset,
        message: message.into(),
    }
}

/// Deserialize a PHP-serialized string.
pub fn unserialize(input: &str) -> Result<PhpValue, PhpParseError> {
    let bytes = input.as_bytes();
    let (value, _) = parse_value(bytes, 0)?;
    Ok(value)
}

fn parse_value(bytes: &[u8], offset: usize) -> Result<(PhpValue, usize), PhpParseError> {
    let type_byte = *bytes
        .get(offset)
        .ok_or_else(|| err(offset, "unexpected end of serialized input"))?;
    let mut cursor = offset + 1;

    if type_byte.eq_ignore_ascii_case(&b'n') {
        cursor = expect(bytes, cursor, b';')?;
        return Ok((PhpValue::Null, cursor));
    }

    cursor = expect(bytes, cursor, b':')
        .map_err(|_| err(cursor, format!("expected ':' after type '{}'", type_byte as char)))?;

    match type_byte.to_ascii_lowercase() {
        b'i' => {
            let (text, after) = read_until(bytes, cursor, b';');
            let value: i64 = text
                .parse()
                .map_err(|_| err(cursor, format!("invalid integer literal '{text}'")))?;
            Ok((PhpValue::Int(value), after + 1))
        }
        b's' => {
            let (len_text, after_len) = read_until(bytes, cursor, b':');
            let len: usize = len_text
                .parse()
                .map_err(|_| err(cursor, format!("invalid string length '{len_text}'")))?;
            let mut cursor = expect(bytes, after_len + 1, b'"')
                .map_err(|_| err(after_len + 1, "expected '\"' at start of string value"))?;
            let value = bytes
                .get(cursor..cursor + len)
                .ok_or_else(|| err(cursor, "string value exceeds input length"))?;
            cursor += len;
            cursor = expect(bytes, cursor, b'"')
                .map_err(|_| err(cursor, "expected '\"' at end of string value"))?;
            cursor = expect(bytes, cursor, b';')
                .map_err(|_| err(cursor, "expected ';' after string value"))?;
            Ok((
                PhpValue::String(String::from_utf8_lossy(value).into_owned()),
                cursor,
            ))
        }
        b'a' => {
            let (count_text, after_count) = read_until(bytes, cursor, b':');
            let count: usize = count_text
                .parse()
                .map_err(|_| err(cursor, format!("invalid element count '{count_text}'")))?;
            let mut cursor = expect(bytes, after_count + 1, b'{')
                .map_err(|_| err(after_count + 1, "expected '{' at start of array"))?;

            let mut entries = Vec::with_capacity(count);
            for _ in 0..count {
                let (key, after_key) = parse_value(bytes, cursor)?;
                let (value, after_value) = parse_value(bytes, after_key)?;
                cursor = after_value;
                match key {
                    PhpValue::Int(i) => entries.push((PhpKey::Int(i), value)),
                    PhpValue::String(s) => entries.push((PhpKey::String(s), value)),
                    other => warn!(?other, "skipping array entry with non-scalar key"),
                }
            }

            cursor = expect(bytes, cursor, b'}')
                .map_err(|_| err(cursor, "expected '}' at end of array"))?;
            Ok((PhpValue::Array(entries), cursor))
        }
        other => Err(err(
            offset,
            format!("unsupported serialized type '{}'", other as char),
        )),
    }
}

fn expect(bytes: &[u8], offset: usize, expected: u8) -> Result<usize, PhpParseError> {
    match bytes.get(offset) {
        Some(b) if *b == expected => Ok(offset + 1),
        _ => Err(err(offset, format!("expected '{}'", expected as char))),
    }
}

/// Read ASCII up to (not including) `stop`; returns text and stop offset.
fn read_until(bytes: &[u8], offset: usize, stop: u8) -> (String, usize) {
    let mut end = offset;
    while end < bytes.len() && bytes[end] != stop {
        end += 1;
    }
    (
        String::from_utf8_lossy(&bytes[offset..end]).into_owned(),
        end,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scalars() {
        assert_eq!(unserialize("N;").unwrap(), PhpValue::Null);
        assert_eq!(unserialize("i:-42;").unwrap(), PhpValue::Int(-42));
        assert_eq!(
            unserialize("s:5:\"hello\";").unwrap(),
            PhpValue::String("hello".to_string())
        );
    }

    #[test]
    fn string_lengths_are_bytes_not_chars() {
        // "日本" is 6 bytes of UTF-8.
        assert_eq!(
            unserialize("s:6:\"日本\";").unwrap(),
            PhpValue::String("日本".to_string())
        );
    }

    #[test]
    fn parses_nested_arrays() {
        let input = "a:2:{s:4:\"name\";s:5:\"a.png\";s:4:\"meta\";a:1:{s:4:\"size\";i:128;}}";
        let value = unserialize(input).unwrap();
        assert_eq!(value.get("name").and_then(PhpValue::as_str), Some("a.png"));
        assert_eq!(
            value
                .get("meta")
                .and_then(|m| m.get("size"))
                .and_then(PhpValue::as_i64),
            Some(128)
        );
    }

    #[test]
    fn error_reports_offset() {
        let error = unserialize("s:3:xabc\";").unwrap_err();
        assert_eq!(error.offset, 4);
        assert!(error.message.contains("start of string"));
    }

    #[test]
    fn rejects_unknown_types() {
        let error = unserialize("d:1.5;").unwrap_err();
        assert!(error.message.contains("unsupported serialized type 'd'"));
    }

    #[test]
    fn as_i64_coerces_numeric_strings() {
        assert_eq!(unserialize("s:3:\"128\";").unwrap().as_i64(), Some(128));
    }
}
