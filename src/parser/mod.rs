//! Format-specific normalizers.
//!
//! One submodule per source platform, each exposing
//! `parse(..) -> Result<MigrateData, ParseError>`. Whatever the source looks
//! like on disk, the output contract is the same normalized batch.

pub mod atom;
pub mod ghost;
pub mod halo;
pub mod hugo;
pub mod rss;
pub mod typecho;
pub mod wordpress;

use thiserror::Error;

use crate::decode::typecho::BackupDecodeError;
use crate::model::MigrateData;

#[derive(Debug, Error)]
pub enum ParseError {
    /// The input is not what this parser expects. Fatal to the whole parse.
    #[error("unrecognized input: {0}")]
    Format(String),
    #[error("unsupported source version {found}, expected {expected}")]
    UnsupportedVersion { found: String, expected: String },
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("invalid archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error(transparent)]
    Backup(#[from] BackupDecodeError),
}

/// Which source platform an input file came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceFormat {
    /// Legacy 1.x JSON export of the target platform itself.
    Halo,
    /// WordPress WXR (RSS 2.0 with `wp:` extensions).
    Wordpress,
    /// Ghost JSON export.
    Ghost,
    /// Hugo site archive (ZIP of Markdown with front matter).
    Hugo,
    /// Typecho binary backup.
    Typecho,
    /// Plain RSS 2.0 feed.
    Rss,
    /// Atom feed.
    Atom,
}

/// Parser knobs that only some formats care about.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Hugo sections whose documents become posts.
    pub post_sections: Vec<String>,
    /// Hugo sections whose documents become single pages.
    pub page_sections: Vec<String>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            post_sections: vec!["post".to_string(), "posts".to_string()],
            page_sections: vec!["page".to_string(), "pages".to_string()],
        }
    }
}

impl SourceFormat {
    pub fn parse(self, bytes: &[u8], options: &ParseOptions) -> Result<MigrateData, ParseError> {
        match self {
            SourceFormat::Halo => halo::parse(bytes),
            SourceFormat::Wordpress => wordpress::parse(bytes),
            SourceFormat::Ghost => ghost::parse(bytes),
            SourceFormat::Hugo => hugo::parse(bytes, options),
            SourceFormat::Typecho => typecho::parse(bytes),
            SourceFormat::Rss => rss::parse(bytes),
            SourceFormat::Atom => atom::parse(bytes),
        }
    }
}

fn text_input(bytes: &[u8]) -> Result<&str, ParseError> {
    std::str::from_utf8(bytes).map_err(|_| ParseError::Format("input is not UTF-8".to_string()))
}

fn epoch_ms_to_rfc3339(ms: i64) -> Option<String> {
    use chrono::{SecondsFormat, TimeZone, Utc};
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn epoch_secs_to_rfc3339(secs: i64) -> Option<String> {
    use chrono::{SecondsFormat, TimeZone, Utc};
    Utc.timestamp_opt(secs, 0)
        .single()
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Normalize the date strings found in front matter: full RFC 3339, a naive
/// datetime, or a bare date. Naive values are taken as UTC.
fn date_string_to_rfc3339(raw: &str) -> Option<String> {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Millis, true));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&t).to_rfc3339_opts(SecondsFormat::Millis, true));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| Utc.from_utc_datetime(&t).to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn dispatch_routes_a_ghost_export_read_from_disk() {
        let export = serde_json::json!({
            "db": [{ "data": { "posts": [{
                "id": "p1", "title": "One", "slug": "one", "type": "post",
                "status": "published", "visibility": "public",
                "html": "<p>hi</p>", "plaintext": "hi"
            }], "tags": [], "posts_tags": [] } }]
        });
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(export.to_string().as_bytes()).expect("write export");
        let bytes = std::fs::read(file.path()).expect("read export");

        let data = SourceFormat::Ghost
            .parse(&bytes, &ParseOptions::default())
            .expect("parse export");
        assert_eq!(data.posts.len(), 1);
        assert_eq!(data.total(), 1);
    }

    #[test]
    fn non_utf8_text_input_is_a_format_error() {
        let err = SourceFormat::Ghost
            .parse(&[0xff, 0xfe, 0x00], &ParseOptions::default())
            .unwrap_err();
        assert!(matches!(err, ParseError::Format(_)));
    }

    #[test]
    fn epoch_helpers_render_utc_millis() {
        assert_eq!(
            epoch_secs_to_rfc3339(1577836800).as_deref(),
            Some("2020-01-01T00:00:00.000Z")
        );
        assert_eq!(
            epoch_ms_to_rfc3339(1577836800123).as_deref(),
            Some("2020-01-01T00:00:00.123Z")
        );
    }
}
