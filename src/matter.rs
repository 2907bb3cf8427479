//! Front-matter document reader.
//!
//! Splits a Markdown file into a structured metadata block and the body
//! text. The matter block opens on the first non-blank line (`---` YAML,
//! `+++` TOML, `{` JSON) and closes on the matching delimiter. The body is
//! recovered from the original byte span so its formatting survives intact,
//! not re-joined from accumulated lines.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatterSyntax {
    Yaml,
    Toml,
    Json,
}

impl MatterSyntax {
    fn closes(&self, line: &str) -> bool {
        matches!(
            (self, line),
            (MatterSyntax::Yaml, "---") | (MatterSyntax::Toml, "+++") | (MatterSyntax::Json, "}")
        )
    }
}

#[derive(Debug, Error)]
pub enum MatterError {
    #[error("document doesn't have valid front matter")]
    Missing,
    #[error("front matter block is never closed")]
    Unterminated,
    #[error("failed to parse {syntax:?} front matter: {message}")]
    Parse {
        syntax: MatterSyntax,
        message: String,
    },
    #[error("missing required front matter field: title")]
    MissingTitle,
}

/// A parsed document: matter normalized to a JSON value, plus the body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub matter: Value,
    pub body: String,
}

impl Document {
    pub fn title(&self) -> Option<&str> {
        self.matter.get("title").and_then(Value::as_str)
    }

    pub fn slug(&self) -> Option<&str> {
        self.matter.get("slug").and_then(Value::as_str)
    }

    pub fn draft(&self) -> bool {
        self.matter
            .get("draft")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn date(&self) -> Option<&str> {
        self.matter.get("date").and_then(Value::as_str)
    }

    pub fn string_list(&self, field: &str) -> Vec<String> {
        self.matter
            .get(field)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Clone, Copy)]
enum State {
    Init,
    MatterOpen(MatterSyntax),
    MatterClosed(MatterSyntax),
}

/// Split and parse a front-matter document. Requires a `title` field.
pub fn parse_document(text: &str) -> Result<Document, MatterError> {
    let mut state = State::Init;
    let mut matter = String::new();
    let mut body = String::new();
    // Cumulative byte count up to and including the current line.
    let mut count = 0usize;

    for line in text.split('\n') {
        count += line.len() + 1;
        match state {
            State::Init => {
                let syntax = match line {
                    "---" => MatterSyntax::Yaml,
                    "+++" => MatterSyntax::Toml,
                    "{" => MatterSyntax::Json,
                    _ if line.trim().is_empty() => continue,
                    _ => return Err(MatterError::Missing),
                };
                state = State::MatterOpen(syntax);
            }
            State::MatterOpen(syntax) => {
                if syntax.closes(line) {
                    state = State::MatterClosed(syntax);
                } else {
                    matter.push_str(line);
                    matter.push('\n');
                }
            }
            State::MatterClosed(_) => {
                // Skip blank separator lines; the first non-blank line marks
                // the start of the body, taken as the remaining byte span.
                if !line.is_empty() {
                    let start = count - line.len() - 1;
                    body = text[start..].to_string();
                    break;
                }
            }
        }
    }

    let syntax = match state {
        State::Init => return Err(MatterError::Missing),
        State::MatterOpen(_) => return Err(MatterError::Unterminated),
        State::MatterClosed(syntax) => syntax,
    };

    let matter = parse_matter(syntax, &matter)?;
    if matter.get("title").map_or(true, Value::is_null) {
        return Err(MatterError::MissingTitle);
    }

    Ok(Document { matter, body })
}

fn parse_matter(syntax: MatterSyntax, text: &str) -> Result<Value, MatterError> {
    let parse_error = |message: String| MatterError::Parse {
        syntax,
        message,
    };
    match syntax {
        MatterSyntax::Yaml => {
            serde_yaml::from_str(text).map_err(|e| parse_error(e.to_string()))
        }
        MatterSyntax::Toml => {
            let value: toml::Value =
                toml::from_str(text).map_err(|e| parse_error(e.to_string()))?;
            serde_json::to_value(value).map_err(|e| parse_error(e.to_string()))
        }
        // The delimiter lines carry the braces, so wrap them back on.
        MatterSyntax::Json => serde_json::from_str(&format!("{{{text}}}"))
            .map_err(|e| parse_error(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_yaml_matter() {
        let doc = parse_document("---\ntitle: Hello\ntags:\n  - rust\n---\n\nBody text.\n")
            .expect("parse yaml document");
        assert_eq!(doc.title(), Some("Hello"));
        assert_eq!(doc.string_list("tags"), vec!["rust".to_string()]);
        assert_eq!(doc.body, "Body text.\n");
    }

    #[test]
    fn parses_toml_matter() {
        let doc = parse_document("+++\ntitle = \"Hi\"\ndraft = true\n+++\nbody")
            .expect("parse toml document");
        assert_eq!(doc.title(), Some("Hi"));
        assert!(doc.draft());
        assert_eq!(doc.body, "body");
    }

    #[test]
    fn parses_json_matter() {
        let doc = parse_document("{\n\"title\": \"Js\"\n}\ncontent here")
            .expect("parse json document");
        assert_eq!(doc.title(), Some("Js"));
        assert_eq!(doc.body, "content here");
    }

    #[test]
    fn leading_blank_lines_are_allowed() {
        let doc = parse_document("\n  \n---\ntitle: T\n---\nbody").expect("parse");
        assert_eq!(doc.title(), Some("T"));
    }

    #[test]
    fn body_span_preserves_formatting() {
        let text = "---\ntitle: T\n---\n\n\n  indented first line\n\nsecond  para\n";
        let doc = parse_document(text).expect("parse");
        assert_eq!(doc.body, "  indented first line\n\nsecond  para\n");
    }

    #[test]
    fn missing_matter_is_an_error() {
        assert!(matches!(
            parse_document("just some text"),
            Err(MatterError::Missing)
        ));
    }

    #[test]
    fn unterminated_matter_is_an_error() {
        assert!(matches!(
            parse_document("---\ntitle: T\nno closing"),
            Err(MatterError::Unterminated)
        ));
    }

    #[test]
    fn missing_title_is_an_error() {
        assert!(matches!(
            parse_document("---\nslug: x\n---\nbody"),
            Err(MatterError::MissingTitle)
        ));
    }

    #[test]
    fn empty_body_is_allowed() {
        let doc = parse_document("---\ntitle: T\n---\n").expect("parse");
        assert_eq!(doc.body, "");
    }
}
