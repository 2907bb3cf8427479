//! Atom feed normalizer.
//!
//! Entries without a title or content carry nothing worth migrating and are
//! dropped with a warning. Atom timestamps are already RFC 3339 and pass
//! through unchanged; an entry with neither `published` nor `updated` gets
//! the current time.

use chrono::{SecondsFormat, Utc};
use roxmltree::{Document, Node};
use tracing::warn;
use uuid::Uuid;

use crate::markdown;
use crate::model::{
    Excerpt, Metadata, MigrateData, MigratePost, PostRequest, PostResource, PostSpec, RawContent,
    Visibility, CONTENT_API_VERSION,
};
use crate::parser::{text_input, ParseError};

pub fn parse(bytes: &[u8]) -> Result<MigrateData, ParseError> {
    let text = text_input(bytes)?;
    let doc = Document::parse(text)?;
    let root = doc.root_element();
    if root.tag_name().name() != "feed" {
        return Err(ParseError::Format("not an Atom feed".to_string()));
    }

    Ok(MigrateData {
        posts: root
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "entry")
            .filter_map(parse_entry)
            .collect(),
        ..MigrateData::default()
    })
}

fn parse_entry(entry: Node) -> Option<MigratePost> {
    let title = child_text(entry, "title");
    let content = child_text(entry, "content");
    let (Some(title), Some(content)) = (title, content) else {
        warn!("skipping feed entry without title or content");
        return None;
    };

    let publish_time = child_text(entry, "published")
        .or_else(|| child_text(entry, "updated"))
        .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));

    Some(MigratePost {
        post_request: PostRequest {
            post: PostResource {
                api_version: CONTENT_API_VERSION.to_string(),
                kind: "Post".to_string(),
                metadata: Metadata::named(Uuid::new_v4().to_string()),
                spec: PostSpec {
                    slug: markdown::slugify(&title),
                    title,
                    template: None,
                    cover: None,
                    deleted: false,
                    publish: true,
                    publish_time: Some(publish_time),
                    pinned: false,
                    allow_comment: true,
                    visible: Visibility::Public,
                    priority: 0,
                    excerpt: Excerpt::raw(child_text(entry, "summary").unwrap_or_default()),
                    categories: Vec::new(),
                    tags: Vec::new(),
                    html_metas: Vec::new(),
                },
            },
            content: RawContent::html(content),
        },
        counter: None,
    })
}

fn child_text(node: Node, local: &str) -> Option<String> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == local)
        .and_then(|n| n.text())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(entries: &str) -> Vec<u8> {
        format!(
            r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom"><title>Blog</title>{entries}</feed>"#
        )
        .into_bytes()
    }

    #[test]
    fn rejects_non_atom_input() {
        assert!(matches!(
            parse(b"<rss version=\"2.0\"/>"),
            Err(ParseError::Format(_))
        ));
    }

    #[test]
    fn entries_without_title_or_content_are_dropped() {
        let bytes = feed(
            r#"<entry><title>Kept</title><content>body</content>
  <published>2020-06-01T12:00:00Z</published></entry>
<entry><title>No body</title></entry>
<entry><content>no title</content></entry>"#,
        );
        let data = parse(&bytes).expect("parse feed");
        assert_eq!(data.posts.len(), 1);
        let spec = &data.posts[0].post_request.post.spec;
        assert_eq!(spec.title, "Kept");
        assert_eq!(spec.slug, "kept");
        assert_eq!(spec.publish_time.as_deref(), Some("2020-06-01T12:00:00Z"));
    }

    #[test]
    fn updated_backfills_missing_published() {
        let bytes = feed(
            r#"<entry><title>A</title><content>b</content>
  <updated>2021-01-01T00:00:00Z</updated></entry>"#,
        );
        let data = parse(&bytes).expect("parse feed");
        assert_eq!(
            data.posts[0].post_request.post.spec.publish_time.as_deref(),
            Some("2021-01-01T00:00:00Z")
        );
    }

    #[test]
    fn summary_becomes_the_raw_excerpt() {
        let bytes = feed(
            r#"<entry><title>A</title><content>b</content><summary>short</summary></entry>"#,
        );
        let data = parse(&bytes).expect("parse feed");
        assert_eq!(
            data.posts[0].post_request.post.spec.excerpt.raw.as_deref(),
            Some("short")
        );
    }
}
