//! RSS 2.0 feed normalizer.
//!
//! Feeds carry no stable ids, slugs or taxonomy, so items become posts with
//! generated names and slugs derived from titles. The full body prefers
//! `content:encoded` and falls back to `description`.

use chrono::{DateTime, SecondsFormat};
use roxmltree::{Document, Node};
use uuid::Uuid;

use crate::markdown;
use crate::model::{
    Excerpt, Metadata, MigrateData, MigratePost, PostRequest, PostResource, PostSpec, RawContent,
    Visibility, CONTENT_API_VERSION,
};
use crate::parser::{text_input, ParseError};

const EXCERPT_MAX_CHARS: usize = 200;

pub fn parse(bytes: &[u8]) -> Result<MigrateData, ParseError> {
    let text = text_input(bytes)?;
    let doc = Document::parse(text)?;
    let root = doc.root_element();
    if root.tag_name().name() != "rss" {
        return Err(ParseError::Format("not an RSS document".to_string()));
    }
    let channel = child(root, "channel")
        .ok_or_else(|| ParseError::Format("missing <channel> element".to_string()))?;

    Ok(MigrateData {
        posts: channel
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "item")
            .map(parse_item)
            .collect(),
        ..MigrateData::default()
    })
}

fn parse_item(item: Node) -> MigratePost {
    let title = child_text(item, "title").unwrap_or_default();
    let description = child_text(item, "description").unwrap_or_default();
    let content = content_encoded(item).unwrap_or_else(|| description.clone());

    MigratePost {
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
                    publish_time: child_text(item, "pubDate")
                        .as_deref()
                        .and_then(parse_rfc2822),
                    pinned: false,
                    allow_comment: true,
                    visible: Visibility::Public,
                    priority: 0,
                    excerpt: Excerpt::raw(truncate_chars(&description, EXCERPT_MAX_CHARS)),
                    categories: Vec::new(),
                    tags: Vec::new(),
                    html_metas: Vec::new(),
                },
            },
            content: RawContent::html(content),
        },
        counter: None,
    }
}

fn parse_rfc2822(text: &str) -> Option<String> {
    DateTime::parse_from_rfc2822(text)
        .ok()
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Truncate to a character count, never splitting a UTF-8 sequence.
fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn child<'a, 'input>(node: Node<'a, 'input>, local: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == local && n.tag_name().namespace().is_none())
}

fn child_text(node: Node, local: &str) -> Option<String> {
    child(node, local).and_then(|n| n.text()).map(str::to_string)
}

fn content_encoded(item: Node) -> Option<String> {
    item.children()
        .find(|n| {
            n.is_element()
                && n.tag_name().name() == "encoded"
                && n.tag_name().namespace().is_some_and(|ns| ns.contains("modules/content"))
        })
        .and_then(|n| n.text())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(items: &str) -> Vec<u8> {
        format!(
            r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
<channel><title>Blog</title>{items}</channel></rss>"#
        )
        .into_bytes()
    }

    #[test]
    fn rejects_non_rss_input() {
        assert!(matches!(parse(b"<feed/>"), Err(ParseError::Format(_))));
    }

    #[test]
    fn prefers_encoded_content_over_description() {
        let bytes = feed(
            r#"<item>
  <title>Hello World</title>
  <description>summary</description>
  <content:encoded><![CDATA[<p>full</p>]]></content:encoded>
  <pubDate>Wed, 01 Jan 2020 00:00:00 GMT</pubDate>
</item>"#,
        );
        let data = parse(&bytes).expect("parse feed");
        assert_eq!(data.posts.len(), 1);
        let post = &data.posts[0];
        assert_eq!(post.post_request.content.raw, "<p>full</p>");
        let spec = &post.post_request.post.spec;
        assert_eq!(spec.slug, "hello-world");
        assert_eq!(spec.excerpt.raw.as_deref(), Some("summary"));
        assert_eq!(spec.publish_time.as_deref(), Some("2020-01-01T00:00:00.000Z"));
    }

    #[test]
    fn description_is_the_fallback_body() {
        let bytes = feed("<item><title>A</title><description>only</description></item>");
        let data = parse(&bytes).expect("parse feed");
        assert_eq!(data.posts[0].post_request.content.raw, "only");
    }

    #[test]
    fn excerpt_truncation_respects_multibyte_boundaries() {
        let long: String = "日".repeat(300);
        let bytes = feed(&format!(
            "<item><title>B</title><description>{long}</description></item>"
        ));
        let data = parse(&bytes).expect("parse feed");
        let excerpt = data.posts[0]
            .post_request
            .post
            .spec
            .excerpt
            .raw
            .as_deref()
            .expect("raw excerpt");
        assert_eq!(excerpt.chars().count(), 200);
    }
}
