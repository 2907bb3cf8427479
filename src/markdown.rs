//! Markdown rendering for migrated content.
//!
//! Converts Markdown source into HTML with [pulldown-cmark], assigning every
//! heading a stable `id` derived from its text so intra-document anchors keep
//! working after migration. IDs are deduplicated within a single document by
//! appending `-1`, `-2` and so on to repeats.

use std::collections::HashMap;

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd};

/// Render Markdown to HTML, giving each heading a text-derived `id`.
pub fn render_html(markdown: &str) -> String {
    let options = Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_HEADING_ATTRIBUTES;
    let mut events: Vec<Event> = Parser::new_ext(markdown, options).collect();

    // Count per base ID, scoped to this document.
    let mut seen: HashMap<String, usize> = HashMap::new();

    for index in 0..events.len() {
        let Event::Start(Tag::Heading { id, .. }) = &events[index] else {
            continue;
        };
        if id.is_some() {
            // An explicit `{#anchor}` attribute wins.
            continue;
        }
        let text = heading_text(&events[index + 1..]);
        let slug = heading_id(&text, &mut seen);
        if let Event::Start(Tag::Heading { id, .. }) = &mut events[index] {
            *id = Some(CowStr::from(slug));
        }
    }

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events.into_iter());
    out
}

/// Collect the literal text of a heading from the events following its
/// start tag, up to the matching end tag.
fn heading_text(events: &[Event]) -> String {
    let mut text = String::new();
    for event in events {
        match event {
            Event::End(TagEnd::Heading(_)) => break,
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            _ => {}
        }
    }
    text
}

fn heading_id(text: &str, seen: &mut HashMap<String, usize>) -> String {
    let base = text.trim().replace(' ', "-");
    let count = seen.entry(base.clone()).or_insert(0);
    let id = if *count == 0 {
        base.clone()
    } else {
        format!("{base}-{count}")
    };
    *count += 1;
    id
}

/// Reduce a title to a URL-safe slug: lowercase alphanumerics joined by
/// single hyphens. Non-ASCII letters are kept so CJK titles stay usable.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;
    for ch in text.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            for lower in ch.to_lowercase() {
                slug.push(lower);
            }
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_get_text_ids() {
        let html = render_html("# Intro\n\nbody\n\n## Second Part\n");
        assert!(html.contains("<h1 id=\"Intro\">Intro</h1>"));
        assert!(html.contains("<h2 id=\"Second-Part\">Second Part</h2>"));
    }

    #[test]
    fn duplicate_headings_are_deduplicated() {
        let html = render_html("# Intro\n\n## Intro\n\n### Intro\n");
        assert!(html.contains("<h1 id=\"Intro\">"));
        assert!(html.contains("<h2 id=\"Intro-1\">"));
        assert!(html.contains("<h3 id=\"Intro-2\">"));
    }

    #[test]
    fn dedup_state_is_per_document() {
        let first = render_html("# Intro\n");
        let second = render_html("# Intro\n");
        assert_eq!(first, second);
        assert!(second.contains("id=\"Intro\""));
    }

    #[test]
    fn explicit_anchor_attribute_wins() {
        let html = render_html("# Intro {#custom}\n");
        assert!(html.contains("id=\"custom\""));
    }

    #[test]
    fn inline_code_counts_toward_heading_text() {
        let html = render_html("## Using `serde` here\n");
        assert!(html.contains("id=\"Using-serde-here\""));
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Hello,  World!"), "hello-world");
        assert_eq!(slugify("  Rust 2024  "), "rust-2024");
        assert_eq!(slugify("中文 标题"), "中文-标题");
    }
}
