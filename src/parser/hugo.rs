//! Hugo site archive normalizer.
//!
//! A Hugo export is a ZIP of the site tree. Documents live under `content/`,
//! possibly below an extra top-level directory when the site was zipped from
//! its parent, or at the archive root when only the content tree was zipped.
//! The first path segment after the content base names the
//! section, which decides whether a markdown file becomes a post, a page or
//! gets ignored.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use tracing::warn;
use uuid::Uuid;
use zip::ZipArchive;

use crate::markdown;
use crate::matter::{self, Document};
use crate::model::{
    CategorySpec, Excerpt, Metadata, MigrateCategory, MigrateData, MigratePost, MigrateSinglePage,
    MigrateTag, PostRequest, PostResource, PostSpec, RawContent, SinglePageRequest,
    SinglePageResource, SinglePageSpec, TagSpec, Visibility, CONTENT_API_VERSION,
};
use crate::parser::{date_string_to_rfc3339, ParseError, ParseOptions};

const CONTENT_DIR: &str = "content/";

pub fn parse(bytes: &[u8], options: &ParseOptions) -> Result<MigrateData, ParseError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let base = content_base(&mut archive)?;

    // Terms are synthesized from front matter; names are stable per display
    // name within one archive.
    let mut tags: BTreeMap<String, String> = BTreeMap::new();
    let mut categories: BTreeMap<String, String> = BTreeMap::new();
    let mut data = MigrateData::default();

    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        let Some(relative) = name.strip_prefix(&base) else {
            continue;
        };
        if !relative.ends_with(".md") {
            continue;
        }
        let Some((section, _)) = relative.split_once('/') else {
            continue;
        };
        let section = section.to_string();

        let mut text = String::new();
        file.read_to_string(&mut text)?;
        let document = match matter::parse_document(&text) {
            Ok(document) => document,
            Err(error) => {
                warn!(file = %name, %error, "skipping document");
                continue;
            }
        };

        if options.post_sections.iter().any(|s| *s == section) {
            data.posts.push(parse_post(&document, &mut tags, &mut categories));
        } else if options.page_sections.iter().any(|s| *s == section) {
            data.pages.push(parse_page(&document));
        } else {
            warn!(file = %name, section = %section, "ignoring unknown section");
        }
    }

    data.tags = tags
        .into_iter()
        .map(|(display_name, name)| {
            let slug = markdown::slugify(&display_name);
            MigrateTag::new(
                name,
                TagSpec {
                    display_name,
                    slug,
                    color: None,
                    cover: None,
                },
            )
        })
        .collect();
    data.categories = categories
        .into_iter()
        .map(|(display_name, name)| {
            let slug = markdown::slugify(&display_name);
            MigrateCategory::new(
                name,
                CategorySpec {
                    display_name,
                    slug,
                    description: None,
                    cover: None,
                    priority: 0,
                    children: Vec::new(),
                },
            )
        })
        .collect();
    Ok(data)
}

/// Sections present in the archive, for operator inspection before choosing
/// section mappings.
pub fn sections(bytes: &[u8]) -> Result<Vec<String>, ParseError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let base = content_base(&mut archive)?;
    let mut sections: Vec<String> = Vec::new();
    for index in 0..archive.len() {
        let file = archive.by_index(index)?;
        let name = file.name().to_string();
        let Some(relative) = name.strip_prefix(&base) else {
            continue;
        };
        let Some((section, rest)) = relative.split_once('/') else {
            continue;
        };
        if rest.is_empty() && !file.is_dir() {
            continue;
        }
        if !section.is_empty() && !sections.iter().any(|s| s == section) {
            sections.push(section.to_string());
        }
    }
    Ok(sections)
}

/// Archives zipped from the site root carry a `content/` directory; bare
/// archives of the content tree itself have the sections at the root.
fn content_base(archive: &mut ZipArchive<Cursor<&[u8]>>) -> Result<String, ParseError> {
    for index in 0..archive.len() {
        let file = archive.by_index(index)?;
        let name = file.name();
        if name == CONTENT_DIR || name.ends_with(&format!("/{CONTENT_DIR}")) {
            return Ok(name.to_string());
        }
    }
    Ok(String::new())
}

fn publish_time(document: &Document) -> Option<String> {
    let raw = document.date()?;
    let normalized = date_string_to_rfc3339(raw);
    if normalized.is_none() {
        warn!(date = raw, "ignoring unparseable front matter date");
    }
    normalized
}

fn term_name(table: &mut BTreeMap<String, String>, display_name: &str) -> String {
    table
        .entry(display_name.to_string())
        .or_insert_with(|| Uuid::new_v4().to_string())
        .clone()
}

fn parse_post(
    document: &Document,
    tags: &mut BTreeMap<String, String>,
    categories: &mut BTreeMap<String, String>,
) -> MigratePost {
    let title = document.title().unwrap_or_default().to_string();
    let slug = document
        .slug()
        .map(str::to_string)
        .unwrap_or_else(|| markdown::slugify(&title));
    MigratePost {
        post_request: PostRequest {
            post: PostResource {
                api_version: CONTENT_API_VERSION.to_string(),
                kind: "Post".to_string(),
                metadata: Metadata::named(Uuid::new_v4().to_string()),
                spec: PostSpec {
                    title,
                    slug,
                    template: None,
                    cover: None,
                    deleted: false,
                    publish: !document.draft(),
                    publish_time: publish_time(document),
                    pinned: false,
                    allow_comment: true,
                    visible: Visibility::Public,
                    priority: 0,
                    excerpt: Excerpt::auto(),
                    categories: document
                        .string_list("categories")
                        .iter()
                        .map(|c| term_name(categories, c))
                        .collect(),
                    tags: document
                        .string_list("tags")
                        .iter()
                        .map(|t| term_name(tags, t))
                        .collect(),
                    html_metas: Vec::new(),
                },
            },
            content: RawContent::markdown(
                document.body.clone(),
                markdown::render_html(&document.body),
            ),
        },
        counter: None,
    }
}

fn parse_page(document: &Document) -> MigrateSinglePage {
    let title = document.title().unwrap_or_default().to_string();
    let slug = document
        .slug()
        .map(str::to_string)
        .unwrap_or_else(|| markdown::slugify(&title));
    MigrateSinglePage {
        single_page_request: SinglePageRequest {
            page: SinglePageResource {
                api_version: CONTENT_API_VERSION.to_string(),
                kind: "SinglePage".to_string(),
                metadata: Metadata::named(Uuid::new_v4().to_string()),
                spec: SinglePageSpec {
                    title,
                    slug,
                    template: None,
                    cover: None,
                    deleted: false,
                    publish: !document.draft(),
                    publish_time: publish_time(document),
                    pinned: false,
                    allow_comment: true,
                    visible: Visibility::Public,
                    priority: 0,
                    excerpt: Excerpt::auto(),
                    html_metas: Vec::new(),
                },
            },
            content: RawContent::markdown(
                document.body.clone(),
                markdown::render_html(&document.body),
            ),
        },
        counter: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn archive(files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default();
        writer
            .add_directory("site/content/", options)
            .expect("add content dir");
        for (name, body) in files {
            writer.start_file(*name, options).expect("start file");
            writer.write_all(body.as_bytes()).expect("write file");
        }
        writer.finish().expect("finish archive").into_inner()
    }

    #[test]
    fn bare_archive_parses_from_the_root() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default();
        writer
            .start_file("posts/a.md", options)
            .expect("start file");
        writer
            .write_all(b"---\ntitle: Bare\n---\nbody\n")
            .expect("write file");
        let bytes = writer.finish().expect("finish archive").into_inner();
        let data = parse(&bytes, &ParseOptions::default()).expect("parse bare archive");
        assert_eq!(data.posts.len(), 1);
        assert_eq!(data.posts[0].post_request.post.spec.title, "Bare");
    }

    #[test]
    fn front_matter_dates_normalize_to_rfc3339() {
        let bytes = archive(&[
            (
                "site/content/posts/a.md",
                "---\ntitle: Dated\ndate: \"2020-01-01\"\n---\na\n",
            ),
            (
                "site/content/posts/b.md",
                "---\ntitle: Zoned\ndate: \"2020-01-01T08:00:00+08:00\"\n---\nb\n",
            ),
            (
                "site/content/posts/c.md",
                "---\ntitle: Junk\ndate: \"someday\"\n---\nc\n",
            ),
        ]);
        let data = parse(&bytes, &ParseOptions::default()).expect("parse archive");
        let time_of = |title: &str| {
            data.posts
                .iter()
                .find(|p| p.post_request.post.spec.title == title)
                .expect("post by title")
                .post_request
                .post
                .spec
                .publish_time
                .clone()
        };
        assert_eq!(time_of("Dated").as_deref(), Some("2020-01-01T00:00:00.000Z"));
        assert_eq!(time_of("Zoned").as_deref(), Some("2020-01-01T00:00:00.000Z"));
        assert_eq!(time_of("Junk"), None);
    }

    #[test]
    fn routes_sections_and_synthesizes_terms() {
        let bytes = archive(&[
            (
                "site/content/posts/a.md",
                "---\ntitle: First\ntags:\n  - rust\ncategories:\n  - dev\n---\nbody a\n",
            ),
            (
                "site/content/posts/b.md",
                "---\ntitle: Second\ntags:\n  - rust\n---\nbody b\n",
            ),
            ("site/content/pages/about.md", "---\ntitle: About\n---\nhello\n"),
            ("site/content/unknown/x.md", "---\ntitle: X\n---\nx\n"),
            ("site/content/posts/broken.md", "no front matter here\n"),
        ]);
        let data = parse(&bytes, &ParseOptions::default()).expect("parse archive");

        assert_eq!(data.posts.len(), 2);
        assert_eq!(data.pages.len(), 1);
        // Shared tag resolves to one synthesized term.
        assert_eq!(data.tags.len(), 1);
        assert_eq!(data.categories.len(), 1);
        let tag_name = &data.tags[0].metadata.name;
        for post in &data.posts {
            assert_eq!(&post.post_request.post.spec.tags, &[tag_name.clone()]);
        }
        assert_eq!(data.tags[0].spec.slug, "rust");
    }

    #[test]
    fn draft_documents_stay_unpublished() {
        let bytes = archive(&[(
            "site/content/posts/d.md",
            "---\ntitle: Draft\ndraft: true\nslug: my-draft\n---\nwip\n",
        )]);
        let data = parse(&bytes, &ParseOptions::default()).expect("parse archive");
        let spec = &data.posts[0].post_request.post.spec;
        assert!(!spec.publish);
        assert_eq!(spec.slug, "my-draft");
    }

    #[test]
    fn lists_sections_in_archive() {
        let bytes = archive(&[
            ("site/content/posts/a.md", "---\ntitle: A\n---\na\n"),
            ("site/content/notes/n.md", "---\ntitle: N\n---\nn\n"),
        ]);
        let found = sections(&bytes).expect("list sections");
        assert!(found.contains(&"posts".to_string()));
        assert!(found.contains(&"notes".to_string()));
    }
}
