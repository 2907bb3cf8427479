//! Ghost JSON export normalizer.
//!
//! Ghost exports wrap the interesting tables in `db[0].data`. Posts and pages
//! share the `posts` table and are told apart by `type`; tag membership comes
//! from the `posts_tags` join table.

use serde::Deserialize;

use crate::model::{
    Excerpt, Metadata, MigrateData, MigratePost, MigrateSinglePage, MigrateTag, PostRequest,
    PostResource, PostSpec, RawContent, SinglePageRequest, SinglePageResource, SinglePageSpec,
    TagSpec, Visibility, CONTENT_API_VERSION,
};
use crate::parser::{text_input, ParseError};

pub fn parse(bytes: &[u8]) -> Result<MigrateData, ParseError> {
    let text = text_input(bytes)?;
    let export: Export = serde_json::from_str(text)?;
    let data = export
        .db
        .into_iter()
        .next()
        .map(|db| db.data)
        .ok_or_else(|| ParseError::Format("export has no db entry".to_string()))?;

    Ok(MigrateData {
        tags: data
            .tags
            .iter()
            .map(|tag| {
                MigrateTag::new(
                    tag.id.clone(),
                    TagSpec {
                        display_name: tag.name.clone(),
                        slug: tag.slug.clone(),
                        color: tag.accent_color.clone(),
                        cover: tag.feature_image.clone(),
                    },
                )
            })
            .collect(),
        posts: data
            .posts
            .iter()
            .filter(|post| post.kind == "post")
            .map(|post| parse_post(post, &data.posts_tags))
            .collect(),
        pages: data
            .posts
            .iter()
            .filter(|post| post.kind == "page")
            .map(parse_page)
            .collect(),
        ..MigrateData::default()
    })
}

#[derive(Deserialize)]
struct Export {
    #[serde(default)]
    db: Vec<Db>,
}

#[derive(Deserialize)]
struct Db {
    data: Data,
}

#[derive(Deserialize)]
struct Data {
    #[serde(default)]
    posts: Vec<RawPost>,
    #[serde(default)]
    tags: Vec<RawTag>,
    #[serde(default)]
    posts_tags: Vec<RawPostTag>,
}

#[derive(Deserialize)]
struct RawTag {
    id: String,
    name: String,
    slug: String,
    #[serde(default)]
    accent_color: Option<String>,
    #[serde(default)]
    feature_image: Option<String>,
}

#[derive(Deserialize)]
struct RawPost {
    id: String,
    title: String,
    slug: String,
    #[serde(rename = "type")]
    kind: String,
    status: String,
    #[serde(default)]
    featured: i32,
    visibility: String,
    #[serde(default)]
    html: Option<String>,
    #[serde(default)]
    plaintext: Option<String>,
    #[serde(default)]
    custom_excerpt: Option<String>,
    #[serde(default)]
    feature_image: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
}

#[derive(Deserialize)]
struct RawPostTag {
    post_id: String,
    tag_id: String,
}

fn parse_post(post: &RawPost, posts_tags: &[RawPostTag]) -> MigratePost {
    MigratePost {
        post_request: PostRequest {
            post: PostResource {
                api_version: CONTENT_API_VERSION.to_string(),
                kind: "Post".to_string(),
                metadata: Metadata::named(post.id.clone()),
                spec: PostSpec {
                    title: post.title.clone(),
                    slug: post.slug.clone(),
                    template: None,
                    cover: post.feature_image.clone(),
                    deleted: false,
                    publish: post.status == "published",
                    publish_time: post.published_at.clone(),
                    pinned: post.featured == 1,
                    allow_comment: true,
                    visible: visibility(&post.visibility),
                    priority: 0,
                    excerpt: excerpt(post),
                    categories: Vec::new(),
                    tags: posts_tags
                        .iter()
                        .filter(|join| join.post_id == post.id)
                        .map(|join| join.tag_id.clone())
                        .collect(),
                    html_metas: Vec::new(),
                },
            },
            content: RawContent::html(post.html.clone().unwrap_or_default()),
        },
        counter: None,
    }
}

fn parse_page(page: &RawPost) -> MigrateSinglePage {
    MigrateSinglePage {
        single_page_request: SinglePageRequest {
            page: SinglePageResource {
                api_version: CONTENT_API_VERSION.to_string(),
                kind: "SinglePage".to_string(),
                metadata: Metadata::named(page.id.clone()),
                spec: SinglePageSpec {
                    title: page.title.clone(),
                    slug: page.slug.clone(),
                    template: None,
                    cover: page.feature_image.clone(),
                    deleted: false,
                    publish: page.status == "published",
                    publish_time: page.published_at.clone(),
                    pinned: false,
                    allow_comment: true,
                    visible: visibility(&page.visibility),
                    priority: 0,
                    excerpt: excerpt(page),
                    html_metas: Vec::new(),
                },
            },
            content: RawContent::html(page.html.clone().unwrap_or_default()),
        },
        counter: None,
    }
}

fn visibility(raw: &str) -> Visibility {
    if raw == "public" {
        Visibility::Public
    } else {
        Visibility::Private
    }
}

/// Custom excerpt wins, then plaintext; only an empty plaintext falls back to
/// auto generation.
fn excerpt(post: &RawPost) -> Excerpt {
    if let Some(custom) = post.custom_excerpt.as_ref().filter(|c| !c.is_empty()) {
        return Excerpt::raw(custom.clone());
    }
    match post.plaintext.as_ref().filter(|p| !p.is_empty()) {
        Some(plain) => Excerpt::raw(plain.clone()),
        None => Excerpt::auto(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn export(posts: serde_json::Value, tags: serde_json::Value, joins: serde_json::Value) -> Vec<u8> {
        serde_json::json!({
            "db": [{ "data": { "posts": posts, "tags": tags, "posts_tags": joins } }]
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn rejects_export_without_db_entry() {
        let bytes = serde_json::json!({ "db": [] }).to_string().into_bytes();
        assert!(matches!(parse(&bytes), Err(ParseError::Format(_))));
    }

    #[test]
    fn splits_posts_and_pages_and_joins_tags() {
        let bytes = export(
            serde_json::json!([
                {
                    "id": "p1", "title": "One", "slug": "one", "type": "post",
                    "status": "published", "featured": 1, "visibility": "public",
                    "html": "<p>hi</p>", "plaintext": "hi",
                    "published_at": "2021-05-01T10:00:00.000Z"
                },
                {
                    "id": "pg1", "title": "About", "slug": "about", "type": "page",
                    "status": "draft", "visibility": "members",
                    "html": "<p>about</p>", "plaintext": ""
                }
            ]),
            serde_json::json!([
                { "id": "t1", "name": "Rust", "slug": "rust", "accent_color": "#fff" }
            ]),
            serde_json::json!([
                { "post_id": "p1", "tag_id": "t1" },
                { "post_id": "other", "tag_id": "t1" }
            ]),
        );
        let data = parse(&bytes).expect("parse ghost export");

        assert_eq!(data.posts.len(), 1);
        assert_eq!(data.pages.len(), 1);
        assert_eq!(data.tags.len(), 1);
        assert_eq!(data.tags[0].spec.color.as_deref(), Some("#fff"));

        let spec = &data.posts[0].post_request.post.spec;
        assert!(spec.publish);
        assert!(spec.pinned);
        assert_eq!(spec.tags, vec!["t1"]);
        assert_eq!(spec.excerpt.raw.as_deref(), Some("hi"));
        assert_eq!(spec.publish_time.as_deref(), Some("2021-05-01T10:00:00.000Z"));

        let page = &data.pages[0].single_page_request.page.spec;
        assert!(!page.publish);
        assert_eq!(page.visible, Visibility::Private);
        assert!(page.excerpt.auto_generate);
    }
}
