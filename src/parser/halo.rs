//! Legacy Halo 1.x JSON export normalizer.
//!
//! The export is one large JSON object of relational tables keyed by table
//! name (`posts`, `contents`, `post_tags`, ...). Entity ids carry over as
//! metadata names unchanged, so references stay stable across the migration.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::model::{
    CategorySpec, CommentOwner, CommentSpec, Counter, Excerpt, LinkSpec, MenuItemResource,
    MenuItemSpec, Metadata, MigrateAttachment, MigrateCategory, MigrateComment, MigrateData,
    MigrateLink, MigrateMenuItem, MigrateMoment, MigratePhoto, MigratePost, MigrateSinglePage,
    MigrateTag, MomentContent, MomentSpec, PhotoSpec, PostRequest, PostResource, PostSpec,
    RawContent, Ref, SinglePageRequest, SinglePageResource, SinglePageSpec, SubjectKind, TagSpec,
    Visibility, CONTENT_API_VERSION, CORE_API_VERSION, MOMENT_API_VERSION,
};
use crate::parser::{epoch_ms_to_rfc3339, ParseError};
use crate::resolve::{self, ThreadSource};

const SUPPORTED_VERSIONS: [&str; 2] = ["1.5", "1.6"];

pub fn parse(bytes: &[u8]) -> Result<MigrateData, ParseError> {
    let export: Export = serde_json::from_slice(bytes)?;
    if !SUPPORTED_VERSIONS
        .iter()
        .any(|prefix| export.version.starts_with(prefix))
    {
        return Err(ParseError::UnsupportedVersion {
            found: export.version,
            expected: "1.5 / 1.6".to_string(),
        });
    }

    Ok(MigrateData {
        tags: parse_tags(&export.tags),
        categories: parse_categories(&export.categories),
        posts: parse_posts(&export),
        pages: parse_pages(&export),
        comments: parse_comments(&export),
        menu_items: parse_menus(&export.menus),
        moments: parse_moments(&export.journals),
        photos: parse_photos(&export.photos),
        links: parse_links(&export.links),
        attachments: parse_attachments(&export.attachments),
    })
}

fn parse_tags(tags: &[RawTag]) -> Vec<MigrateTag> {
    tags.iter()
        .map(|tag| {
            MigrateTag::new(
                tag.id.to_string(),
                TagSpec {
                    display_name: tag.name.clone(),
                    slug: tag.slug.clone(),
                    color: tag.color.clone(),
                    cover: tag.thumbnail.clone(),
                },
            )
        })
        .collect()
}

fn parse_categories(categories: &[RawCategory]) -> Vec<MigrateCategory> {
    let mut out: Vec<MigrateCategory> = categories
        .iter()
        .map(|category| {
            MigrateCategory::new(
                category.id.to_string(),
                CategorySpec {
                    display_name: category.name.clone(),
                    slug: category.slug.clone(),
                    description: category.description.clone(),
                    cover: category.thumbnail.clone(),
                    priority: category.priority,
                    children: Vec::new(),
                },
            )
        })
        .collect();
    let pairs: Vec<(String, String)> = categories
        .iter()
        .filter(|c| c.parent_id != 0)
        .map(|c| (c.id.to_string(), c.parent_id.to_string()))
        .collect();
    resolve::attach_children(
        &mut out,
        &pairs,
        |c| &c.metadata.name,
        |c| &mut c.spec.children,
    );
    out
}

fn parse_posts(export: &Export) -> Vec<MigratePost> {
    export
        .posts
        .iter()
        .map(|post| {
            let content = export.contents.iter().find(|c| c.id == post.id);
            let tag_ids = export
                .post_tags
                .iter()
                .filter(|join| join.post_id == post.id)
                .map(|join| join.tag_id.to_string())
                .collect();
            let category_ids = export
                .post_categories
                .iter()
                .filter(|join| join.post_id == post.id)
                .map(|join| join.category_id.to_string())
                .collect();
            let annotations = collect_metas(&export.post_metas, post.id);

            MigratePost {
                post_request: PostRequest {
                    post: PostResource {
                        api_version: CONTENT_API_VERSION.to_string(),
                        kind: "Post".to_string(),
                        metadata: Metadata {
                            name: post.id.to_string(),
                            annotations,
                        },
                        spec: PostSpec {
                            title: post.title.clone(),
                            slug: post.slug.clone(),
                            template: Some(String::new()),
                            cover: post.thumbnail.clone(),
                            deleted: post.status == "RECYCLE",
                            publish: post.status == "PUBLISHED",
                            publish_time: epoch_ms_to_rfc3339(post.create_time),
                            pinned: post.top_priority > 0,
                            allow_comment: !post.disallow_comment,
                            visible: Visibility::Public,
                            priority: 0,
                            excerpt: match &post.summary {
                                Some(summary) => Excerpt::raw(summary.clone()),
                                None => Excerpt::auto(),
                            },
                            categories: category_ids,
                            tags: tag_ids,
                            html_metas: Vec::new(),
                        },
                    },
                    content: RawContent::markdown(
                        content
                            .and_then(|c| c.original_content.clone())
                            .unwrap_or_default(),
                        content.and_then(|c| c.content.clone()).unwrap_or_default(),
                    ),
                },
                counter: Some(Counter {
                    visit: Some(post.visits),
                    upvote: Some(post.likes),
                    downvote: None,
                    approved_comment: None,
                }),
            }
        })
        .collect()
}

fn parse_pages(export: &Export) -> Vec<MigrateSinglePage> {
    export
        .sheets
        .iter()
        .map(|sheet| {
            let content = export.contents.iter().find(|c| c.id == sheet.id);
            let annotations = collect_metas(&export.sheet_metas, sheet.id);

            MigrateSinglePage {
                single_page_request: SinglePageRequest {
                    page: SinglePageResource {
                        api_version: CONTENT_API_VERSION.to_string(),
                        kind: "SinglePage".to_string(),
                        metadata: Metadata {
                            name: sheet.id.to_string(),
                            annotations,
                        },
                        spec: SinglePageSpec {
                            title: sheet.title.clone(),
                            slug: sheet.slug.clone(),
                            template: Some(String::new()),
                            cover: sheet.thumbnail.clone(),
                            deleted: sheet.status == "RECYCLE",
                            publish: sheet.status == "PUBLISHED",
                            publish_time: epoch_ms_to_rfc3339(sheet.create_time),
                            pinned: sheet.top_priority > 0,
                            allow_comment: !sheet.disallow_comment,
                            visible: Visibility::Public,
                            priority: 0,
                            excerpt: match &sheet.summary {
                                Some(summary) => Excerpt::raw(summary.clone()),
                                None => Excerpt::auto(),
                            },
                            html_metas: Vec::new(),
                        },
                    },
                    content: RawContent::markdown(
                        content
                            .and_then(|c| c.original_content.clone())
                            .unwrap_or_default(),
                        content.and_then(|c| c.content.clone()).unwrap_or_default(),
                    ),
                },
                counter: Some(Counter {
                    visit: Some(sheet.visits),
                    upvote: Some(sheet.likes),
                    downvote: None,
                    approved_comment: None,
                }),
            }
        })
        .collect()
}

fn parse_comments(export: &Export) -> Vec<crate::model::CommentEntry> {
    let mut entries = comment_group(&export.post_comments, SubjectKind::Post);
    entries.extend(comment_group(&export.sheet_comments, SubjectKind::SinglePage));
    entries.extend(comment_group(&export.journal_comments, SubjectKind::Moment));
    entries
}

fn comment_group(comments: &[RawComment], kind: SubjectKind) -> Vec<crate::model::CommentEntry> {
    let sources = comments
        .iter()
        .map(|comment| ThreadSource {
            id: comment.id.to_string(),
            parent_id: (comment.parent_id != 0).then(|| comment.parent_id.to_string()),
            comment: build_comment(comment, kind),
        })
        .collect();
    resolve::flatten_comments(sources)
}

fn build_comment(comment: &RawComment, kind: SubjectKind) -> MigrateComment {
    let mut owner = CommentOwner::email(comment.email.clone(), comment.author.clone());
    if let Some(gravatar) = &comment.gravatar_md5 {
        owner = owner.with_annotation(
            "avatar",
            format!("https://www.gravatar.com/avatar/{gravatar}?s=64&d=identicon&r=PG"),
        );
    }
    if let Some(url) = &comment.author_url {
        owner = owner.with_annotation("website", url.clone());
    }
    let created = epoch_ms_to_rfc3339(comment.create_time).unwrap_or_default();
    MigrateComment {
        ref_type: kind,
        api_version: CONTENT_API_VERSION.to_string(),
        kind: "Comment".to_string(),
        metadata: Metadata::named(comment.id.to_string()),
        spec: CommentSpec {
            raw: comment.content.clone(),
            content: comment.content.clone(),
            owner,
            ip_address: comment.ip_address.clone(),
            user_agent: comment.user_agent.clone(),
            priority: 0,
            top: false,
            allow_notification: comment.allow_notification,
            approved: comment.status == "PUBLISHED",
            approved_time: Some(created.clone()),
            creation_time: created,
            hidden: false,
            subject_ref: Ref::subject(kind, comment.post_id.to_string()),
        },
    }
}

fn parse_menus(menus: &[RawMenu]) -> Vec<MigrateMenuItem> {
    let mut out: Vec<MigrateMenuItem> = menus
        .iter()
        .map(|menu| MigrateMenuItem {
            menu: MenuItemResource::new(
                menu.id.to_string(),
                MenuItemSpec {
                    display_name: menu.name.clone(),
                    priority: menu.priority,
                    children: Vec::new(),
                    href: Some(menu.url.clone()),
                    target_ref: None,
                },
            ),
            group_id: menu.team.clone().unwrap_or_default(),
            group_name: menu.team.clone(),
        })
        .collect();
    let pairs: Vec<(String, String)> = menus
        .iter()
        .filter(|m| m.parent_id != 0)
        .map(|m| (m.id.to_string(), m.parent_id.to_string()))
        .collect();
    resolve::attach_children(
        &mut out,
        &pairs,
        |item| &item.menu.metadata.name,
        |item| &mut item.menu.spec.children,
    );
    out
}

fn parse_moments(journals: &[RawJournal]) -> Vec<MigrateMoment> {
    journals
        .iter()
        .map(|journal| MigrateMoment {
            api_version: MOMENT_API_VERSION.to_string(),
            kind: "Moment".to_string(),
            metadata: Metadata::named(journal.id.to_string()),
            spec: MomentSpec {
                content: MomentContent {
                    raw: journal
                        .source_content
                        .clone()
                        .unwrap_or_else(|| journal.content.clone()),
                    html: journal.content.clone(),
                    medium: Vec::new(),
                },
                release_time: epoch_ms_to_rfc3339(journal.create_time),
                visible: Some(if journal.kind == "PUBLIC" {
                    Visibility::Public
                } else {
                    Visibility::Private
                }),
                owner: None,
                tags: Vec::new(),
            },
        })
        .collect()
}

fn parse_photos(photos: &[RawPhoto]) -> Vec<MigratePhoto> {
    photos
        .iter()
        .map(|photo| MigratePhoto {
            api_version: CORE_API_VERSION.to_string(),
            kind: "Photo".to_string(),
            metadata: Metadata::named(photo.id.to_string()),
            spec: PhotoSpec {
                display_name: photo.name.clone(),
                description: photo.description.clone(),
                url: photo.url.clone(),
                cover: photo.thumbnail.clone(),
                priority: None,
                group_name: photo
                    .team
                    .clone()
                    .filter(|team| !team.is_empty())
                    .unwrap_or_else(|| "default".to_string()),
            },
        })
        .collect()
}

fn parse_links(links: &[RawLink]) -> Vec<MigrateLink> {
    links
        .iter()
        .map(|link| MigrateLink {
            api_version: CORE_API_VERSION.to_string(),
            kind: "Link".to_string(),
            metadata: Metadata::named(link.id.to_string()),
            spec: LinkSpec {
                url: link.url.clone(),
                display_name: link.name.clone(),
                logo: link.logo.clone(),
                description: link.description.clone(),
                priority: Some(link.priority),
                group_name: link
                    .team
                    .clone()
                    .filter(|team| !team.is_empty())
                    .unwrap_or_else(|| "default".to_string()),
            },
        })
        .collect()
}

fn parse_attachments(attachments: &[RawAttachment]) -> Vec<MigrateAttachment> {
    attachments
        .iter()
        .map(|attachment| MigrateAttachment {
            id: attachment.id.to_string(),
            name: attachment.name.clone(),
            path: attachment.path.clone(),
            kind: attachment.kind.as_str().into(),
            group_name: None,
            file_key: attachment.file_key.clone(),
            thumb_path: attachment.thumb_path.clone(),
            media_type: attachment.media_type.clone(),
            suffix: attachment.suffix.clone(),
            width: attachment.width,
            height: attachment.height,
            size: attachment.size,
            tags: Vec::new(),
        })
        .collect()
}

fn collect_metas(metas: &[RawMeta], post_id: i64) -> BTreeMap<String, String> {
    metas
        .iter()
        .filter(|meta| meta.post_id == post_id)
        .map(|meta| (meta.key.clone(), meta.value.clone()))
        .collect()
}

#[derive(Debug, Deserialize)]
struct Export {
    version: String,
    #[serde(default)]
    tags: Vec<RawTag>,
    #[serde(default)]
    categories: Vec<RawCategory>,
    #[serde(default)]
    posts: Vec<RawPost>,
    #[serde(default)]
    contents: Vec<RawContentRow>,
    #[serde(default)]
    post_tags: Vec<RawPostTag>,
    #[serde(default)]
    post_categories: Vec<RawPostCategory>,
    #[serde(default)]
    post_metas: Vec<RawMeta>,
    #[serde(default)]
    sheets: Vec<RawPost>,
    #[serde(default)]
    sheet_metas: Vec<RawMeta>,
    #[serde(default)]
    post_comments: Vec<RawComment>,
    #[serde(default)]
    sheet_comments: Vec<RawComment>,
    #[serde(default)]
    journal_comments: Vec<RawComment>,
    #[serde(default)]
    menus: Vec<RawMenu>,
    #[serde(default)]
    journals: Vec<RawJournal>,
    #[serde(default)]
    photos: Vec<RawPhoto>,
    #[serde(default)]
    links: Vec<RawLink>,
    #[serde(default)]
    attachments: Vec<RawAttachment>,
}

#[derive(Debug, Deserialize)]
struct RawTag {
    id: i64,
    name: String,
    slug: String,
    color: Option<String>,
    thumbnail: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCategory {
    id: i64,
    name: String,
    slug: String,
    description: Option<String>,
    thumbnail: Option<String>,
    #[serde(default)]
    parent_id: i64,
    #[serde(default)]
    priority: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPost {
    id: i64,
    title: String,
    slug: String,
    status: String,
    summary: Option<String>,
    thumbnail: Option<String>,
    create_time: i64,
    #[serde(default)]
    top_priority: i32,
    #[serde(default)]
    disallow_comment: bool,
    #[serde(default)]
    visits: i64,
    #[serde(default)]
    likes: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContentRow {
    id: i64,
    content: Option<String>,
    original_content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPostTag {
    post_id: i64,
    tag_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPostCategory {
    post_id: i64,
    category_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMeta {
    post_id: i64,
    key: String,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawComment {
    id: i64,
    author: String,
    email: String,
    #[serde(default)]
    ip_address: Option<String>,
    author_url: Option<String>,
    gravatar_md5: Option<String>,
    content: String,
    status: String,
    user_agent: Option<String>,
    #[serde(default = "default_true")]
    allow_notification: bool,
    post_id: i64,
    #[serde(default)]
    parent_id: i64,
    create_time: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMenu {
    id: i64,
    name: String,
    url: String,
    #[serde(default)]
    priority: i32,
    #[serde(default)]
    parent_id: i64,
    team: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawJournal {
    id: i64,
    source_content: Option<String>,
    content: String,
    create_time: i64,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPhoto {
    id: i64,
    name: String,
    description: Option<String>,
    thumbnail: Option<String>,
    url: String,
    team: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLink {
    id: i64,
    name: String,
    url: String,
    logo: Option<String>,
    description: Option<String>,
    team: Option<String>,
    #[serde(default)]
    priority: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAttachment {
    id: i64,
    name: String,
    path: String,
    file_key: Option<String>,
    thumb_path: Option<String>,
    media_type: Option<String>,
    suffix: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    size: Option<u64>,
    #[serde(rename = "type")]
    kind: String,
}

fn default_true() -> bool {
    true
}
