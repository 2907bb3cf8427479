//! Typecho binary backup normalizer.
//!
//! Rides on the backup block decoder; this layer only joins the recovered
//! tables. Resource names are prefixed by table (`post-`, `page-`, `tag-`,
//! `category-`, `comment-`, `attachment-`) so ids from different tables
//! cannot collide on the target.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::decode::php;
use crate::decode::typecho::{decode, Row};
use crate::markdown;
use crate::model::{
    AttachmentKind, CategorySpec, CommentOwner, CommentSpec, Excerpt, Metadata, MigrateAttachment,
    MigrateCategory, MigrateComment, MigrateData, MigratePost, MigrateSinglePage, MigrateTag,
    PostRequest, PostResource, PostSpec, RawContent, Ref, SinglePageRequest, SinglePageResource,
    SinglePageSpec, SubjectKind, TagSpec, Visibility, CONTENT_API_VERSION,
};
use crate::parser::{epoch_secs_to_rfc3339, ParseError};
use crate::resolve::{self, ThreadSource};

static HTML_COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("html comment pattern"));

pub fn parse(bytes: &[u8]) -> Result<MigrateData, ParseError> {
    let backup = decode(bytes)?;

    let tags: Vec<&Row> = metas_of_type(&backup.metas, "tag");
    let categories: Vec<&Row> = metas_of_type(&backup.metas, "category");
    let tag_mids: Vec<&str> = tags.iter().filter_map(|row| col(row, "mid")).collect();
    let category_mids: Vec<&str> =
        categories.iter().filter_map(|row| col(row, "mid")).collect();

    // cid -> mids, from the relationships join table.
    let mut relations: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for row in &backup.relationships {
        if let (Some(cid), Some(mid)) = (col(row, "cid"), col(row, "mid")) {
            relations.entry(cid).or_default().push(mid);
        }
    }

    let mut data = MigrateData {
        tags: tags
            .iter()
            .filter_map(|row| {
                Some(MigrateTag::new(
                    format!("tag-{}", col(row, "mid")?),
                    TagSpec {
                        display_name: col(row, "name").unwrap_or_default().to_string(),
                        slug: col(row, "slug").unwrap_or_default().to_string(),
                        color: None,
                        cover: None,
                    },
                ))
            })
            .collect(),
        categories: parse_categories(&categories),
        ..MigrateData::default()
    };

    // cid -> subject kind, needed to aim comments at the right resource.
    let mut subject_of: BTreeMap<String, SubjectKind> = BTreeMap::new();
    for row in &backup.contents {
        let Some(cid) = col(row, "cid") else {
            continue;
        };
        match col(row, "type") {
            Some("post") => {
                subject_of.insert(cid.to_string(), SubjectKind::Post);
                data.posts.push(parse_post(
                    row,
                    relations.get(cid).map(Vec::as_slice).unwrap_or(&[]),
                    &tag_mids,
                    &category_mids,
                ));
            }
            Some("page") => {
                subject_of.insert(cid.to_string(), SubjectKind::SinglePage);
                data.pages.push(parse_page(row));
            }
            Some("attachment") => {
                if let Some(attachment) = parse_attachment(row) {
                    data.attachments.push(attachment);
                }
            }
            _ => {}
        }
    }

    data.comments = parse_comments(&backup.comments, &subject_of);
    Ok(data)
}

fn metas_of_type<'a>(metas: &'a [Row], kind: &str) -> Vec<&'a Row> {
    metas
        .iter()
        .filter(|row| col(row, "type") == Some(kind))
        .collect()
}

fn col<'a>(row: &'a Row, name: &str) -> Option<&'a str> {
    row.get(name).and_then(|value| value.as_deref())
}

fn parse_categories(categories: &[&Row]) -> Vec<MigrateCategory> {
    let mut out: Vec<MigrateCategory> = categories
        .iter()
        .filter_map(|row| {
            Some(MigrateCategory::new(
                format!("category-{}", col(row, "mid")?),
                CategorySpec {
                    display_name: col(row, "name").unwrap_or_default().to_string(),
                    slug: col(row, "slug").unwrap_or_default().to_string(),
                    description: col(row, "description").map(str::to_string),
                    cover: None,
                    priority: 0,
                    children: Vec::new(),
                },
            ))
        })
        .collect();
    let pairs: Vec<(String, String)> = categories
        .iter()
        .filter_map(|row| {
            let parent = col(row, "parent").filter(|p| *p != "0")?;
            Some((
                format!("category-{}", col(row, "mid")?),
                format!("category-{parent}"),
            ))
        })
        .collect();
    resolve::attach_children(
        &mut out,
        &pairs,
        |c| &c.metadata.name,
        |c| &mut c.spec.children,
    );
    out
}

/// Typecho prefixes markdown bodies with an `<!--markdown-->` marker; all
/// HTML comments are stripped before rendering.
fn body_of(row: &Row) -> String {
    let text = col(row, "text").unwrap_or_default();
    HTML_COMMENT_RE.replace_all(text, "").into_owned()
}

fn parse_post(row: &Row, mids: &[&str], tag_mids: &[&str], category_mids: &[&str]) -> MigratePost {
    let body = body_of(row);
    let publish = col(row, "status") == Some("publish");
    MigratePost {
        post_request: PostRequest {
            post: PostResource {
                api_version: CONTENT_API_VERSION.to_string(),
                kind: "Post".to_string(),
                metadata: Metadata::named(format!(
                    "post-{}",
                    col(row, "cid").unwrap_or_default()
                )),
                spec: PostSpec {
                    title: col(row, "title").unwrap_or_default().to_string(),
                    slug: col(row, "slug").unwrap_or_default().to_string(),
                    template: None,
                    cover: None,
                    deleted: false,
                    publish,
                    publish_time: epoch_secs(row, "created"),
                    pinned: false,
                    allow_comment: col(row, "allowComment") == Some("1"),
                    // Hidden and password-protected rows must not surface
                    // publicly on the target.
                    visible: if publish {
                        Visibility::Public
                    } else {
                        Visibility::Private
                    },
                    priority: 0,
                    excerpt: Excerpt::auto(),
                    categories: mids
                        .iter()
                        .filter(|mid| category_mids.contains(mid))
                        .map(|mid| format!("category-{mid}"))
                        .collect(),
                    tags: mids
                        .iter()
                        .filter(|mid| tag_mids.contains(mid))
                        .map(|mid| format!("tag-{mid}"))
                        .collect(),
                    html_metas: Vec::new(),
                },
            },
            content: RawContent::markdown(body.clone(), markdown::render_html(&body)),
        },
        counter: None,
    }
}

fn parse_page(row: &Row) -> MigrateSinglePage {
    let body = body_of(row);
    let publish = col(row, "status") == Some("publish");
    MigrateSinglePage {
        single_page_request: SinglePageRequest {
            page: SinglePageResource {
                api_version: CONTENT_API_VERSION.to_string(),
                kind: "SinglePage".to_string(),
                metadata: Metadata::named(format!(
                    "page-{}",
                    col(row, "cid").unwrap_or_default()
                )),
                spec: SinglePageSpec {
                    title: col(row, "title").unwrap_or_default().to_string(),
                    slug: col(row, "slug").unwrap_or_default().to_string(),
                    template: None,
                    cover: None,
                    deleted: false,
                    publish,
                    publish_time: epoch_secs(row, "created"),
                    pinned: false,
                    allow_comment: col(row, "allowComment") == Some("1"),
                    visible: if publish {
                        Visibility::Public
                    } else {
                        Visibility::Private
                    },
                    priority: 0,
                    excerpt: Excerpt::auto(),
                    html_metas: Vec::new(),
                },
            },
            content: RawContent::markdown(body.clone(), markdown::render_html(&body)),
        },
        counter: None,
    }
}

/// Attachment rows hide their file metadata inside a PHP-serialized `text`
/// column.
fn parse_attachment(row: &Row) -> Option<MigrateAttachment> {
    let cid = col(row, "cid")?;
    let serialized = col(row, "text")?;
    let value = match php::unserialize(serialized) {
        Ok(value) => value,
        Err(error) => {
            warn!(cid, %error, "skipping attachment with undecodable metadata");
            return None;
        }
    };
    let path = value
        .get("path")
        .and_then(php::PhpValue::as_str)
        .unwrap_or_default()
        .trim_start_matches('/')
        .to_string();
    Some(MigrateAttachment {
        id: format!("attachment-{cid}"),
        name: value
            .get("name")
            .and_then(php::PhpValue::as_str)
            .or_else(|| col(row, "title"))
            .unwrap_or_default()
            .to_string(),
        suffix: path.rsplit('.').next().filter(|s| *s != path).map(str::to_string),
        path,
        kind: AttachmentKind::Local,
        group_name: None,
        file_key: None,
        thumb_path: None,
        media_type: value
            .get("mime")
            .and_then(php::PhpValue::as_str)
            .map(str::to_string),
        width: None,
        height: None,
        size: value
            .get("size")
            .and_then(php::PhpValue::as_i64)
            .and_then(|size| u64::try_from(size).ok()),
        tags: Vec::new(),
    })
}

fn parse_comments(
    comments: &[Row],
    subject_of: &BTreeMap<String, SubjectKind>,
) -> Vec<crate::model::CommentEntry> {
    // Grouped per subject so replies never anchor across threads.
    let mut by_subject: BTreeMap<String, (SubjectKind, Vec<ThreadSource>)> = BTreeMap::new();
    for row in comments {
        let Some(coid) = col(row, "coid") else {
            continue;
        };
        let Some(cid) = col(row, "cid") else {
            continue;
        };
        let Some(kind) = subject_of.get(cid).copied() else {
            warn!(coid, cid, "skipping comment whose content row is missing");
            continue;
        };
        let subject_name = match kind {
            SubjectKind::Post => format!("post-{cid}"),
            SubjectKind::SinglePage => format!("page-{cid}"),
            SubjectKind::Moment => continue,
        };
        by_subject
            .entry(subject_name.clone())
            .or_insert_with(|| (kind, Vec::new()))
            .1
            .push(parse_comment(row, coid, kind, &subject_name));
    }

    let mut entries = Vec::new();
    for (_, (_, sources)) in by_subject {
        entries.extend(resolve::flatten_comments(sources));
    }
    entries
}

fn parse_comment(row: &Row, coid: &str, kind: SubjectKind, subject_name: &str) -> ThreadSource {
    let parent = col(row, "parent").unwrap_or("0");
    let content = col(row, "text").unwrap_or_default().to_string();
    let created = epoch_secs(row, "created").unwrap_or_default();

    let mut owner = CommentOwner::email(
        col(row, "mail").unwrap_or_default(),
        col(row, "author").unwrap_or_default(),
    );
    if let Some(website) = col(row, "url").filter(|u| !u.is_empty()) {
        owner = owner.with_annotation("website", website);
    }

    ThreadSource {
        id: coid.to_string(),
        parent_id: (parent != "0").then(|| parent.to_string()),
        comment: MigrateComment {
            ref_type: kind,
            api_version: CONTENT_API_VERSION.to_string(),
            kind: "Comment".to_string(),
            metadata: Metadata::named(format!("comment-{coid}")),
            spec: CommentSpec {
                raw: content.clone(),
                content,
                owner,
                ip_address: col(row, "ip").map(str::to_string),
                user_agent: col(row, "agent").map(str::to_string),
                priority: 0,
                top: false,
                allow_notification: true,
                approved: col(row, "status") == Some("approved"),
                approved_time: Some(created.clone()),
                creation_time: created,
                hidden: false,
                subject_ref: Ref::subject(kind, subject_name),
            },
        },
    }
}

fn epoch_secs(row: &Row, column: &str) -> Option<String> {
    col(row, column)
        .and_then(|value| value.parse::<i64>().ok())
        .and_then(epoch_secs_to_rfc3339)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::typecho::fixtures::{encode_backup, BlockSpec};
    use crate::model::CommentEntry;

    fn sample_backup() -> Vec<u8> {
        encode_backup(
            "2024",
            &[
                BlockSpec {
                    type_code: 1,
                    columns: &[
                        ("cid", Some("1")),
                        ("title", Some("First")),
                        ("slug", Some("first")),
                        ("type", Some("post")),
                        ("status", Some("publish")),
                        ("created", Some("1577836800")),
                        ("allowComment", Some("1")),
                        ("text", Some("<!--markdown--># Hi\nbody")),
                    ],
                },
                BlockSpec {
                    type_code: 3,
                    columns: &[
                        ("mid", Some("7")),
                        ("name", Some("Rust")),
                        ("slug", Some("rust")),
                        ("type", Some("tag")),
                        ("parent", Some("0")),
                    ],
                },
                BlockSpec {
                    type_code: 3,
                    columns: &[
                        ("mid", Some("8")),
                        ("name", Some("Dev")),
                        ("slug", Some("dev")),
                        ("type", Some("category")),
                        ("parent", Some("0")),
                    ],
                },
                BlockSpec {
                    type_code: 4,
                    columns: &[("cid", Some("1")), ("mid", Some("7"))],
                },
                BlockSpec {
                    type_code: 4,
                    columns: &[("cid", Some("1")), ("mid", Some("8"))],
                },
                BlockSpec {
                    type_code: 2,
                    columns: &[
                        ("coid", Some("5")),
                        ("cid", Some("1")),
                        ("parent", Some("0")),
                        ("author", Some("ann")),
                        ("mail", Some("a@b.c")),
                        ("text", Some("nice")),
                        ("status", Some("approved")),
                        ("created", Some("1577923200")),
                    ],
                },
                BlockSpec {
                    type_code: 2,
                    columns: &[
                        ("coid", Some("6")),
                        ("cid", Some("99")),
                        ("parent", Some("0")),
                        ("author", Some("ghost")),
                        ("mail", Some("g@b.c")),
                        ("text", Some("orphan")),
                        ("status", Some("approved")),
                        ("created", Some("1577923200")),
                    ],
                },
            ],
        )
    }

    #[test]
    fn joins_terms_and_prefixes_names_by_table() {
        let data = parse(&sample_backup()).expect("parse backup");
        assert_eq!(data.posts.len(), 1);
        let post = &data.posts[0];
        assert_eq!(post.post_request.post.metadata.name, "post-1");
        let spec = &post.post_request.post.spec;
        assert_eq!(spec.slug, "first");
        assert_eq!(spec.tags, vec!["tag-7"]);
        assert_eq!(spec.categories, vec!["category-8"]);
        assert!(spec.publish);
        assert!(spec.allow_comment);
        assert_eq!(spec.publish_time.as_deref(), Some("2020-01-01T00:00:00.000Z"));
    }

    #[test]
    fn markdown_marker_comment_is_stripped_before_render() {
        let data = parse(&sample_backup()).expect("parse backup");
        let content = &data.posts[0].post_request.content;
        assert_eq!(content.raw, "# Hi\nbody");
        assert!(content.content.contains("<h1"));
        assert_eq!(content.raw_type, "markdown");
    }

    #[test]
    fn non_publish_status_stays_private_and_unpublished() {
        let backup = encode_backup(
            "2024",
            &[
                BlockSpec {
                    type_code: 1,
                    columns: &[
                        ("cid", Some("1")),
                        ("title", Some("Secret")),
                        ("slug", Some("secret")),
                        ("type", Some("post")),
                        ("status", Some("hidden")),
                        ("text", Some("shh")),
                    ],
                },
                BlockSpec {
                    type_code: 1,
                    columns: &[
                        ("cid", Some("2")),
                        ("title", Some("About")),
                        ("slug", Some("about")),
                        ("type", Some("page")),
                        ("status", Some("password")),
                        ("text", Some("locked")),
                    ],
                },
            ],
        );
        let data = parse(&backup).expect("parse backup");
        let post = &data.posts[0].post_request.post.spec;
        assert!(!post.publish);
        assert_eq!(post.visible, Visibility::Private);
        let page = &data.pages[0].single_page_request.page.spec;
        assert!(!page.publish);
        assert_eq!(page.visible, Visibility::Private);
    }

    #[test]
    fn comment_without_content_row_is_skipped() {
        let data = parse(&sample_backup()).expect("parse backup");
        assert_eq!(data.comments.len(), 1);
        let CommentEntry::Comment(comment) = &data.comments[0] else {
            panic!("expected a root comment");
        };
        assert_eq!(comment.metadata.name, "comment-5");
        assert_eq!(comment.spec.subject_ref.name, "post-1");
        assert!(comment.spec.approved);
    }

    #[test]
    fn attachment_metadata_comes_from_serialized_text() {
        let serialized = "a:4:{s:4:\"name\";s:5:\"a.png\";s:4:\"path\";s:18:\"/usr/uploads/a.png\";s:4:\"size\";i:128;s:4:\"mime\";s:9:\"image/png\";}";
        let backup = encode_backup(
            "2024",
            &[BlockSpec {
                type_code: 1,
                columns: &[
                    ("cid", Some("3")),
                    ("title", Some("a.png")),
                    ("type", Some("attachment")),
                    ("text", Some(serialized)),
                ],
            }],
        );
        let data = parse(&backup).expect("parse backup");
        assert_eq!(data.attachments.len(), 1);
        let attachment = &data.attachments[0];
        assert_eq!(attachment.id, "attachment-3");
        assert_eq!(attachment.path, "usr/uploads/a.png");
        assert_eq!(attachment.media_type.as_deref(), Some("image/png"));
        assert_eq!(attachment.size, Some(128));
        assert_eq!(attachment.suffix.as_deref(), Some("png"));
    }

    #[test]
    fn category_parent_links_children() {
        let backup = encode_backup(
            "2024",
            &[
                BlockSpec {
                    type_code: 3,
                    columns: &[
                        ("mid", Some("1")),
                        ("name", Some("Root")),
                        ("slug", Some("root")),
                        ("type", Some("category")),
                        ("parent", Some("0")),
                    ],
                },
                BlockSpec {
                    type_code: 3,
                    columns: &[
                        ("mid", Some("2")),
                        ("name", Some("Leaf")),
                        ("slug", Some("leaf")),
                        ("type", Some("category")),
                        ("parent", Some("1")),
                    ],
                },
            ],
        );
        let data = parse(&backup).expect("parse backup");
        let root = data
            .categories
            .iter()
            .find(|c| c.metadata.name == "category-1")
            .expect("root category");
        assert_eq!(root.spec.children, vec!["category-2"]);
    }
}
