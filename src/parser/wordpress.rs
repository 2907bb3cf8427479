//! WordPress WXR normalizer.
//!
//! WXR is RSS 2.0 with `wp:` namespaced extension elements. Namespace URIs
//! carry the export version (`http://wordpress.org/export/1.2/`), so elements
//! are matched by local name plus a URI fragment rather than a fixed URI.
//! Items are classified by `wp:post_type`; nav menu hierarchy is resolved
//! through an explicit child-accumulator built from the
//! `_menu_item_menu_item_parent` postmeta, since a child item may appear
//! before its parent in document order.

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, SecondsFormat, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use roxmltree::{Document, Node};
use tracing::warn;

use crate::model::{
    CategorySpec, CommentOwner, CommentSpec, Excerpt, MenuItemResource, MenuItemSpec, Metadata,
    MigrateAttachment, MigrateCategory, MigrateComment, MigrateData, MigrateMenuItem, MigratePost,
    MigrateSinglePage, MigrateTag, PostRequest, PostResource, PostSpec, RawContent, Ref,
    SinglePageRequest, SinglePageResource, SinglePageSpec, SubjectKind, TagSpec, Visibility,
    CONTENT_API_VERSION,
};
use crate::parser::{text_input, ParseError};
use crate::resolve::{self, ThreadSource};

const ATTACHMENT_PATH_PREFIX: &str = "wp-content/uploads/";

static WIDTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""width";i:(\d+);"#).expect("width pattern"));
static HEIGHT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""height";i:(\d+);"#).expect("height pattern"));
static FILESIZE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""filesize";i:(\d+);"#).expect("filesize pattern"));
static MIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""mime[_-]type";s:\d+:"([^"]+)";"#).expect("mime pattern"));

pub fn parse(bytes: &[u8]) -> Result<MigrateData, ParseError> {
    let text = text_input(bytes)?;
    let doc = Document::parse(text)?;
    let root = doc.root_element();
    if root.tag_name().name() != "rss" {
        return Err(ParseError::Format("not an RSS document".to_string()));
    }
    let channel = plain_child(root, "channel")
        .ok_or_else(|| ParseError::Format("missing <channel> element".to_string()))?;

    let tags: Vec<Term> = channel
        .children()
        .filter(|n| wp_element(n, "tag"))
        .filter_map(parse_tag_term)
        .collect();
    let categories: Vec<CategoryTerm> = channel
        .children()
        .filter(|n| wp_element(n, "category"))
        .filter_map(parse_category_term)
        .collect();
    let menu_terms = collect_menu_terms(channel);

    let mut posts = Vec::new();
    let mut pages = Vec::new();
    let mut attachments = Vec::new();
    let mut nav_items = Vec::new();
    for item in channel.children().filter(|n| plain_element(n, "item")) {
        match wp_child_text(item, "post_type").as_deref() {
            Some("post") => posts.push(item),
            Some("page") => pages.push(item),
            Some("attachment") => attachments.push(item),
            Some("nav_menu_item") => nav_items.push(item),
            _ => {}
        }
    }

    Ok(MigrateData {
        posts: posts
            .iter()
            .map(|item| parse_post(*item, &tags, &categories, &attachments))
            .collect(),
        pages: pages.iter().map(|item| parse_page(*item)).collect(),
        comments: parse_comments(&posts, &pages),
        tags: tags
            .iter()
            .map(|tag| {
                MigrateTag::new(
                    tag.term_id.clone(),
                    TagSpec {
                        display_name: tag.name.clone(),
                        slug: tag.slug.clone(),
                        color: None,
                        cover: None,
                    },
                )
            })
            .collect(),
        categories: parse_categories(&categories),
        menu_items: parse_menu_items(&menu_terms, &nav_items),
        attachments: attachments.iter().map(|item| parse_attachment(*item)).collect(),
        ..MigrateData::default()
    })
}

struct Term {
    term_id: String,
    slug: String,
    name: String,
}

struct CategoryTerm {
    term_id: String,
    nicename: String,
    parent: Option<String>,
    name: String,
    description: Option<String>,
}

fn parse_tag_term(node: Node) -> Option<Term> {
    Some(Term {
        term_id: wp_child_text(node, "term_id")?,
        slug: wp_child_text(node, "tag_slug")?,
        name: wp_child_text(node, "tag_name")?,
    })
}

fn parse_category_term(node: Node) -> Option<CategoryTerm> {
    Some(CategoryTerm {
        term_id: wp_child_text(node, "term_id")?,
        nicename: wp_child_text(node, "category_nicename")?,
        parent: wp_child_text(node, "category_parent").filter(|p| !p.is_empty()),
        name: wp_child_text(node, "cat_name")?,
        description: wp_child_text(node, "category_description"),
    })
}

/// Nav menu groups come from `wp:term` elements with taxonomy `nav_menu`,
/// de-duplicated by term id.
fn collect_menu_terms(channel: Node) -> Vec<Term> {
    let mut terms: Vec<Term> = Vec::new();
    for node in channel.children().filter(|n| wp_element(n, "term")) {
        if wp_child_text(node, "term_taxonomy").as_deref() != Some("nav_menu") {
            continue;
        }
        let Some(term_id) = wp_child_text(node, "term_id") else {
            continue;
        };
        if terms.iter().any(|t| t.term_id == term_id) {
            continue;
        }
        terms.push(Term {
            term_id,
            slug: wp_child_text(node, "term_slug").unwrap_or_default(),
            name: wp_child_text(node, "term_name").unwrap_or_default(),
        });
    }
    terms
}

fn parse_categories(categories: &[CategoryTerm]) -> Vec<MigrateCategory> {
    let mut out: Vec<MigrateCategory> = categories
        .iter()
        .map(|category| {
            MigrateCategory::new(
                category.term_id.clone(),
                CategorySpec {
                    display_name: category.name.clone(),
                    slug: category.nicename.clone(),
                    description: category.description.clone(),
                    cover: None,
                    priority: 0,
                    children: Vec::new(),
                },
            )
        })
        .collect();
    // Parents are referenced by nicename, children by term id.
    let pairs: Vec<(String, String)> = categories
        .iter()
        .filter_map(|category| {
            let parent = category.parent.as_ref()?;
            let parent_id = categories
                .iter()
                .find(|c| &c.nicename == parent)
                .map(|c| c.term_id.clone())?;
            Some((category.term_id.clone(), parent_id))
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

fn parse_post(item: Node, tags: &[Term], categories: &[CategoryTerm], attachments: &[Node]) -> MigratePost {
    let metas = collect_postmeta(item);
    let status = wp_child_text(item, "status").unwrap_or_default();
    let (category_slugs, tag_slugs) = split_item_categories(item);

    let tag_ids = tags
        .iter()
        .filter(|tag| tag_slugs.iter().any(|slug| slug == &tag.slug))
        .map(|tag| tag.term_id.clone())
        .collect();
    let category_ids = categories
        .iter()
        .filter(|category| category_slugs.iter().any(|slug| slug == &category.nicename))
        .map(|category| category.term_id.clone())
        .collect();

    // The post thumbnail is an attachment referenced by id in postmeta.
    let cover = metas.get("_thumbnail_id").and_then(|thumbnail_id| {
        attachments
            .iter()
            .find(|a| wp_child_text(**a, "post_id").as_deref() == Some(thumbnail_id))
            .and_then(|a| wp_child_text(*a, "attachment_url"))
    });

    MigratePost {
        post_request: PostRequest {
            post: PostResource {
                api_version: CONTENT_API_VERSION.to_string(),
                kind: "Post".to_string(),
                metadata: Metadata::named(wp_child_text(item, "post_id").unwrap_or_default()),
                spec: PostSpec {
                    title: plain_child_text(item, "title").unwrap_or_default(),
                    slug: wp_child_text(item, "post_name").unwrap_or_default(),
                    template: None,
                    cover,
                    deleted: status == "trash",
                    publish: is_published(&status, &metas),
                    publish_time: wp_child_text(item, "post_date")
                        .as_deref()
                        .and_then(parse_wp_date),
                    pinned: wp_child_text(item, "is_sticky")
                        .and_then(|v| v.parse::<i32>().ok())
                        .is_some_and(|v| v > 0),
                    allow_comment: wp_child_text(item, "comment_status").as_deref() == Some("open"),
                    visible: Visibility::Public,
                    priority: 0,
                    excerpt: match excerpt_encoded(item) {
                        Some(raw) if !raw.is_empty() => Excerpt::raw(raw),
                        _ => Excerpt::auto(),
                    },
                    categories: category_ids,
                    tags: tag_ids,
                    html_metas: Vec::new(),
                },
            },
            content: RawContent::html(content_encoded(item).unwrap_or_default()),
        },
        counter: None,
    }
}

fn parse_page(item: Node) -> MigrateSinglePage {
    let metas = collect_postmeta(item);
    let status = wp_child_text(item, "status").unwrap_or_default();
    MigrateSinglePage {
        single_page_request: SinglePageRequest {
            page: SinglePageResource {
                api_version: CONTENT_API_VERSION.to_string(),
                kind: "SinglePage".to_string(),
                metadata: Metadata::named(wp_child_text(item, "post_id").unwrap_or_default()),
                spec: SinglePageSpec {
                    title: plain_child_text(item, "title").unwrap_or_default(),
                    slug: wp_child_text(item, "post_name").unwrap_or_default(),
                    template: None,
                    cover: None,
                    deleted: status == "trash",
                    publish: is_published(&status, &metas),
                    publish_time: wp_child_text(item, "post_date")
                        .as_deref()
                        .and_then(parse_wp_date),
                    pinned: false,
                    allow_comment: wp_child_text(item, "comment_status").as_deref() == Some("open"),
                    visible: Visibility::Public,
                    priority: 0,
                    excerpt: match excerpt_encoded(item) {
                        Some(raw) if !raw.is_empty() => Excerpt::raw(raw),
                        _ => Excerpt::auto(),
                    },
                    html_metas: Vec::new(),
                },
            },
            content: RawContent::html(content_encoded(item).unwrap_or_default()),
        },
        counter: None,
    }
}

/// Trashed posts that were published before deletion record their previous
/// status in the `_wp_trash_meta_status` postmeta.
fn is_published(status: &str, metas: &BTreeMap<String, String>) -> bool {
    status == "publish" || metas.get("_wp_trash_meta_status").map(String::as_str) == Some("publish")
}

fn parse_comments(posts: &[Node], pages: &[Node]) -> Vec<crate::model::CommentEntry> {
    let mut entries = Vec::new();
    for (items, kind) in [(posts, SubjectKind::Post), (pages, SubjectKind::SinglePage)] {
        for item in items {
            let Some(subject_name) = wp_child_text(*item, "post_id") else {
                continue;
            };
            let sources: Vec<ThreadSource> = item
                .children()
                .filter(|n| wp_element(n, "comment"))
                .filter_map(|node| parse_comment(node, kind, &subject_name))
                .collect();
            entries.extend(resolve::flatten_comments(sources));
        }
    }
    entries
}

fn parse_comment(node: Node, kind: SubjectKind, subject_name: &str) -> Option<ThreadSource> {
    let id = wp_child_text(node, "comment_id")?;
    let parent = wp_child_text(node, "comment_parent").unwrap_or_default();
    let content = wp_child_text(node, "comment_content").unwrap_or_default();
    let created = wp_child_text(node, "comment_date")
        .as_deref()
        .and_then(parse_wp_date)
        .unwrap_or_default();

    let mut owner = CommentOwner::email(
        wp_child_text(node, "comment_author_email").unwrap_or_default(),
        wp_child_text(node, "comment_author").unwrap_or_default(),
    );
    if let Some(website) = wp_child_text(node, "comment_author_url").filter(|u| !u.is_empty()) {
        owner = owner.with_annotation("website", website);
    }

    Some(ThreadSource {
        id: id.clone(),
        parent_id: (parent != "0" && !parent.is_empty()).then_some(parent),
        comment: MigrateComment {
            ref_type: kind,
            api_version: CONTENT_API_VERSION.to_string(),
            kind: "Comment".to_string(),
            metadata: Metadata::named(id),
            spec: CommentSpec {
                raw: content.clone(),
                content,
                owner,
                ip_address: wp_child_text(node, "comment_author_IP"),
                user_agent: None,
                priority: 0,
                top: false,
                allow_notification: true,
                approved: wp_child_text(node, "comment_approved").as_deref() == Some("1"),
                approved_time: Some(created.clone()),
                creation_time: created,
                hidden: false,
                subject_ref: Ref::subject(kind, subject_name),
            },
        },
    })
}

fn parse_menu_items(terms: &[Term], nav_items: &[Node]) -> Vec<MigrateMenuItem> {
    let mut items = Vec::new();
    // Child names accumulated per parent item id. Built while iterating all
    // items because parent references run in both directions in WXR order.
    let mut children_of: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for term in terms {
        for item in nav_items {
            let belongs = item
                .children()
                .filter(|n| plain_element(n, "category"))
                .any(|category| {
                    category.attribute("domain") == Some("nav_menu")
                        && category.attribute("nicename") == Some(term.name.as_str())
                        || category.attribute("domain") == Some("nav_menu")
                            && category.attribute("nicename") == Some(term.slug.as_str())
                });
            if !belongs {
                continue;
            }
            let Some(name) = wp_child_text(*item, "post_id") else {
                continue;
            };
            let metas = collect_postmeta(*item);

            if let Some(parent) = metas
                .get("_menu_item_menu_item_parent")
                .filter(|p| !p.is_empty() && p.as_str() != "0")
            {
                children_of.entry(parent.clone()).or_default().push(name.clone());
            }

            let target_kind = match metas.get("_menu_item_object").map(String::as_str) {
                Some("post") => Some("Post"),
                Some("page") => Some("SinglePage"),
                Some("category") => Some("Category"),
                _ => None,
            };
            let object_id = metas.get("_menu_item_object_id").cloned();
            let href = metas.get("_menu_item_url").cloned().filter(|u| !u.is_empty());

            let target_ref = match (target_kind, object_id) {
                (Some(kind), Some(object_id)) => Some(Ref {
                    group: Some("content.halo.run".to_string()),
                    version: Some("v1alpha1".to_string()),
                    kind: Some(kind.to_string()),
                    name: object_id,
                }),
                _ => None,
            };

            items.push(MigrateMenuItem {
                menu: MenuItemResource::new(
                    name,
                    MenuItemSpec {
                        display_name: plain_child_text(*item, "title").unwrap_or_default(),
                        priority: wp_child_text(*item, "menu_order")
                            .and_then(|v| v.parse().ok())
                            .unwrap_or(0),
                        children: Vec::new(),
                        href: if target_ref.is_none() { href } else { None },
                        target_ref,
                    },
                ),
                group_id: term.term_id.clone(),
                group_name: Some(term.name.clone()),
            });
        }
    }

    for item in &mut items {
        if let Some(children) = children_of.get(&item.menu.metadata.name) {
            item.menu.spec.children = children.clone();
        }
    }
    items
}

fn parse_attachment(item: Node) -> MigrateAttachment {
    let metas = collect_postmeta(item);
    let path = metas.get("_wp_attached_file").cloned().unwrap_or_default();
    let serialized = metas.get("_wp_attachment_metadata").map(String::as_str);
    if serialized.is_none() {
        warn!(
            attachment = %plain_child_text(item, "title").unwrap_or_default(),
            "attachment has no serialized metadata"
        );
    }

    let capture_u32 = |re: &Regex| {
        serialized
            .and_then(|text| re.captures(text))
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
    };

    MigrateAttachment {
        id: wp_child_text(item, "post_id").unwrap_or_default(),
        name: plain_child_text(item, "title").unwrap_or_default(),
        path: format!("{ATTACHMENT_PATH_PREFIX}{path}"),
        kind: crate::model::AttachmentKind::Local,
        group_name: None,
        file_key: None,
        thumb_path: None,
        media_type: serialized
            .and_then(|text| MIME_RE.captures(text))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string()),
        suffix: path.rsplit('.').next().filter(|s| *s != path).map(str::to_string),
        width: capture_u32(&WIDTH_RE),
        height: capture_u32(&HEIGHT_RE),
        size: serialized
            .and_then(|text| FILESIZE_RE.captures(text))
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok()),
        tags: Vec::new(),
    }
}

/// Split an item's `<category>` elements by `domain` into category and tag
/// slugs.
fn split_item_categories(item: Node) -> (Vec<String>, Vec<String>) {
    let mut categories = Vec::new();
    let mut tags = Vec::new();
    for node in item.children().filter(|n| plain_element(n, "category")) {
        let Some(nicename) = node.attribute("nicename") else {
            continue;
        };
        match node.attribute("domain") {
            Some("category") => categories.push(nicename.to_string()),
            Some("post_tag") => tags.push(nicename.to_string()),
            _ => {}
        }
    }
    (categories, tags)
}

fn collect_postmeta(item: Node) -> BTreeMap<String, String> {
    item.children()
        .filter(|n| wp_element(n, "postmeta"))
        .filter_map(|meta| {
            Some((
                wp_child_text(meta, "meta_key")?,
                wp_child_text(meta, "meta_value").unwrap_or_default(),
            ))
        })
        .collect()
}

fn parse_wp_date(text: &str) -> Option<String> {
    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").ok()?;
    Some(
        Utc.from_utc_datetime(&naive)
            .to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}

/// `wp:` export namespace, excluding the separate excerpt namespace that
/// shares the same URI prefix.
fn in_wp_namespace(node: &Node) -> bool {
    node.tag_name()
        .namespace()
        .is_some_and(|ns| ns.contains("wordpress.org/export") && !ns.contains("excerpt"))
}

fn wp_element(node: &Node, local: &str) -> bool {
    node.is_element() && node.tag_name().name() == local && in_wp_namespace(node)
}

fn plain_element(node: &Node, local: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == local
        && node.tag_name().namespace().is_none()
}

fn wp_child_text(node: Node, local: &str) -> Option<String> {
    node.children()
        .find(|n| wp_element(n, local))
        .and_then(|n| n.text())
        .map(str::to_string)
}

fn plain_child<'a, 'input>(node: Node<'a, 'input>, local: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| plain_element(n, local))
}

fn plain_child_text(node: Node, local: &str) -> Option<String> {
    plain_child(node, local).and_then(|n| n.text()).map(str::to_string)
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

fn excerpt_encoded(item: Node) -> Option<String> {
    item.children()
        .find(|n| {
            n.is_element()
                && n.tag_name().name() == "encoded"
                && n.tag_name().namespace().is_some_and(|ns| ns.contains("excerpt"))
        })
        .and_then(|n| n.text())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CommentEntry;

    const WXR_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"
     xmlns:content="http://purl.org/rss/1.0/modules/content/"
     xmlns:excerpt="http://wordpress.org/export/1.2/excerpt/"
     xmlns:wp="http://wordpress.org/export/1.2/">
<channel>
<wp:wxr_version>1.2</wp:wxr_version>"#;

    fn wxr(body: &str) -> Vec<u8> {
        format!("{WXR_HEADER}{body}</channel></rss>").into_bytes()
    }

    fn sample_post_item() -> &'static str {
        r#"
<wp:tag><wp:term_id>7</wp:term_id><wp:tag_slug>rust</wp:tag_slug><wp:tag_name>Rust</wp:tag_name></wp:tag>
<wp:category><wp:term_id>8</wp:term_id><wp:category_nicename>dev</wp:category_nicename><wp:category_parent></wp:category_parent><wp:cat_name>Dev</wp:cat_name></wp:category>
<item>
  <title>Hello</title>
  <content:encoded><![CDATA[<p>body</p>]]></content:encoded>
  <excerpt:encoded><![CDATA[short]]></excerpt:encoded>
  <wp:post_id>100</wp:post_id>
  <wp:post_date>2020-01-01 00:00:00</wp:post_date>
  <wp:comment_status>open</wp:comment_status>
  <wp:post_name>hello</wp:post_name>
  <wp:status>publish</wp:status>
  <wp:post_type>post</wp:post_type>
  <wp:is_sticky>0</wp:is_sticky>
  <category domain="category" nicename="dev">Dev</category>
  <category domain="post_tag" nicename="rust">Rust</category>
  <wp:comment>
    <wp:comment_id>1</wp:comment_id>
    <wp:comment_author>a</wp:comment_author>
    <wp:comment_author_email>a@b.c</wp:comment_author_email>
    <wp:comment_date>2020-01-02 00:00:00</wp:comment_date>
    <wp:comment_content>root</wp:comment_content>
    <wp:comment_approved>1</wp:comment_approved>
    <wp:comment_parent>0</wp:comment_parent>
  </wp:comment>
  <wp:comment>
    <wp:comment_id>2</wp:comment_id>
    <wp:comment_author>b</wp:comment_author>
    <wp:comment_author_email>b@b.c</wp:comment_author_email>
    <wp:comment_date>2020-01-03 00:00:00</wp:comment_date>
    <wp:comment_content>grandchild</wp:comment_content>
    <wp:comment_approved>1</wp:comment_approved>
    <wp:comment_parent>3</wp:comment_parent>
  </wp:comment>
  <wp:comment>
    <wp:comment_id>3</wp:comment_id>
    <wp:comment_author>c</wp:comment_author>
    <wp:comment_author_email>c@b.c</wp:comment_author_email>
    <wp:comment_date>2020-01-02 12:00:00</wp:comment_date>
    <wp:comment_content>child</wp:comment_content>
    <wp:comment_approved>1</wp:comment_approved>
    <wp:comment_parent>1</wp:comment_parent>
  </wp:comment>
</item>"#
    }

    #[test]
    fn rejects_non_rss_input() {
        assert!(matches!(
            parse(b"<feed></feed>"),
            Err(ParseError::Format(_))
        ));
    }

    #[test]
    fn classifies_item_categories_by_domain() {
        let data = parse(&wxr(sample_post_item())).expect("parse wxr");
        assert_eq!(data.posts.len(), 1);
        let spec = &data.posts[0].post_request.post.spec;
        assert_eq!(spec.tags, vec!["7"]);
        assert_eq!(spec.categories, vec!["8"]);
        assert_eq!(spec.excerpt.raw.as_deref(), Some("short"));
        assert!(spec.publish);
        assert_eq!(spec.publish_time.as_deref(), Some("2020-01-01T00:00:00.000Z"));
        assert_eq!(data.posts[0].post_request.content.raw, "<p>body</p>");
    }

    #[test]
    fn nested_replies_resolve_to_thread_root() {
        let data = parse(&wxr(sample_post_item())).expect("parse wxr");
        let replies: Vec<_> = data
            .comments
            .iter()
            .filter_map(|entry| match entry {
                CommentEntry::Reply(reply) => Some(reply),
                CommentEntry::Comment(_) => None,
            })
            .collect();
        assert_eq!(replies.len(), 2);
        assert!(replies.iter().all(|reply| reply.spec.comment_name == "1"));
        let grandchild = replies
            .iter()
            .find(|reply| reply.metadata.name == "2")
            .expect("comment 2 present");
        assert_eq!(grandchild.spec.quote_reply.as_deref(), Some("3"));
    }

    #[test]
    fn trashed_post_with_publish_meta_counts_as_published() {
        let body = r#"
<item>
  <title>Gone</title>
  <wp:post_id>200</wp:post_id>
  <wp:post_name>gone</wp:post_name>
  <wp:status>trash</wp:status>
  <wp:post_type>post</wp:post_type>
  <wp:postmeta>
    <wp:meta_key>_wp_trash_meta_status</wp:meta_key>
    <wp:meta_value>publish</wp:meta_value>
  </wp:postmeta>
</item>"#;
        let data = parse(&wxr(body)).expect("parse wxr");
        let spec = &data.posts[0].post_request.post.spec;
        assert!(spec.publish);
        assert!(spec.deleted);
    }

    #[test]
    fn attachment_metadata_extracted_from_serialized_blob() {
        let body = r#"
<item>
  <title>photo</title>
  <wp:post_id>300</wp:post_id>
  <wp:post_type>attachment</wp:post_type>
  <wp:postmeta>
    <wp:meta_key>_wp_attached_file</wp:meta_key>
    <wp:meta_value>2020/01/a.png</wp:meta_value>
  </wp:postmeta>
  <wp:postmeta>
    <wp:meta_key>_wp_attachment_metadata</wp:meta_key>
    <wp:meta_value>a:4:{s:5:"width";i:640;s:6:"height";i:480;s:8:"filesize";i:1234;s:9:"mime-type";s:9:"image/png";}</wp:meta_value>
  </wp:postmeta>
</item>"#;
        let data = parse(&wxr(body)).expect("parse wxr");
        let attachment = &data.attachments[0];
        assert_eq!(attachment.path, "wp-content/uploads/2020/01/a.png");
        assert_eq!(attachment.width, Some(640));
        assert_eq!(attachment.height, Some(480));
        assert_eq!(attachment.size, Some(1234));
        assert_eq!(attachment.media_type.as_deref(), Some("image/png"));
        assert_eq!(attachment.suffix.as_deref(), Some("png"));
    }

    #[test]
    fn menu_children_resolve_in_either_direction() {
        let body = r#"
<wp:term>
  <wp:term_id>40</wp:term_id>
  <wp:term_taxonomy>nav_menu</wp:term_taxonomy>
  <wp:term_slug>main</wp:term_slug>
  <wp:term_name>main</wp:term_name>
</wp:term>
<item>
  <title>Child</title>
  <wp:post_id>51</wp:post_id>
  <wp:post_type>nav_menu_item</wp:post_type>
  <wp:menu_order>2</wp:menu_order>
  <category domain="nav_menu" nicename="main">main</category>
  <wp:postmeta>
    <wp:meta_key>_menu_item_menu_item_parent</wp:meta_key>
    <wp:meta_value>52</wp:meta_value>
  </wp:postmeta>
  <wp:postmeta>
    <wp:meta_key>_menu_item_url</wp:meta_key>
    <wp:meta_value>/child</wp:meta_value>
  </wp:postmeta>
</item>
<item>
  <title>Parent</title>
  <wp:post_id>52</wp:post_id>
  <wp:post_type>nav_menu_item</wp:post_type>
  <wp:menu_order>1</wp:menu_order>
  <category domain="nav_menu" nicename="main">main</category>
  <wp:postmeta>
    <wp:meta_key>_menu_item_menu_item_parent</wp:meta_key>
    <wp:meta_value>0</wp:meta_value>
  </wp:postmeta>
  <wp:postmeta>
    <wp:meta_key>_menu_item_object</wp:meta_key>
    <wp:meta_value>page</wp:meta_value>
  </wp:postmeta>
  <wp:postmeta>
    <wp:meta_key>_menu_item_object_id</wp:meta_key>
    <wp:meta_value>9</wp:meta_value>
  </wp:postmeta>
</item>"#;
        let data = parse(&wxr(body)).expect("parse wxr");
        assert_eq!(data.menu_items.len(), 2);
        let parent = data
            .menu_items
            .iter()
            .find(|m| m.menu.metadata.name == "52")
            .expect("parent item");
        assert_eq!(parent.menu.spec.children, vec!["51"]);
        let target = parent.menu.spec.target_ref.as_ref().expect("target ref");
        assert_eq!(target.kind.as_deref(), Some("SinglePage"));
        assert_eq!(target.name, "9");
        assert!(parent.menu.spec.href.is_none());
        let child = data
            .menu_items
            .iter()
            .find(|m| m.menu.metadata.name == "51")
            .expect("child item");
        assert_eq!(child.menu.spec.href.as_deref(), Some("/child"));
        assert_eq!(child.group_id, "40");
    }
}
