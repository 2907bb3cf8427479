//! Shared intermediate entity model.
//!
//! Every source parser produces a [`MigrateData`] batch; the task builder
//! consumes it exactly once. The resource shapes mirror what the target
//! Halo 2.x API expects on the wire (camelCase, `kind`/`apiVersion`
//! discriminators and a deterministic `metadata.name`).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const CONTENT_API_VERSION: &str = "content.halo.run/v1alpha1";
pub const CORE_API_VERSION: &str = "core.halo.run/v1alpha1";
pub const MOMENT_API_VERSION: &str = "moment.halo.run/v1alpha1";
pub const STORAGE_API_VERSION: &str = "storage.halo.run/v1alpha1";
pub const METRICS_API_VERSION: &str = "metrics.halo.run/v1alpha1";
pub const MENU_API_VERSION: &str = "v1alpha1";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl Metadata {
    pub fn named(name: impl Into<String>) -> Self {
        Metadata {
            name: name.into(),
            annotations: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagSpec {
    pub display_name: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateTag {
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    pub spec: TagSpec,
}

impl MigrateTag {
    pub fn new(name: impl Into<String>, spec: TagSpec) -> Self {
        MigrateTag {
            api_version: CONTENT_API_VERSION.to_string(),
            kind: "Tag".to_string(),
            metadata: Metadata::named(name),
            spec,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySpec {
    pub display_name: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    pub priority: i32,
    /// Names of direct child categories. Always present, even when empty:
    /// a missing list breaks the category tree on the target side.
    pub children: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateCategory {
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    pub spec: CategorySpec,
}

impl MigrateCategory {
    pub fn new(name: impl Into<String>, spec: CategorySpec) -> Self {
        MigrateCategory {
            api_version: CONTENT_API_VERSION.to_string(),
            kind: "Category".to_string(),
            metadata: Metadata::named(name),
            spec,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Excerpt {
    pub auto_generate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl Excerpt {
    pub fn auto() -> Self {
        Excerpt {
            auto_generate: true,
            raw: None,
        }
    }

    pub fn raw(text: impl Into<String>) -> Self {
        Excerpt {
            auto_generate: false,
            raw: Some(text.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSpec {
    pub title: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    pub deleted: bool,
    pub publish: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_time: Option<String>,
    pub pinned: bool,
    pub allow_comment: bool,
    pub visible: Visibility,
    pub priority: i32,
    pub excerpt: Excerpt,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub html_metas: Vec<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResource {
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    pub spec: PostSpec,
}

/// Raw body plus its rendered form, as submitted alongside the post draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawContent {
    pub raw: String,
    pub content: String,
    pub raw_type: String,
}

impl RawContent {
    pub fn markdown(raw: impl Into<String>, rendered: impl Into<String>) -> Self {
        RawContent {
            raw: raw.into(),
            content: rendered.into(),
            raw_type: "markdown".to_string(),
        }
    }

    pub fn html(body: impl Into<String>) -> Self {
        let body = body.into();
        RawContent {
            raw: body.clone(),
            content: body,
            raw_type: "HTML".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRequest {
    pub post: PostResource,
    pub content: RawContent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upvote: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downvote: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_comment: Option<i64>,
}

impl Counter {
    pub fn is_empty(&self) -> bool {
        self.visit.is_none()
            && self.upvote.is_none()
            && self.downvote.is_none()
            && self.approved_comment.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigratePost {
    pub post_request: PostRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter: Option<Counter>,
}

/// Same shape as a post minus tag/category membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SinglePageSpec {
    pub title: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    pub deleted: bool,
    pub publish: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_time: Option<String>,
    pub pinned: bool,
    pub allow_comment: bool,
    pub visible: Visibility,
    pub priority: i32,
    pub excerpt: Excerpt,
    pub html_metas: Vec<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SinglePageResource {
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    pub spec: SinglePageSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SinglePageRequest {
    pub page: SinglePageResource,
    pub content: RawContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateSinglePage {
    pub single_page_request: SinglePageRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter: Option<Counter>,
}

/// What a comment thread hangs off: a post, a single page or a moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubjectKind {
    Post,
    SinglePage,
    Moment,
}

impl SubjectKind {
    pub fn group(&self) -> &'static str {
        match self {
            SubjectKind::Post | SubjectKind::SinglePage => "content.halo.run",
            SubjectKind::Moment => "moment.halo.run",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::Post => "Post",
            SubjectKind::SinglePage => "SinglePage",
            SubjectKind::Moment => "Moment",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ref {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub name: String,
}

impl Ref {
    pub fn subject(kind: SubjectKind, name: impl Into<String>) -> Self {
        Ref {
            group: Some(kind.group().to_string()),
            version: Some("v1alpha1".to_string()),
            kind: Some(kind.as_str().to_string()),
            name: name.into(),
        }
    }
}

/// Author identity attached to a comment or reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentOwner {
    pub kind: String,
    pub name: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl CommentOwner {
    pub fn email(email: impl Into<String>, display_name: impl Into<String>) -> Self {
        CommentOwner {
            kind: "Email".to_string(),
            name: email.into(),
            display_name: display_name.into(),
            annotations: BTreeMap::new(),
        }
    }

    pub fn with_annotation(mut self, key: &str, value: impl Into<String>) -> Self {
        self.annotations.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentSpec {
    pub raw: String,
    pub content: String,
    pub owner: CommentOwner,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub priority: i32,
    pub top: bool,
    pub allow_notification: bool,
    pub approved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_time: Option<String>,
    pub creation_time: String,
    pub hidden: bool,
    pub subject_ref: Ref,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateComment {
    pub ref_type: SubjectKind,
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    pub spec: CommentSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplySpec {
    pub raw: String,
    pub content: String,
    pub owner: CommentOwner,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub priority: i32,
    pub top: bool,
    pub allow_notification: bool,
    pub approved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_time: Option<String>,
    pub creation_time: String,
    pub hidden: bool,
    /// Name of the root comment this reply ultimately belongs to. Must already
    /// exist on the target when the reply is created.
    pub comment_name: String,
    /// Name of the immediate parent comment or reply being quoted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_reply: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateReply {
    pub ref_type: SubjectKind,
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    pub spec: ReplySpec,
}

/// A comment batch entry: either a thread root or a reply into a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommentEntry {
    Comment(MigrateComment),
    Reply(MigrateReply),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItemSpec {
    pub display_name: String,
    pub priority: i32,
    pub children: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_ref: Option<Ref>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItemResource {
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    pub spec: MenuItemSpec,
}

impl MenuItemResource {
    pub fn new(name: impl Into<String>, spec: MenuItemSpec) -> Self {
        MenuItemResource {
            api_version: MENU_API_VERSION.to_string(),
            kind: "MenuItem".to_string(),
            metadata: Metadata::named(name),
            spec,
        }
    }
}

/// A menu item plus the menu (group) it belongs to. An empty `group_id`
/// maps to the default group at task-build time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateMenuItem {
    pub menu: MenuItemResource,
    pub group_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MomentMedia {
    #[serde(rename = "type")]
    pub media_type: String,
    pub url: String,
    pub origin_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MomentContent {
    pub raw: String,
    pub html: String,
    pub medium: Vec<MomentMedia>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MomentSpec {
    pub content: MomentContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<Visibility>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateMoment {
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    pub spec: MomentSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoSpec {
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    pub group_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigratePhoto {
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    pub spec: PhotoSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkSpec {
    pub url: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    pub group_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateLink {
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    pub spec: LinkSpec,
}

/// Storage backend an attachment lives under. Values outside the known set
/// are preserved verbatim so the unsupported-type failure can name them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttachmentKind {
    Local,
    AliOss,
    BaiduBos,
    TencentCos,
    QiniuOss,
    UpOss,
    Other(String),
}

impl AttachmentKind {
    pub fn as_str(&self) -> &str {
        match self {
            AttachmentKind::Local => "LOCAL",
            AttachmentKind::AliOss => "ALIOSS",
            AttachmentKind::BaiduBos => "BAIDUBOS",
            AttachmentKind::TencentCos => "TENCENTCOS",
            AttachmentKind::QiniuOss => "QINIUOSS",
            AttachmentKind::UpOss => "UPOSS",
            AttachmentKind::Other(other) => other,
        }
    }

    /// Remote object-storage backends share one task shape.
    pub fn is_object_storage(&self) -> bool {
        matches!(
            self,
            AttachmentKind::AliOss
                | AttachmentKind::BaiduBos
                | AttachmentKind::TencentCos
                | AttachmentKind::QiniuOss
                | AttachmentKind::UpOss
        )
    }
}

impl From<&str> for AttachmentKind {
    fn from(s: &str) -> Self {
        match s {
            "LOCAL" => AttachmentKind::Local,
            "ALIOSS" => AttachmentKind::AliOss,
            "BAIDUBOS" => AttachmentKind::BaiduBos,
            "TENCENTCOS" => AttachmentKind::TencentCos,
            "QINIUOSS" => AttachmentKind::QiniuOss,
            "UPOSS" => AttachmentKind::UpOss,
            other => AttachmentKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AttachmentKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AttachmentKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(AttachmentKind::from(raw.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateAttachment {
    pub id: String,
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumb_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// One migration batch: everything a single parser invocation produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateData {
    pub tags: Vec<MigrateTag>,
    pub categories: Vec<MigrateCategory>,
    pub posts: Vec<MigratePost>,
    pub pages: Vec<MigrateSinglePage>,
    pub comments: Vec<CommentEntry>,
    pub menu_items: Vec<MigrateMenuItem>,
    pub moments: Vec<MigrateMoment>,
    pub photos: Vec<MigratePhoto>,
    pub links: Vec<MigrateLink>,
    pub attachments: Vec<MigrateAttachment>,
}

impl MigrateData {
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn total(&self) -> usize {
        self.tags.len()
            + self.categories.len()
            + self.posts.len()
            + self.pages.len()
            + self.comments.len()
            + self.menu_items.len()
            + self.moments.len()
            + self.photos.len()
            + self.links.len()
            + self.attachments.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_serializes_with_wire_field_names() {
        let tag = MigrateTag::new(
            "tag-1",
            TagSpec {
                display_name: "Rust".to_string(),
                slug: "rust".to_string(),
                color: None,
                cover: None,
            },
        );
        let json = serde_json::to_value(&tag).expect("serialize tag");
        assert_eq!(json["apiVersion"], "content.halo.run/v1alpha1");
        assert_eq!(json["kind"], "Tag");
        assert_eq!(json["metadata"]["name"], "tag-1");
        assert_eq!(json["spec"]["displayName"], "Rust");
        assert!(json["spec"].get("color").is_none());
    }

    #[test]
    fn visibility_uses_screaming_case() {
        assert_eq!(
            serde_json::to_value(Visibility::Public).unwrap(),
            serde_json::json!("PUBLIC")
        );
        assert_eq!(
            serde_json::to_value(Visibility::Private).unwrap(),
            serde_json::json!("PRIVATE")
        );
    }

    #[test]
    fn attachment_kind_round_trips_unknown_values() {
        let kind: AttachmentKind = serde_json::from_value(serde_json::json!("FOOBAR")).unwrap();
        assert_eq!(kind, AttachmentKind::Other("FOOBAR".to_string()));
        assert_eq!(serde_json::to_value(&kind).unwrap(), serde_json::json!("FOOBAR"));
        assert!(!kind.is_object_storage());
        assert!(AttachmentKind::from("QINIUOSS").is_object_storage());
    }

    #[test]
    fn subject_ref_carries_group_and_version() {
        let r = Ref::subject(SubjectKind::Moment, "moment-1");
        assert_eq!(r.group.as_deref(), Some("moment.halo.run"));
        assert_eq!(r.kind.as_deref(), Some("Moment"));
        assert_eq!(r.name, "moment-1");
    }
}
