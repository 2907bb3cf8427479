//! Task graph builder.
//!
//! Turns a normalized batch into ordered tiers of create-resource tasks.
//! Tier order encodes every dependency the target platform enforces:
//! terms before posts, posts before their counters, root comments before
//! replies, menu items before the menus that list them, groups before the
//! photos and links that reference them.

use std::collections::HashMap;

use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::client::{ClientError, PlatformClient};
use crate::model::{
    AttachmentKind, CommentEntry, MigrateAttachment, MigrateData, CORE_API_VERSION,
    MENU_API_VERSION, METRICS_API_VERSION, STORAGE_API_VERSION,
};

const DEFAULT_POLICY: &str = "default-policy";

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("unsupported attachment storage type {0}")]
    UnsupportedAttachmentType(String),
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Per-run settings the builder needs beyond the batch itself.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// Target-side user that owns created attachments and moments.
    pub owner_name: String,
    /// Folder under the local storage policy that uploaded files live in.
    pub attachment_folder: String,
    /// Attachment storage type -> target policy name.
    pub policy_map: HashMap<String, String>,
}

impl Default for TaskContext {
    fn default() -> Self {
        TaskContext {
            owner_name: "admin".to_string(),
            attachment_folder: "migrated".to_string(),
            policy_map: HashMap::new(),
        }
    }
}

/// What a task creates, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Tag,
    Category,
    Post,
    PostCounter,
    SinglePage,
    SinglePageCounter,
    Comment,
    Reply,
    MenuItem,
    Menu,
    Moment,
    PhotoGroup,
    Photo,
    LinkGroup,
    Link,
    Attachment,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Tag => "tag",
            TaskKind::Category => "category",
            TaskKind::Post => "post",
            TaskKind::PostCounter => "post counter",
            TaskKind::SinglePage => "page",
            TaskKind::SinglePageCounter => "page counter",
            TaskKind::Comment => "comment",
            TaskKind::Reply => "reply",
            TaskKind::MenuItem => "menu item",
            TaskKind::Menu => "menu",
            TaskKind::Moment => "moment",
            TaskKind::PhotoGroup => "photo group",
            TaskKind::Photo => "photo",
            TaskKind::LinkGroup => "link group",
            TaskKind::Link => "link",
            TaskKind::Attachment => "attachment",
        }
    }
}

enum TaskAction {
    Create { path: &'static str, payload: Value },
    Unsupported { storage_type: String },
}

/// One create-resource unit of work. A plain value: building a plan performs
/// no IO.
pub struct Task {
    pub kind: TaskKind,
    /// Resource name, for logs and the run report.
    pub name: String,
    action: TaskAction,
}

impl Task {
    fn create(kind: TaskKind, name: impl Into<String>, path: &'static str, payload: Value) -> Self {
        Task {
            kind,
            name: name.into(),
            action: TaskAction::Create { path, payload },
        }
    }

    pub async fn execute(&self, client: &dyn PlatformClient) -> Result<(), TaskError> {
        match &self.action {
            TaskAction::Create { path, payload } => {
                client.create(path, payload).await?;
                Ok(())
            }
            TaskAction::Unsupported { storage_type } => Err(
                TaskError::UnsupportedAttachmentType(storage_type.clone()),
            ),
        }
    }
}

/// Tasks that may run concurrently with each other but only after every
/// earlier tier finished.
pub struct TaskTier {
    pub label: &'static str,
    pub tasks: Vec<Task>,
}

pub struct TaskPlan {
    pub tiers: Vec<TaskTier>,
}

impl TaskPlan {
    pub fn total(&self) -> usize {
        self.tiers.iter().map(|tier| tier.tasks.len()).sum()
    }
}

pub fn build_tasks(data: &MigrateData, context: &TaskContext) -> TaskPlan {
    let mut tiers = Vec::with_capacity(16);

    tiers.push(TaskTier {
        label: "tags",
        tasks: data
            .tags
            .iter()
            .map(|tag| {
                Task::create(
                    TaskKind::Tag,
                    &tag.metadata.name,
                    "/apis/content.halo.run/v1alpha1/tags",
                    json!(tag),
                )
            })
            .collect(),
    });

    tiers.push(TaskTier {
        label: "categories",
        tasks: data
            .categories
            .iter()
            .map(|category| {
                Task::create(
                    TaskKind::Category,
                    &category.metadata.name,
                    "/apis/content.halo.run/v1alpha1/categories",
                    json!(category),
                )
            })
            .collect(),
    });

    tiers.push(TaskTier {
        label: "posts",
        tasks: data
            .posts
            .iter()
            .map(|post| {
                Task::create(
                    TaskKind::Post,
                    &post.post_request.post.metadata.name,
                    "/apis/api.console.halo.run/v1alpha1/posts",
                    json!(&post.post_request),
                )
            })
            .collect(),
    });

    tiers.push(TaskTier {
        label: "post counters",
        tasks: data
            .posts
            .iter()
            .filter_map(|post| {
                let counter = post.counter.filter(|c| !c.is_empty())?;
                let name = format!(
                    "posts.content.halo.run/{}",
                    post.post_request.post.metadata.name
                );
                Some(counter_task(TaskKind::PostCounter, name, &counter))
            })
            .collect(),
    });

    tiers.push(TaskTier {
        label: "pages",
        tasks: data
            .pages
            .iter()
            .map(|page| {
                Task::create(
                    TaskKind::SinglePage,
                    &page.single_page_request.page.metadata.name,
                    "/apis/api.console.halo.run/v1alpha1/singlepages",
                    json!(&page.single_page_request),
                )
            })
            .collect(),
    });

    tiers.push(TaskTier {
        label: "page counters",
        tasks: data
            .pages
            .iter()
            .filter_map(|page| {
                let counter = page.counter.filter(|c| !c.is_empty())?;
                let name = format!(
                    "singlepages.content.halo.run/{}",
                    page.single_page_request.page.metadata.name
                );
                Some(counter_task(TaskKind::SinglePageCounter, name, &counter))
            })
            .collect(),
    });

    tiers.push(TaskTier {
        label: "comments",
        tasks: data
            .comments
            .iter()
            .filter_map(|entry| match entry {
                CommentEntry::Comment(comment) => Some(Task::create(
                    TaskKind::Comment,
                    &comment.metadata.name,
                    "/apis/content.halo.run/v1alpha1/comments",
                    json!({
                        "apiVersion": &comment.api_version,
                        "kind": &comment.kind,
                        "metadata": &comment.metadata,
                        "spec": &comment.spec,
                    }),
                )),
                CommentEntry::Reply(_) => None,
            })
            .collect(),
    });

    tiers.push(TaskTier {
        label: "replies",
        tasks: data
            .comments
            .iter()
            .filter_map(|entry| match entry {
                CommentEntry::Reply(reply) => Some(Task::create(
                    TaskKind::Reply,
                    &reply.metadata.name,
                    "/apis/content.halo.run/v1alpha1/replies",
                    json!({
                        "apiVersion": &reply.api_version,
                        "kind": &reply.kind,
                        "metadata": &reply.metadata,
                        "spec": &reply.spec,
                    }),
                )),
                CommentEntry::Comment(_) => None,
            })
            .collect(),
    });

    // Items before the menus that list them: a menu payload references its
    // member item names, so the items must exist first.
    tiers.push(TaskTier {
        label: "menu items",
        tasks: data
            .menu_items
            .iter()
            .map(|item| {
                Task::create(
                    TaskKind::MenuItem,
                    &item.menu.metadata.name,
                    "/apis/v1alpha1/menuitems",
                    json!(&item.menu),
                )
            })
            .collect(),
    });

    tiers.push(TaskTier {
        label: "menus",
        tasks: build_menus(data),
    });

    tiers.push(TaskTier {
        label: "moments",
        tasks: data
            .moments
            .iter()
            .map(|moment| {
                let mut moment = moment.clone();
                if moment.spec.owner.is_none() {
                    moment.spec.owner = Some(context.owner_name.clone());
                }
                let name = moment.metadata.name.clone();
                Task::create(
                    TaskKind::Moment,
                    name,
                    "/apis/api.plugin.halo.run/v1alpha1/plugins/PluginMoments/moments",
                    json!(moment),
                )
            })
            .collect(),
    });

    tiers.push(TaskTier {
        label: "photo groups",
        tasks: distinct(data.photos.iter().map(|photo| photo.spec.group_name.as_str()))
            .into_iter()
            .map(|group| {
                Task::create(
                    TaskKind::PhotoGroup,
                    group,
                    "/apis/core.halo.run/v1alpha1/photogroups",
                    json!({
                        "apiVersion": CORE_API_VERSION,
                        "kind": "PhotoGroup",
                        "metadata": { "name": group },
                        "spec": { "displayName": group, "priority": 0 },
                    }),
                )
            })
            .collect(),
    });

    tiers.push(TaskTier {
        label: "photos",
        tasks: data
            .photos
            .iter()
            .map(|photo| {
                Task::create(
                    TaskKind::Photo,
                    &photo.metadata.name,
                    "/apis/core.halo.run/v1alpha1/photos",
                    json!(photo),
                )
            })
            .collect(),
    });

    tiers.push(TaskTier {
        label: "link groups",
        tasks: distinct(data.links.iter().map(|link| link.spec.group_name.as_str()))
            .into_iter()
            .map(|group| {
                let members: Vec<&str> = data
                    .links
                    .iter()
                    .filter(|link| link.spec.group_name == group)
                    .map(|link| link.metadata.name.as_str())
                    .collect();
                Task::create(
                    TaskKind::LinkGroup,
                    group,
                    "/apis/core.halo.run/v1alpha1/linkgroups",
                    json!({
                        "apiVersion": CORE_API_VERSION,
                        "kind": "LinkGroup",
                        "metadata": { "name": group },
                        "spec": { "displayName": group, "priority": 0, "links": members },
                    }),
                )
            })
            .collect(),
    });

    tiers.push(TaskTier {
        label: "links",
        tasks: data
            .links
            .iter()
            .map(|link| {
                Task::create(
                    TaskKind::Link,
                    &link.metadata.name,
                    "/apis/core.halo.run/v1alpha1/links",
                    json!(link),
                )
            })
            .collect(),
    });

    tiers.push(TaskTier {
        label: "attachments",
        tasks: data
            .attachments
            .iter()
            .map(|attachment| attachment_task(attachment, context))
            .collect(),
    });

    TaskPlan { tiers }
}

fn counter_task(kind: TaskKind, name: String, counter: &crate::model::Counter) -> Task {
    let payload = json!({
        "apiVersion": METRICS_API_VERSION,
        "kind": "Counter",
        "metadata": { "name": &name },
        "visit": counter.visit.unwrap_or(0),
        "upvote": counter.upvote.unwrap_or(0),
        "downvote": counter.downvote.unwrap_or(0),
        "totalComment": 0,
        "approvedComment": counter.approved_comment.unwrap_or(0),
    });
    Task::create(kind, name, "/apis/metrics.halo.run/v1alpha1/counters", payload)
}

fn build_menus(data: &MigrateData) -> Vec<Task> {
    let mut tasks = Vec::new();
    for group_id in distinct(data.menu_items.iter().map(|item| item.group_id.as_str())) {
        let items: Vec<_> = data
            .menu_items
            .iter()
            .filter(|item| item.group_id == group_id)
            .collect();
        let name = if group_id.is_empty() { "default" } else { group_id };
        let display_name = items
            .iter()
            .find_map(|item| item.group_name.as_deref())
            .unwrap_or(name);
        let member_names: Vec<&str> = items
            .iter()
            .map(|item| item.menu.metadata.name.as_str())
            .collect();
        tasks.push(Task::create(
            TaskKind::Menu,
            name,
            "/apis/v1alpha1/menus",
            json!({
                "apiVersion": MENU_API_VERSION,
                "kind": "Menu",
                "metadata": { "name": name },
                "spec": { "displayName": display_name, "menuItems": member_names },
            }),
        ));
    }
    tasks
}

fn attachment_task(attachment: &MigrateAttachment, context: &TaskContext) -> Task {
    let mut annotations = serde_json::Map::new();
    match &attachment.kind {
        AttachmentKind::Local => {
            let relative = attachment
                .path
                .strip_prefix("upload/")
                .unwrap_or(&attachment.path);
            annotations.insert(
                "storage.halo.run/local-relative-path".to_string(),
                json!(format!("{}/{relative}", context.attachment_folder)),
            );
            annotations.insert(
                "storage.halo.run/uri".to_string(),
                json!(format!("/{}", attachment.path)),
            );
        }
        kind if kind.is_object_storage() => {
            annotations.insert(
                "s3os.plugin.halo.run/object-key".to_string(),
                json!(attachment.file_key.clone().unwrap_or_default()),
            );
            annotations.insert(
                "storage.halo.run/external-link".to_string(),
                json!(&attachment.path),
            );
        }
        AttachmentKind::Other(storage_type) => {
            return Task {
                kind: TaskKind::Attachment,
                name: attachment.name.clone(),
                action: TaskAction::Unsupported {
                    storage_type: storage_type.clone(),
                },
            };
        }
        _ => {}
    }
    if let Some(suffix) = &attachment.suffix {
        annotations.insert("storage.halo.run/suffix".to_string(), json!(suffix));
    }
    if let Some(width) = attachment.width {
        annotations.insert("storage.halo.run/width".to_string(), json!(width.to_string()));
    }
    if let Some(height) = attachment.height {
        annotations.insert("storage.halo.run/height".to_string(), json!(height.to_string()));
    }

    let policy = context
        .policy_map
        .get(attachment.kind.as_str())
        .map(String::as_str)
        .unwrap_or(DEFAULT_POLICY);

    let payload = json!({
        "apiVersion": STORAGE_API_VERSION,
        "kind": "Attachment",
        "metadata": {
            "name": Uuid::new_v4().to_string(),
            "annotations": annotations,
        },
        "spec": {
            "displayName": &attachment.name,
            "groupName": attachment.group_name.clone().unwrap_or_default(),
            "ownerName": &context.owner_name,
            "policyName": policy,
            "mediaType": &attachment.media_type,
            "size": attachment.size,
            "tags": &attachment.tags,
        },
    });
    Task::create(
        TaskKind::Attachment,
        &attachment.name,
        "/apis/storage.halo.run/v1alpha1/attachments",
        payload,
    )
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut out: Vec<&str> = Vec::new();
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}
