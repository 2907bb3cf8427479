//! Relationship resolution over parsed entities.
//!
//! Source platforms store hierarchy as parent pointers. The target wants the
//! inverse: categories and menu items list their children by name, and
//! comment threads are flattened into root comments plus replies that point
//! at their thread root. This module performs both inversions.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::model::{
    CommentEntry, MigrateComment, MigrateReply, ReplySpec, CONTENT_API_VERSION,
};

/// Populate `children` lists from `(child, parent)` name pairs.
///
/// Pairs whose parent is not among `items` are ignored. Calling this twice
/// produces the same lists, repeat names are not appended.
pub fn attach_children<T>(
    items: &mut [T],
    pairs: &[(String, String)],
    name_of: impl Fn(&T) -> &str,
    children_of: impl Fn(&mut T) -> &mut Vec<String>,
) {
    for (child, parent) in pairs {
        let Some(item) = items.iter_mut().find(|item| name_of(item) == parent) else {
            continue;
        };
        let children = children_of(item);
        if !children.iter().any(|name| name == child) {
            children.push(child.clone());
        }
    }
}

/// A comment as the parser saw it, with the source-side thread pointers
/// still attached. `parent_id` is `None` for thread roots.
#[derive(Debug, Clone)]
pub struct ThreadSource {
    pub id: String,
    pub parent_id: Option<String>,
    pub comment: MigrateComment,
}

/// Flatten parent-pointer threads into a batch of root comments followed by
/// replies. Each reply names its thread root (which must be created first)
/// and quotes its immediate parent when that parent is itself a reply.
///
/// Items whose parent id is unknown are promoted to thread roots with a
/// warning, as are items caught in a parent cycle.
pub fn flatten_comments(items: Vec<ThreadSource>) -> Vec<CommentEntry> {
    let index: HashMap<String, (Option<String>, String)> = items
        .iter()
        .map(|item| {
            (
                item.id.clone(),
                (item.parent_id.clone(), item.comment.metadata.name.clone()),
            )
        })
        .collect();

    let mut roots = Vec::new();
    let mut replies = Vec::new();

    for item in items {
        match classify(&item, &index) {
            Thread::Root => roots.push(CommentEntry::Comment(item.comment)),
            Thread::Reply { root_name, quoted } => {
                replies.push(CommentEntry::Reply(into_reply(item, root_name, quoted)));
            }
        }
    }

    roots.extend(replies);
    roots
}

enum Thread {
    Root,
    Reply {
        root_name: String,
        quoted: Option<String>,
    },
}

fn classify(item: &ThreadSource, index: &HashMap<String, (Option<String>, String)>) -> Thread {
    let Some(parent_id) = &item.parent_id else {
        return Thread::Root;
    };
    if !index.contains_key(parent_id) {
        warn!(id = %item.id, parent = %parent_id, "comment parent not found, keeping as thread root");
        return Thread::Root;
    }

    // Walk to the thread root, guarding against pointer cycles.
    let mut seen = HashSet::new();
    seen.insert(item.id.clone());
    let mut current = parent_id.clone();
    loop {
        if !seen.insert(current.clone()) {
            warn!(id = %item.id, "comment parent chain forms a cycle, keeping as thread root");
            return Thread::Root;
        }
        match index.get(&current).map(|(parent, _)| parent) {
            // An ancestor whose own parent is unknown is promoted to a
            // thread root, so the reply anchors there.
            Some(Some(next)) if index.contains_key(next) => current = next.clone(),
            _ => break,
        }
    }

    let Some((_, root_name)) = index.get(&current) else {
        return Thread::Root;
    };
    let root_name = root_name.clone();
    // Quote the immediate parent only when it is not the thread root.
    let quoted = index
        .get(parent_id)
        .filter(|_| *parent_id != current)
        .map(|(_, name)| name.clone());
    Thread::Reply { root_name, quoted }
}

fn into_reply(item: ThreadSource, root_name: String, quoted: Option<String>) -> MigrateReply {
    let comment = item.comment;
    let spec = comment.spec;
    MigrateReply {
        ref_type: comment.ref_type,
        api_version: CONTENT_API_VERSION.to_string(),
        kind: "Reply".to_string(),
        metadata: comment.metadata,
        spec: ReplySpec {
            raw: spec.raw,
            content: spec.content,
            owner: spec.owner,
            ip_address: spec.ip_address,
            user_agent: spec.user_agent,
            priority: spec.priority,
            top: spec.top,
            allow_notification: spec.allow_notification,
            approved: spec.approved,
            approved_time: spec.approved_time,
            creation_time: spec.creation_time,
            hidden: spec.hidden,
            comment_name: root_name,
            quote_reply: quoted,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        CommentOwner, CommentSpec, MigrateCategory, CategorySpec, Metadata, Ref, SubjectKind,
    };
    use proptest::prelude::*;

    fn category(name: &str) -> MigrateCategory {
        MigrateCategory::new(
            name,
            CategorySpec {
                display_name: name.to_string(),
                slug: name.to_string(),
                description: None,
                cover: None,
                priority: 0,
                children: Vec::new(),
            },
        )
    }

    fn comment(id: &str, parent: Option<&str>) -> ThreadSource {
        ThreadSource {
            id: id.to_string(),
            parent_id: parent.map(str::to_string),
            comment: MigrateComment {
                ref_type: SubjectKind::Post,
                api_version: CONTENT_API_VERSION.to_string(),
                kind: "Comment".to_string(),
                metadata: Metadata::named(format!("comment-{id}")),
                spec: CommentSpec {
                    raw: String::new(),
                    content: String::new(),
                    owner: CommentOwner::email("a@b.c", "a"),
                    ip_address: None,
                    user_agent: None,
                    priority: 0,
                    top: false,
                    allow_notification: false,
                    approved: true,
                    approved_time: None,
                    creation_time: "2020-01-01T00:00:00Z".to_string(),
                    hidden: false,
                    subject_ref: Ref::subject(SubjectKind::Post, "post-1"),
                },
            },
        }
    }

    fn reply_names(entries: &[CommentEntry]) -> Vec<(&str, Option<&str>)> {
        entries
            .iter()
            .filter_map(|entry| match entry {
                CommentEntry::Reply(reply) => Some((
                    reply.spec.comment_name.as_str(),
                    reply.spec.quote_reply.as_deref(),
                )),
                CommentEntry::Comment(_) => None,
            })
            .collect()
    }

    #[test]
    fn attach_children_is_idempotent() {
        let mut categories = vec![category("a"), category("b"), category("c")];
        let pairs = vec![
            ("b".to_string(), "a".to_string()),
            ("c".to_string(), "a".to_string()),
            ("c".to_string(), "missing".to_string()),
        ];
        for _ in 0..2 {
            attach_children(
                &mut categories,
                &pairs,
                |c| &c.metadata.name,
                |c| &mut c.spec.children,
            );
        }
        assert_eq!(categories[0].spec.children, vec!["b", "c"]);
        assert!(categories[1].spec.children.is_empty());
    }

    #[test]
    fn deep_replies_anchor_at_thread_root() {
        let entries = flatten_comments(vec![
            comment("1", None),
            comment("2", Some("1")),
            comment("3", Some("2")),
        ]);
        assert!(matches!(entries[0], CommentEntry::Comment(_)));
        assert_eq!(
            reply_names(&entries),
            vec![
                ("comment-1", None),
                ("comment-1", Some("comment-2")),
            ]
        );
    }

    #[test]
    fn orphan_parent_becomes_root() {
        let entries = flatten_comments(vec![comment("1", Some("99"))]);
        assert!(matches!(entries[0], CommentEntry::Comment(_)));
    }

    #[test]
    fn parent_cycle_becomes_root() {
        let entries = flatten_comments(vec![comment("1", Some("2")), comment("2", Some("1"))]);
        assert_eq!(entries.len(), 2);
        assert!(entries
            .iter()
            .all(|entry| matches!(entry, CommentEntry::Comment(_))));
    }

    #[test]
    fn roots_precede_replies() {
        let entries = flatten_comments(vec![
            comment("1", None),
            comment("2", Some("1")),
            comment("3", None),
        ]);
        let kinds: Vec<bool> = entries
            .iter()
            .map(|entry| matches!(entry, CommentEntry::Comment(_)))
            .collect();
        assert_eq!(kinds, vec![true, true, false]);
    }

    proptest! {
        #[test]
        fn every_reply_targets_an_emitted_root(parents in proptest::collection::vec(proptest::option::of(0usize..8), 1..8)) {
            let items: Vec<ThreadSource> = parents
                .iter()
                .enumerate()
                .map(|(i, parent)| {
                    comment(&i.to_string(), parent.map(|p| p.to_string()).as_deref())
                })
                .collect();
            let total = items.len();
            let entries = flatten_comments(items);
            prop_assert_eq!(entries.len(), total);

            let roots: HashSet<&str> = entries
                .iter()
                .filter_map(|entry| match entry {
                    CommentEntry::Comment(c) => Some(c.metadata.name.as_str()),
                    CommentEntry::Reply(_) => None,
                })
                .collect();
            for (name, _) in reply_names(&entries) {
                prop_assert!(roots.contains(name));
            }
        }
    }
}
