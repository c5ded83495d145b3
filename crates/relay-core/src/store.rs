use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::node::{MessageId, MessageNode};

/// Process-wide arena of reconstructed message nodes
///
/// Entries are never evicted; growth is bounded by conversation activity.
/// Cloning is cheap and shares the same arena.
#[derive(Clone, Default)]
pub struct NodeStore {
    nodes: Arc<RwLock<HashMap<MessageId, MessageNode>>>,
}

/// Ancestors collected from a leaf, newest first
#[derive(Debug, Clone)]
pub struct Ancestry {
    pub nodes: Vec<MessageNode>,
    /// The walk stopped at the limit while a further ancestor was linked
    pub truncated: bool,
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh a node
    ///
    /// An existing `replied_to` link survives a refresh that carries none.
    pub async fn upsert(&self, node: MessageNode) {
        let mut nodes = self.nodes.write().await;
        match nodes.entry(node.id) {
            Entry::Occupied(mut entry) => {
                let replied_to = node.replied_to.or(entry.get().replied_to);
                entry.insert(MessageNode { replied_to, ..node });
            }
            Entry::Vacant(entry) => {
                entry.insert(node);
            }
        }
    }

    /// Point `child` at `parent`; returns false when `child` is unknown
    pub async fn link(&self, child: MessageId, parent: MessageId) -> bool {
        let mut nodes = self.nodes.write().await;
        match nodes.get_mut(&child) {
            Some(node) => {
                node.replied_to = Some(parent);
                true
            }
            None => false,
        }
    }

    pub async fn get(&self, id: MessageId) -> Option<MessageNode> {
        self.nodes.read().await.get(&id).cloned()
    }

    pub async fn contains(&self, id: MessageId) -> bool {
        self.nodes.read().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.nodes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.nodes.read().await.is_empty()
    }

    /// Follow `replied_to` from `leaf`, collecting at most `limit` nodes
    pub async fn ancestry(&self, leaf: MessageId, limit: usize) -> Ancestry {
        let nodes = self.nodes.read().await;
        let mut collected = Vec::new();
        let mut truncated = false;
        let mut cursor = Some(leaf);

        while let Some(id) = cursor {
            let Some(node) = nodes.get(&id) else {
                break;
            };
            if collected.len() == limit {
                truncated = true;
                break;
            }
            cursor = node.replied_to;
            collected.push(node.clone());
        }

        Ancestry {
            nodes: collected,
            truncated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Role;
    use relay_llm::Content;

    fn node(id: u64, replied_to: Option<u64>) -> MessageNode {
        MessageNode {
            id: MessageId(id),
            role: Role::User,
            content: Content::text(format!("m{id}")),
            author_name: "7".to_string(),
            too_many_images: false,
            replied_to: replied_to.map(MessageId),
        }
    }

    #[tokio::test]
    async fn test_upsert_keeps_existing_link() {
        let store = NodeStore::new();
        store.upsert(node(1, None)).await;
        store.upsert(node(2, Some(1))).await;
        store.upsert(node(2, None)).await;

        assert_eq!(store.len().await, 2);
        assert_eq!(store.get(MessageId(2)).await.unwrap().replied_to, Some(MessageId(1)));
    }

    #[tokio::test]
    async fn test_link_unknown_child() {
        let store = NodeStore::new();
        assert!(!store.link(MessageId(5), MessageId(4)).await);
    }

    #[tokio::test]
    async fn test_ancestry_stops_at_limit() {
        let store = NodeStore::new();
        store.upsert(node(1, None)).await;
        store.upsert(node(2, Some(1))).await;
        store.upsert(node(3, Some(2))).await;

        let ancestry = store.ancestry(MessageId(3), 2).await;
        let ids: Vec<u64> = ancestry.nodes.iter().map(|n| n.id.0).collect();
        assert_eq!(ids, vec![3, 2]);
        assert!(ancestry.truncated);

        let ancestry = store.ancestry(MessageId(3), 3).await;
        assert_eq!(ancestry.nodes.len(), 3);
        assert!(!ancestry.truncated);
    }

    #[tokio::test]
    async fn test_ancestry_bounded_on_cycle() {
        let store = NodeStore::new();
        store.upsert(node(1, Some(2))).await;
        store.upsert(node(2, Some(1))).await;

        let ancestry = store.ancestry(MessageId(1), 5).await;
        assert_eq!(ancestry.nodes.len(), 5);
        assert!(ancestry.truncated);
    }
}
