//! Process-scoped cache of absolute queue positions.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::types::ResourceId;

/// Keyed cache `ResourceId -> absolute queue position`.
///
/// Cloning yields another handle onto the same map. Writes replace the whole
/// value for a key; there is no partial merge. Only the queue client mutates
/// the store, but any holder may read it.
#[derive(Debug, Clone, Default)]
pub struct PositionAnchorStore {
    anchors: Arc<RwLock<HashMap<ResourceId, u64>>>,
}

impl PositionAnchorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached anchor for `resource`, if one was assigned.
    pub async fn get(&self, resource: ResourceId) -> Option<u64> {
        self.anchors.read().await.get(&resource).copied()
    }

    pub async fn set(&self, resource: ResourceId, absolute: u64) {
        self.anchors.write().await.insert(resource, absolute);
    }

    /// Remove the anchor. Returns the value that was cached.
    pub async fn delete(&self, resource: ResourceId) -> Option<u64> {
        self.anchors.write().await.remove(&resource)
    }

    pub async fn len(&self) -> usize {
        self.anchors.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.anchors.read().await.is_empty()
    }
}
