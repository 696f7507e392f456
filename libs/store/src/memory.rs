//! In-memory image store.
//!
//! Mirrors the Docker semantics imgreap relies on: removing the last tag of
//! an image deletes it, and images referenced by a container refuse deletion.
//! Failures can be injected per image or tag to exercise error handling.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use imgreap_retention::{ImageId, ImageRecord};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::StoreError;
use crate::store::ImageStore;

/// A mutating call received by a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    DeleteImage(ImageId),
    RemoveTag(String),
}

#[derive(Debug, Default)]
struct MemoryState {
    images: BTreeMap<ImageId, ImageRecord>,
    /// Containers reported by `list_container_image_ids`.
    containers: Vec<ImageId>,
    /// Containers created after the usage snapshot: they block deletion but
    /// are not listed.
    late_containers: BTreeSet<ImageId>,
    delete_failures: BTreeMap<ImageId, StoreError>,
    tag_failures: BTreeMap<String, StoreError>,
    unavailable: bool,
    calls: Vec<StoreCall>,
}

impl MemoryState {
    fn in_use(&self, id: &ImageId) -> bool {
        self.containers.contains(id) || self.late_containers.contains(id)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable {
            Err(StoreError::Unavailable("memory store is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

/// [`ImageStore`] kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an image.
    #[must_use]
    pub fn with_image(mut self, record: ImageRecord) -> Self {
        let state = self.state.get_mut();
        state.images.insert(record.id.clone(), record);
        self
    }

    /// Adds a container referencing `id`, visible to the usage snapshot.
    #[must_use]
    pub fn with_container(mut self, id: impl Into<ImageId>) -> Self {
        self.state.get_mut().containers.push(id.into());
        self
    }

    /// Adds a container referencing `id` that only shows up when deleting.
    #[must_use]
    pub fn with_late_container(mut self, id: impl Into<ImageId>) -> Self {
        self.state.get_mut().late_containers.insert(id.into());
        self
    }

    /// Makes every deletion of `id` fail with `error`.
    #[must_use]
    pub fn with_delete_failure(mut self, id: impl Into<ImageId>, error: StoreError) -> Self {
        self.state.get_mut().delete_failures.insert(id.into(), error);
        self
    }

    /// Makes every removal of `tag` fail with `error`.
    #[must_use]
    pub fn with_tag_failure(mut self, tag: impl Into<String>, error: StoreError) -> Self {
        self.state.get_mut().tag_failures.insert(tag.into(), error);
        self
    }

    /// Simulates a daemon that cannot be reached.
    #[must_use]
    pub fn offline(mut self) -> Self {
        self.state.get_mut().unavailable = true;
        self
    }

    /// Mutating calls received so far, in order.
    pub async fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn contains(&self, id: &ImageId) -> bool {
        self.state.lock().await.images.contains_key(id)
    }

    pub async fn image(&self, id: &ImageId) -> Option<ImageRecord> {
        self.state.lock().await.images.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.images.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.images.is_empty()
    }
}

#[async_trait]
impl ImageStore for MemoryStore {
    async fn list_images(&self, repository: &str) -> Result<Vec<ImageRecord>, StoreError> {
        let state = self.state.lock().await;
        state.check_available()?;
        Ok(state
            .images
            .values()
            .filter(|record| record.belongs_to(repository))
            .cloned()
            .collect())
    }

    async fn list_container_image_ids(&self) -> Result<Vec<ImageId>, StoreError> {
        let state = self.state.lock().await;
        state.check_available()?;
        Ok(state.containers.clone())
    }

    async fn delete_image(&self, image: &ImageRecord) -> Result<(), StoreError> {
        let id = &image.id;
        let mut state = self.state.lock().await;
        state.check_available()?;
        state.calls.push(StoreCall::DeleteImage(id.clone()));

        if let Some(error) = state.delete_failures.get(id) {
            return Err(error.clone());
        }
        if !state.images.contains_key(id) {
            return Err(StoreError::NotFound(id.to_string()));
        }
        if state.in_use(id) {
            return Err(StoreError::in_use(
                id.as_str(),
                "image is being used by a container",
            ));
        }

        state.images.remove(id);
        debug!(image_id = %id, "Deleted image from memory store");
        Ok(())
    }

    async fn remove_tag(&self, tag: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.check_available()?;
        state.calls.push(StoreCall::RemoveTag(tag.to_string()));

        if let Some(error) = state.tag_failures.get(tag) {
            return Err(error.clone());
        }

        let Some(id) = state
            .images
            .values()
            .find(|record| record.tags.contains(tag))
            .map(|record| record.id.clone())
        else {
            return Err(StoreError::NotFound(tag.to_string()));
        };

        let last_tag = state.images.get(&id).is_some_and(|record| record.tags.len() == 1);
        if last_tag && state.in_use(&id) {
            return Err(StoreError::in_use(
                tag,
                "container is using its referenced image",
            ));
        }

        if last_tag {
            state.images.remove(&id);
        } else if let Some(record) = state.images.get_mut(&id) {
            record.tags.remove(tag);
        }
        debug!(tag = tag, image_id = %id, deleted = last_tag, "Removed tag from memory store");
        Ok(())
    }
}
