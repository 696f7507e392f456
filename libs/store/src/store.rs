//! Image store interface.

use async_trait::async_trait;
use imgreap_retention::{ImageId, ImageRecord};

use crate::error::StoreError;

/// The operations imgreap needs from a local image store.
///
/// Read operations never mutate the store. Mutations must report
/// [`StoreError::InUse`] when a container still references the image, so the
/// caller can tell it apart from other failures.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Images listed under `repository`, including dangling images whose
    /// digests name it.
    async fn list_images(&self, repository: &str) -> Result<Vec<ImageRecord>, StoreError>;

    /// Image ids referenced by every container, whatever its state.
    async fn list_container_image_ids(&self) -> Result<Vec<ImageId>, StoreError>;

    /// Deletes `image`.
    ///
    /// The record is the snapshot the deletion was planned from. A store that
    /// has to drop references first may only drop the ones recorded there;
    /// any other reference makes the deletion fail.
    async fn delete_image(&self, image: &ImageRecord) -> Result<(), StoreError>;

    /// Removes one `repository:label` reference.
    async fn remove_tag(&self, tag: &str) -> Result<(), StoreError>;
}
