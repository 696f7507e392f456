//! Inventory reader.
//!
//! Lists the images of every requested repository and merges them into a
//! single [`Inventory`], so an image shared between repositories is decided
//! once.

use imgreap_retention::Inventory;
use tracing::{debug, info, instrument};

use crate::error::StoreError;
use crate::store::ImageStore;

/// Reads the images of `repositories` from `store`.
///
/// Fails on the first repository that cannot be listed; no partial inventory
/// is returned.
#[instrument(skip(store))]
pub async fn read_inventory<S>(store: &S, repositories: &[String]) -> Result<Inventory, StoreError>
where
    S: ImageStore + ?Sized,
{
    let mut inventory = Inventory::new(repositories.iter().cloned());

    for repository in repositories {
        info!(repository = %repository, "Processing repository");

        let records = store.list_images(repository).await?;
        if records.is_empty() {
            info!(repository = %repository, "No images found for repository");
            continue;
        }

        debug!(repository = %repository, count = records.len(), "Listed repository images");
        inventory.extend(records);
    }

    Ok(inventory)
}
