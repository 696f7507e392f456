//! Usage oracle.

use imgreap_retention::UsageSet;
use tracing::debug;

use crate::error::StoreError;
use crate::store::ImageStore;

/// Collects the ids of images referenced by any container, in any state.
///
/// The set is global: a container may use an image from any repository.
pub async fn read_usage<S>(store: &S) -> Result<UsageSet, StoreError>
where
    S: ImageStore + ?Sized,
{
    let usage: UsageSet = store.list_container_image_ids().await?.into_iter().collect();
    debug!(count = usage.len(), "Determined used image ids");
    Ok(usage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use imgreap_retention::ImageId;

    #[tokio::test]
    async fn test_duplicate_references_collapse() {
        let store = MemoryStore::new()
            .with_container("sha256:a")
            .with_container("sha256:a")
            .with_container("sha256:b");

        let usage = read_usage(&store).await.unwrap();
        assert_eq!(usage.len(), 2);
        assert!(usage.contains(&ImageId::new("sha256:a")));
    }

    #[tokio::test]
    async fn test_unreachable_store_fails() {
        let store = MemoryStore::new().offline();
        assert!(read_usage(&store).await.unwrap_err().is_unavailable());
    }
}
