//! Docker Engine API payloads and their normalization.

use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use imgreap_retention::{ImageId, ImageRecord};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Placeholder Docker reports for missing tags and digests.
const NONE_TAG: &str = "<none>:<none>";
const NONE_DIGEST: &str = "<none>@<none>";

/// Filters for `GET /images/json`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImageFilters(BTreeMap<&'static str, Vec<String>>);

impl ImageFilters {
    /// Images with a reference in `repository`.
    pub fn reference(repository: &str) -> Self {
        let mut filters = BTreeMap::new();
        filters.insert("reference", vec![repository.to_string()]);
        Self(filters)
    }

    /// Images without any tag.
    pub fn dangling() -> Self {
        let mut filters = BTreeMap::new();
        filters.insert("dangling", vec!["true".to_string()]);
        Self(filters)
    }
}

/// Entry of `GET /images/json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImageSummary {
    pub id: String,
    #[serde(default)]
    pub repo_tags: Option<Vec<String>>,
    #[serde(default)]
    pub repo_digests: Option<Vec<String>>,
    /// Unix seconds.
    pub created: i64,
    #[serde(default)]
    pub size: i64,
}

impl ImageSummary {
    /// Converts the daemon's view into an [`ImageRecord`], dropping placeholders.
    pub fn into_record(self) -> Result<ImageRecord, StoreError> {
        let created = Utc.timestamp_opt(self.created, 0).single().ok_or_else(|| {
            StoreError::Decode(format!(
                "image {} has invalid creation time {}",
                self.id, self.created
            ))
        })?;

        let mut record = ImageRecord::new(
            ImageId::new(self.id),
            created,
            u64::try_from(self.size).unwrap_or(0),
        );
        record.tags = self
            .repo_tags
            .unwrap_or_default()
            .into_iter()
            .filter(|tag| tag != NONE_TAG)
            .collect();
        record.repo_digests = self
            .repo_digests
            .unwrap_or_default()
            .into_iter()
            .filter(|digest| digest != NONE_DIGEST)
            .collect();
        Ok(record)
    }
}

/// Subset of `GET /images/{name}/json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImageInspect {
    #[serde(default)]
    pub repo_tags: Option<Vec<String>>,
    #[serde(default)]
    pub repo_digests: Option<Vec<String>>,
}

impl ImageInspect {
    /// Current references of the image that `snapshot` also recorded, tags
    /// first. References added since the snapshot are left out.
    pub fn references_in(&self, snapshot: &ImageRecord) -> Vec<String> {
        let tags = self
            .repo_tags
            .iter()
            .flatten()
            .filter(|tag| snapshot.tags.contains(*tag));
        let digests = self
            .repo_digests
            .iter()
            .flatten()
            .filter(|digest| snapshot.repo_digests.contains(*digest));
        tags.chain(digests).cloned().collect()
    }
}

/// Entry of `GET /containers/json`.
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerSummary {
    #[serde(rename = "ImageID", default)]
    pub image_id: String,
}

/// Error payload returned by the daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_summary_normalization() {
        let summary: ImageSummary = serde_json::from_str(
            r#"{
                "Id": "sha256:9f1c",
                "ParentId": "",
                "RepoTags": ["web:v3", "<none>:<none>"],
                "RepoDigests": ["web@sha256:aaaa", "<none>@<none>"],
                "Created": 1718000000,
                "Size": 52428800,
                "SharedSize": -1,
                "Containers": -1
            }"#,
        )
        .unwrap();

        let record = summary.into_record().unwrap();
        assert_eq!(record.id.as_str(), "sha256:9f1c");
        assert_eq!(record.tags.iter().collect::<Vec<_>>(), vec!["web:v3"]);
        assert_eq!(
            record.repo_digests.iter().collect::<Vec<_>>(),
            vec!["web@sha256:aaaa"]
        );
        assert_eq!(record.created.timestamp(), 1718000000);
        assert_eq!(record.size_bytes, 52428800);
    }

    #[test]
    fn test_null_tags_make_a_dangling_record() {
        let summary: ImageSummary = serde_json::from_str(
            r#"{"Id": "sha256:dead", "RepoTags": null, "RepoDigests": null, "Created": 0, "Size": 10}"#,
        )
        .unwrap();
        let record = summary.into_record().unwrap();
        assert!(record.is_dangling());
        assert!(record.repo_digests.is_empty());
    }

    #[test]
    fn test_negative_size_is_clamped() {
        let summary: ImageSummary =
            serde_json::from_str(r#"{"Id": "sha256:a", "Created": 1, "Size": -1}"#).unwrap();
        assert_eq!(summary.into_record().unwrap().size_bytes, 0);
    }

    #[test]
    fn test_container_summary_reads_image_id() {
        let containers: Vec<ContainerSummary> = serde_json::from_str(
            r#"[{"Id": "c1", "Image": "web:v3", "ImageID": "sha256:9f1c", "State": "exited"}]"#,
        )
        .unwrap();
        assert_eq!(containers[0].image_id, "sha256:9f1c");
    }

    #[test]
    fn test_inspect_references_are_limited_to_the_snapshot() {
        let inspect: ImageInspect = serde_json::from_str(
            r#"{
                "Id": "sha256:ee",
                "RepoTags": ["web:old", "api:old", "prod:release"],
                "RepoDigests": ["web@sha256:aaaa", "prod@sha256:bbbb"]
            }"#,
        )
        .unwrap();
        let snapshot = ImageRecord::new("sha256:ee", Utc.timestamp_opt(0, 0).unwrap(), 1)
            .with_tag("web:old")
            .with_tag("api:old")
            .with_digest("web@sha256:aaaa");

        assert_eq!(
            inspect.references_in(&snapshot),
            vec!["web:old", "api:old", "web@sha256:aaaa"]
        );
    }

    #[test]
    fn test_inspect_of_dangling_image_yields_snapshot_digests() {
        let inspect: ImageInspect = serde_json::from_str(
            r#"{"Id": "sha256:dd", "RepoTags": [], "RepoDigests": ["web@sha256:cccc", "api@sha256:cccc"]}"#,
        )
        .unwrap();
        let snapshot = ImageRecord::new("sha256:dd", Utc.timestamp_opt(0, 0).unwrap(), 1)
            .with_digest("web@sha256:cccc")
            .with_digest("api@sha256:cccc");

        assert_eq!(
            inspect.references_in(&snapshot),
            vec!["web@sha256:cccc", "api@sha256:cccc"]
        );
    }

    #[test]
    fn test_filters_serialize_as_docker_expects() {
        assert_eq!(
            serde_json::to_string(&ImageFilters::reference("org/web")).unwrap(),
            r#"{"reference":["org/web"]}"#
        );
        assert_eq!(
            serde_json::to_string(&ImageFilters::dangling()).unwrap(),
            r#"{"dangling":["true"]}"#
        );
    }
}
