//! Image records, inventories and usage sets.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// Content-derived image identifier (for Docker, `sha256:<hex>`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(String);

impl ImageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form used in human output: 12 hex characters without the algorithm.
    pub fn short(&self) -> &str {
        let hex = self.0.split_once(':').map_or(self.0.as_str(), |(_, hex)| hex);
        hex.get(..12).unwrap_or(hex)
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ImageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Returns the repository part of a `repository:label` tag.
///
/// The label separator is the last `:` after the last `/`, so registry ports
/// stay part of the repository: `localhost:5000/app:v1` -> `localhost:5000/app`.
pub fn tag_repository(tag: &str) -> &str {
    let name_start = tag.rfind('/').map_or(0, |slash| slash + 1);
    match tag[name_start..].rfind(':') {
        Some(colon) => &tag[..name_start + colon],
        None => tag,
    }
}

/// Returns the repository part of a `repository@sha256:...` digest reference.
pub fn digest_repository(digest: &str) -> Option<&str> {
    digest
        .split_once('@')
        .map(|(repository, _)| repository)
        .filter(|repository| !repository.is_empty())
}

/// Checks that a name can be used as a cleanup target.
pub fn validate_repository(name: &str) -> Result<(), PolicyError> {
    let invalid = |reason| PolicyError::InvalidRepository {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("repository name is empty"));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(invalid("repository name contains whitespace"));
    }
    if name.contains('@') {
        return Err(invalid("pass the repository without a digest"));
    }
    if tag_repository(name) != name {
        return Err(invalid("pass the repository without a tag"));
    }
    if name.ends_with('/') {
        return Err(invalid("repository name ends with '/'"));
    }
    Ok(())
}

/// A single image as seen by the store at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: ImageId,
    /// `repository:label` references; empty for dangling images.
    pub tags: BTreeSet<String>,
    /// `repository@digest` references, used to attribute dangling images.
    pub repo_digests: BTreeSet<String>,
    pub created: DateTime<Utc>,
    pub size_bytes: u64,
}

impl ImageRecord {
    pub fn new(id: impl Into<ImageId>, created: DateTime<Utc>, size_bytes: u64) -> Self {
        Self {
            id: id.into(),
            tags: BTreeSet::new(),
            repo_digests: BTreeSet::new(),
            created,
            size_bytes,
        }
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    #[must_use]
    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.repo_digests.insert(digest.into());
        self
    }

    pub fn is_dangling(&self) -> bool {
        self.tags.is_empty()
    }

    /// Repositories this image is listed under.
    ///
    /// Tagged images belong to the repositories of their tags. Dangling images
    /// belong to the repositories named by their digests.
    pub fn repositories(&self) -> BTreeSet<&str> {
        if self.is_dangling() {
            self.repo_digests
                .iter()
                .filter_map(|digest| digest_repository(digest))
                .collect()
        } else {
            self.tags.iter().map(|tag| tag_repository(tag)).collect()
        }
    }

    pub fn belongs_to(&self, repository: &str) -> bool {
        self.repositories().contains(repository)
    }

    /// Orders newest first, ties broken by ascending id.
    pub fn newest_first(a: &ImageRecord, b: &ImageRecord) -> std::cmp::Ordering {
        b.created.cmp(&a.created).then_with(|| a.id.cmp(&b.id))
    }
}

/// Merged image inventory for the repositories requested in one run.
///
/// Each image id appears once; an id listed under several repositories keeps
/// the union of its references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    repositories: BTreeSet<String>,
    images: BTreeMap<ImageId, ImageRecord>,
}

impl Inventory {
    pub fn new<I, S>(repositories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            repositories: repositories.into_iter().map(Into::into).collect(),
            images: BTreeMap::new(),
        }
    }

    /// Adds a record, merging references when the id is already present.
    pub fn insert(&mut self, record: ImageRecord) {
        match self.images.get_mut(&record.id) {
            Some(existing) => {
                existing.tags.extend(record.tags);
                existing.repo_digests.extend(record.repo_digests);
            }
            None => {
                self.images.insert(record.id.clone(), record);
            }
        }
    }

    pub fn repositories(&self) -> impl Iterator<Item = &str> {
        self.repositories.iter().map(String::as_str)
    }

    /// All records, ordered by id.
    pub fn images(&self) -> impl Iterator<Item = &ImageRecord> {
        self.images.values()
    }

    pub fn get(&self, id: &ImageId) -> Option<&ImageRecord> {
        self.images.get(id)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Records listed under `repository`, newest first.
    pub fn members(&self, repository: &str) -> Vec<&ImageRecord> {
        let mut members: Vec<&ImageRecord> = self
            .images
            .values()
            .filter(|record| record.belongs_to(repository))
            .collect();
        members.sort_by(|a, b| ImageRecord::newest_first(a, b));
        members
    }
}

impl Extend<ImageRecord> for Inventory {
    fn extend<T: IntoIterator<Item = ImageRecord>>(&mut self, iter: T) {
        for record in iter {
            self.insert(record);
        }
    }
}

/// Image ids referenced by any container at snapshot time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageSet(BTreeSet<ImageId>);

impl UsageSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ImageId) -> bool {
        self.0.insert(id)
    }

    pub fn contains(&self, id: &ImageId) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImageId> {
        self.0.iter()
    }
}

impl FromIterator<ImageId> for UsageSet {
    fn from_iter<T: IntoIterator<Item = ImageId>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
