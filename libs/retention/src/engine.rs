//! Retention decisions.
//!
//! The engine ranks the members of every requested repository, computes the
//! per-repository keep sets and then collapses tags across all requested
//! repositories at once:
//!
//! ```text
//! keep(R) = recent(R, num_recent) ∪ young(min_age_days) ∪ in_use
//!
//! tag t of image i survives  <=>  repo(t) not requested  ∨  i ∈ keep(repo(t))
//!
//! no tag removable   -> KeepWhole
//! all tags removable -> DeleteWhole
//! otherwise          -> UntagPartial(removable tags)
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::image::{tag_repository, ImageId, ImageRecord, Inventory, UsageSet};
use crate::policy::RetentionPolicy;

/// What to do with one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Decision {
    /// Leave the image and all of its tags in place.
    KeepWhole,
    /// Remove only these tags; the image and its other tags stay.
    UntagPartial { tags: Vec<String> },
    /// Delete the image.
    DeleteWhole,
}

impl Decision {
    pub fn is_keep(&self) -> bool {
        matches!(self, Self::KeepWhole)
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Self::DeleteWhole)
    }

    /// Tags this decision removes from the store, if any.
    pub fn removed_tags(&self) -> &[String] {
        match self {
            Self::UntagPartial { tags } => tags,
            _ => &[],
        }
    }
}

/// Why an image was kept in at least one repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeepReason {
    /// Among the `num_recent` newest images of a repository.
    Recent,
    /// Not older than `min_age_days`.
    Young,
    /// Referenced by a container.
    InUse,
}

impl fmt::Display for KeepReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Recent => "recent",
            Self::Young => "young",
            Self::InUse => "in-use",
        })
    }
}

/// One image and the decision taken for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedImage {
    pub image: ImageRecord,
    pub decision: Decision,
    /// Reasons that kept the image in any repository; empty for deletions.
    pub kept_by: BTreeSet<KeepReason>,
}

/// Counts of a plan, grouped by decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub keep: usize,
    pub untag: usize,
    pub delete: usize,
    pub reclaimable_bytes: u64,
}

/// Decisions for a whole inventory, ordered newest first with ties broken by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Plan {
    entries: Vec<PlannedImage>,
}

impl Plan {
    pub fn entries(&self) -> &[PlannedImage] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlannedImage> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn decision(&self, id: &ImageId) -> Option<&Decision> {
        self.entries
            .iter()
            .find(|entry| &entry.image.id == id)
            .map(|entry| &entry.decision)
    }

    /// Map view keyed by image id.
    pub fn decisions(&self) -> BTreeMap<&ImageId, &Decision> {
        self.entries
            .iter()
            .map(|entry| (&entry.image.id, &entry.decision))
            .collect()
    }

    /// True when nothing would be untagged or deleted.
    pub fn is_noop(&self) -> bool {
        self.entries.iter().all(|entry| entry.decision.is_keep())
    }

    pub fn summary(&self) -> PlanSummary {
        self.entries
            .iter()
            .fold(PlanSummary::default(), |mut summary, entry| {
                match &entry.decision {
                    Decision::KeepWhole => summary.keep += 1,
                    Decision::UntagPartial { .. } => summary.untag += 1,
                    Decision::DeleteWhole => {
                        summary.delete += 1;
                        summary.reclaimable_bytes += entry.image.size_bytes;
                    }
                }
                summary
            })
    }
}

/// Computes retention plans for a fixed policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetentionEngine {
    policy: RetentionPolicy,
}

impl RetentionEngine {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Decides the fate of every image in `inventory`.
    ///
    /// `now` is the only clock input; the same arguments always produce the
    /// same plan.
    pub fn plan(&self, inventory: &Inventory, usage: &UsageSet, now: DateTime<Utc>) -> Plan {
        let mut keep_sets: BTreeMap<&str, BTreeSet<&ImageId>> = BTreeMap::new();
        let mut reasons: BTreeMap<&ImageId, BTreeSet<KeepReason>> = BTreeMap::new();

        for repository in inventory.repositories() {
            let keep = keep_sets.entry(repository).or_default();
            for (rank, record) in inventory.members(repository).into_iter().enumerate() {
                let mut why = BTreeSet::new();
                if rank < self.policy.num_recent() {
                    why.insert(KeepReason::Recent);
                }
                if self.policy.is_young(record.created, now) {
                    why.insert(KeepReason::Young);
                }
                if usage.contains(&record.id) {
                    why.insert(KeepReason::InUse);
                }
                if !why.is_empty() {
                    keep.insert(&record.id);
                    reasons.entry(&record.id).or_default().extend(why);
                }
            }
        }

        let mut ordered: Vec<&ImageRecord> = inventory.images().collect();
        ordered.sort_by(|a, b| ImageRecord::newest_first(a, b));

        let entries = ordered
            .into_iter()
            .map(|record| {
                let mut kept_by = reasons.remove(&record.id).unwrap_or_default();
                if usage.contains(&record.id) {
                    kept_by.insert(KeepReason::InUse);
                }
                PlannedImage {
                    image: record.clone(),
                    decision: decide(record, usage, &keep_sets),
                    kept_by,
                }
            })
            .collect();

        Plan { entries }
    }
}

fn decide(
    record: &ImageRecord,
    usage: &UsageSet,
    keep_sets: &BTreeMap<&str, BTreeSet<&ImageId>>,
) -> Decision {
    if usage.contains(&record.id) {
        return Decision::KeepWhole;
    }

    // Only repositories requested in this run have a keep set; anything else
    // is left untouched.
    let removable_in = |repository: &str| {
        keep_sets
            .get(repository)
            .is_some_and(|keep| !keep.contains(&record.id))
    };

    if record.is_dangling() {
        let repositories: Vec<&str> = record
            .repositories()
            .into_iter()
            .filter(|repository| keep_sets.contains_key(repository))
            .collect();
        let removable = !repositories.is_empty()
            && repositories
                .iter()
                .all(|&repository| removable_in(repository));
        return if removable {
            Decision::DeleteWhole
        } else {
            Decision::KeepWhole
        };
    }

    let removable: Vec<String> = record
        .tags
        .iter()
        .filter(|tag| removable_in(tag_repository(tag)))
        .cloned()
        .collect();

    if removable.is_empty() {
        Decision::KeepWhole
    } else if removable.len() == record.tags.len() {
        Decision::DeleteWhole
    } else {
        Decision::UntagPartial { tags: removable }
    }
}
