//! Applies a retention plan to an image store.
//!
//! Entries are processed one at a time in plan order. A failed tag removal or
//! deletion is recorded in the report and the run moves on; only the read
//! phase is allowed to abort a run.

use imgreap_retention::{Decision, ImageRecord, Plan};
use imgreap_store::{ImageStore, StoreError};
use tracing::{info, warn};

use crate::output::format_bytes;
use crate::report::{Failure, FailureKind, RunReport};

/// Result of a single mutation after classification.
enum Outcome {
    Done,
    InUse,
    Gone,
    Failed(StoreError),
}

impl From<Result<(), StoreError>> for Outcome {
    fn from(result: Result<(), StoreError>) -> Self {
        match result {
            Ok(()) => Self::Done,
            Err(e) if e.is_in_use() => Self::InUse,
            Err(e) if e.is_not_found() => Self::Gone,
            Err(e) => Self::Failed(e),
        }
    }
}

/// Executes plans against `store`. In dry-run mode no mutating call is made.
pub struct Executor<'a, S: ImageStore + ?Sized> {
    store: &'a S,
    dry_run: bool,
}

impl<'a, S: ImageStore + ?Sized> Executor<'a, S> {
    pub fn new(store: &'a S, dry_run: bool) -> Self {
        Self { store, dry_run }
    }

    /// Applies every decision of `plan`, accumulating counters in `report`.
    pub async fn apply(&self, plan: &Plan, report: &mut RunReport) {
        for entry in plan.iter() {
            match &entry.decision {
                Decision::KeepWhole => report.kept += 1,
                Decision::UntagPartial { tags } => self.untag(&entry.image, tags, report).await,
                Decision::DeleteWhole => self.delete(&entry.image, report).await,
            }
        }

        let human = format_bytes(report.reclaimed_bytes);
        if self.dry_run {
            info!(bytes = report.reclaimed_bytes, "Total space that would be saved: {human}");
        } else {
            info!(bytes = report.reclaimed_bytes, "Total space saved: {human}");
        }
    }

    async fn untag(&self, image: &ImageRecord, tags: &[String], report: &mut RunReport) {
        let mut removed = 0;

        for tag in tags {
            report.actions += 1;

            if self.dry_run {
                info!(image_id = %image.id.short(), tag = %tag, "Would remove tag");
                removed += 1;
                continue;
            }

            match Outcome::from(self.store.remove_tag(tag).await) {
                Outcome::Done => {
                    info!(image_id = %image.id.short(), tag = %tag, "Untagged image");
                    removed += 1;
                }
                Outcome::InUse => {
                    warn!(image_id = %image.id.short(), tag = %tag, "Skipped tag of image in use");
                    report.skipped_in_use += 1;
                }
                Outcome::Gone => {
                    info!(image_id = %image.id.short(), tag = %tag, "Tag already removed");
                    report.already_removed += 1;
                }
                Outcome::Failed(e) => {
                    warn!(
                        image_id = %image.id.short(),
                        tag = %tag,
                        reason = e.reason_code(),
                        error = %e,
                        "Failed to remove tag"
                    );
                    report.record_failure(Failure {
                        kind: FailureKind::TagRemovalFailed,
                        image_id: image.id.clone(),
                        reference: Some(tag.clone()),
                        cause: e.to_string(),
                    });
                }
            }
        }

        report.tags_removed += removed;
        if removed > 0 {
            report.untagged += 1;
        }
    }

    async fn delete(&self, image: &ImageRecord, report: &mut RunReport) {
        report.actions += 1;
        let size = format_bytes(image.size_bytes);

        if self.dry_run {
            info!(image_id = %image.id.short(), tags = ?image.tags, size = %size, "Would remove image");
            report.deleted += 1;
            report.reclaimed_bytes += image.size_bytes;
            return;
        }

        match Outcome::from(self.store.delete_image(image).await) {
            Outcome::Done => {
                info!(image_id = %image.id.short(), tags = ?image.tags, size = %size, "Removed image");
                report.deleted += 1;
                report.reclaimed_bytes += image.size_bytes;
            }
            Outcome::InUse => {
                warn!(image_id = %image.id.short(), "Skipped image in use");
                report.skipped_in_use += 1;
            }
            Outcome::Gone => {
                info!(image_id = %image.id.short(), "Image already removed");
                report.already_removed += 1;
            }
            Outcome::Failed(e) => {
                warn!(
                    image_id = %image.id.short(),
                    reason = e.reason_code(),
                    error = %e,
                    "Failed to remove image"
                );
                report.record_failure(Failure {
                    kind: FailureKind::DeletionFailed,
                    image_id: image.id.clone(),
                    reference: None,
                    cause: e.to_string(),
                });
            }
        }
    }
}
