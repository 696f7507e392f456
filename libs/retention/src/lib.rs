//! # imgreap-retention
//!
//! Decides which images of a local image store survive a cleanup run.
//!
//! ## Model
//!
//! - [`ImageRecord`]: one image id with its tags, digests, creation time and size
//! - [`Inventory`]: the merged records of every requested repository
//! - [`UsageSet`]: image ids referenced by any container, running or not
//! - [`RetentionPolicy`]: `num_recent` / `min_age_days` keep predicates
//!
//! ## Invariants
//!
//! - Planning is a pure function of (inventory, usage, policy, now)
//! - Every record receives exactly one [`Decision`]
//! - An image referenced by a container is never deleted or untagged
//! - Keep predicates combine as a union: recent OR young OR in use
//! - Tag collapsing is evaluated across all requested repositories at once,
//!   so an image still kept under a sibling repository is only untagged

mod engine;
mod error;
mod image;
mod policy;

pub use engine::{Decision, KeepReason, Plan, PlanSummary, PlannedImage, RetentionEngine};
pub use error::PolicyError;
pub use image::{
    digest_repository, tag_repository, validate_repository, ImageId, ImageRecord, Inventory,
    UsageSet,
};
pub use policy::RetentionPolicy;
