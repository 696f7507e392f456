//! Retention policy.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::error::PolicyError;

/// Default number of most recent images kept per repository.
pub const DEFAULT_NUM_RECENT: usize = 5;

/// Default age, in days, under which images are always kept.
pub const DEFAULT_MIN_AGE_DAYS: u32 = 30;

/// Keep predicates applied to each requested repository.
///
/// An image survives when it satisfies either predicate: it is among the
/// `num_recent` newest images of a repository, or it is at most
/// `min_age_days` old.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetentionPolicy {
    num_recent: usize,
    min_age_days: u32,
}

impl RetentionPolicy {
    /// Builds a policy from raw user input, rejecting negative or unrepresentable values.
    pub fn new(num_recent: i64, min_age_days: i64) -> Result<Self, PolicyError> {
        let num_recent =
            usize::try_from(num_recent).map_err(|_| PolicyError::InvalidNumRecent(num_recent))?;

        let days = u32::try_from(min_age_days)
            .ok()
            .filter(|days| TimeDelta::try_days(i64::from(*days)).is_some())
            .ok_or(PolicyError::InvalidMinAgeDays(min_age_days))?;

        Ok(Self {
            num_recent,
            min_age_days: days,
        })
    }

    pub fn num_recent(&self) -> usize {
        self.num_recent
    }

    pub fn min_age_days(&self) -> u32 {
        self.min_age_days
    }

    /// Oldest creation time still protected by the age predicate.
    ///
    /// Images created at or after the cutoff have an age of at most
    /// `min_age_days`. When the subtraction leaves the representable range
    /// every image is protected.
    pub fn age_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        TimeDelta::try_days(i64::from(self.min_age_days))
            .and_then(|age| now.checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn is_young(&self, created: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        created >= self.age_cutoff(now)
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            num_recent: DEFAULT_NUM_RECENT,
            min_age_days: DEFAULT_MIN_AGE_DAYS,
        }
    }
}
