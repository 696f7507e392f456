//! One cleanup run: read, plan, apply.

use chrono::{DateTime, Utc};
use imgreap_retention::{Plan, RetentionEngine};
use imgreap_store::{read_inventory, read_usage, ImageStore};
use tracing::{debug, info};

use crate::config::RunConfig;
use crate::error::CliError;
use crate::executor::Executor;
use crate::report::RunReport;

/// Runs a cleanup of `config.repositories` against `store`.
///
/// The inventory is read before usage so that a container created in between
/// still protects its image. Read failures abort the run; per-item mutation
/// failures end up in the returned report.
pub async fn run<S: ImageStore + ?Sized>(
    store: &S,
    config: &RunConfig,
    now: DateTime<Utc>,
) -> Result<RunReport, CliError> {
    let inventory = read_inventory(store, &config.repositories)
        .await
        .map_err(CliError::StoreUnavailable)?;
    let usage = read_usage(store)
        .await
        .map_err(CliError::StoreUnavailable)?;

    let plan = RetentionEngine::new(config.policy).plan(&inventory, &usage, now);
    log_plan(&plan);

    let mut report = RunReport::new(config.repositories.clone(), config.dry_run);
    Executor::new(store, config.dry_run)
        .apply(&plan, &mut report)
        .await;

    Ok(report)
}

fn log_plan(plan: &Plan) {
    for entry in plan.iter() {
        debug!(
            image_id = %entry.image.id.short(),
            decision = ?entry.decision,
            kept_by = ?entry.kept_by,
            "Planned image"
        );
    }

    let summary = plan.summary();
    info!(
        images = plan.len(),
        keep = summary.keep,
        untag = summary.untag,
        delete = summary.delete,
        reclaimable_bytes = summary.reclaimable_bytes,
        "Computed retention plan"
    );
}
