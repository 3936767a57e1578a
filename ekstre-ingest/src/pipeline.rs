//! One extraction run end to end: retrieve, parse, reconcile.

use chrono::{DateTime, Utc};

use ekstre_core::{reconcile, Obligation, ReconcileConfig, RunReport};

use crate::processor::{run, BankConfig, MessageSource, ProcessorConfig, RetrievalFailure};

/// Result of [`refresh`]: the new list plus the retrievals that failed.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshOutcome {
    pub report: RunReport,
    pub failures: Vec<RetrievalFailure>,
}

/// Pull fresh candidates from `source` and merge them into `prior`.
///
/// Nothing is stored; the caller persists `report.obligations`.
pub async fn refresh(
    source: &dyn MessageSource,
    banks: &[BankConfig],
    processor: &ProcessorConfig,
    prior: &[Obligation],
    reconcile_cfg: &ReconcileConfig,
    now: DateTime<Utc>,
) -> RefreshOutcome {
    let batch = run(source, banks, processor, now).await;
    let report = reconcile(batch.statements, &batch.loans, prior, reconcile_cfg);
    RefreshOutcome {
        report,
        failures: batch.failures,
    }
}
