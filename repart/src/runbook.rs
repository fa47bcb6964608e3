//! The full runbook, phase by phase, with the gates between them.

use serde::Serialize;
use sqlx::PgPool;
use tracing::info;

use crate::config::MigrationConfig;
use crate::cutover::{self, CutoverReport};
use crate::error::{Error, Result};
use crate::prepare::{self, PrepareReport};
use crate::validate;
use crate::verify::{self, VerifyReport};

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub prepare: PrepareReport,
    pub cutover: CutoverReport,
    /// Absent on a dry run; there is no partitioned table to probe.
    pub verify: Option<VerifyReport>,
}

/// Run every phase in order. Each phase re-reads the catalog, so a failure
/// leaves the database in a state any individual phase command can resume
/// from.
pub async fn run_all(pool: &PgPool, config: &MigrationConfig) -> Result<RunReport> {
    info!(table = %config.table_ref(), "phase 1/5: prepare");
    let prepare = prepare::run(pool, config).await?;

    info!(table = %config.table_ref(), "phase 2/5: validate");
    validate::run(pool, config).await?;

    info!(table = %config.table_ref(), "phases 3-4/5: cutover");
    let cutover = cutover::run(pool, config).await?;

    if config.dry_run {
        info!("dry run: skipping verification");
        return Ok(RunReport {
            prepare,
            cutover,
            verify: None,
        });
    }

    info!(table = %config.table_ref(), "phase 5/5: verify");
    let verify = verify::run(pool, config, Some(prepare.row_count)).await?;

    if !verify.passed() {
        return Err(Error::Verification(verify.summary()));
    }

    Ok(RunReport {
        prepare,
        cutover,
        verify: Some(verify),
    })
}
