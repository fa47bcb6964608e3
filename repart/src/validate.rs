//! Phase 2: validate the range check.
//!
//! One scan under `SHARE UPDATE EXCLUSIVE`: other DDL waits, ordinary reads
//! and writes do not. Once validated, the constraint is proof enough for
//! `ATTACH PARTITION` to skip its own scan.

use sqlx::PgPool;
use tracing::{debug, info};

use crate::config::MigrationConfig;
use crate::error::{Error, Result};
use crate::inspect;
use crate::plan::PlannedStep;
use crate::preflight::{self, CheckState};
use repart_sql::ddl;

pub fn statements(config: &MigrationConfig) -> Vec<PlannedStep> {
    vec![PlannedStep::new(
        "validate the range check with a single scan; blocks DDL only",
        ddl::validate_constraint(&config.table_ref(), &config.check_constraint_name()),
    )]
}

pub async fn run(pool: &PgPool, config: &MigrationConfig) -> Result<()> {
    config.validate()?;

    let table = config.table_ref();
    let info = inspect::table_info(pool, &table).await?;
    let constraint = config.check_constraint_name();

    match preflight::check_state(&info, &constraint) {
        CheckState::Missing => Err(Error::MissingCheck {
            table,
            constraint,
        }),
        CheckState::Validated => {
            info!(constraint = %constraint, "range check already validated, nothing to do");
            Ok(())
        }
        CheckState::NotValid => {
            // Catch a misconfigured re-run before paying for the scan.
            preflight::ensure_bounds_match(&info, config)?;

            let sql = ddl::validate_constraint(&table, &constraint);
            if config.dry_run {
                info!(%sql, "dry-run: skipping validation scan");
                return Ok(());
            }

            info!(constraint = %constraint, "validating range check (single scan)");
            debug!(%sql);
            sqlx::query(&sql).execute(pool).await?;
            info!(constraint = %constraint, "range check validated");
            Ok(())
        }
    }
}
