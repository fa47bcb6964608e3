//! Phase 1: non-blocking constraint preparation.
//!
//! Builds the widened unique index with `CONCURRENTLY` and registers the
//! range check `NOT VALID`. Neither takes a long-held exclusive lock, so
//! this phase can run at any time of day; it just has to finish - and be
//! re-checked against the catalog - before cutover.

use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::config::MigrationConfig;
use crate::error::{Error, Result};
use crate::plan::PlannedStep;
use crate::preflight::{self, CheckState, IndexState};
use crate::inspect;
use repart_sql::ddl;

#[derive(Debug, Clone, Serialize)]
pub struct PrepareReport {
    /// Exact pre-migration row count, the anchor for the post-migration
    /// no-data-loss check.
    pub row_count: i64,
    pub created_index: bool,
    pub created_check: bool,
}

pub fn statements(config: &MigrationConfig) -> Vec<PlannedStep> {
    let table = config.table_ref();
    let bounds = config.bounds();

    vec![
        PlannedStep::new(
            "build the widened unique key without blocking writers; \
             a failed build leaves an INVALID index that must be dropped",
            ddl::create_unique_index_concurrently(
                &table,
                &config.unique_index_name(),
                &[&config.id_column, &config.partition_column],
            ),
        ),
        PlannedStep::new(
            "register the partition range check without scanning existing rows",
            ddl::add_range_check_not_valid(
                &table,
                &config.check_constraint_name(),
                &config.partition_column,
                &bounds,
            ),
        ),
    ]
}

pub async fn run(pool: &PgPool, config: &MigrationConfig) -> Result<PrepareReport> {
    config.validate()?;

    let table = config.table_ref();
    let info = inspect::table_info(pool, &table).await?;
    info.ensure_timestamp_column(&config.partition_column)?;

    if info.column(&config.id_column).is_none() {
        return Err(Error::ColumnNotFound {
            table: table.clone(),
            column: config.id_column.clone(),
        });
    }

    let row_count = inspect::count_rows(pool, &table).await?;
    info!(table = %table, rows = row_count, "captured pre-migration row count");

    let index_name = config.unique_index_name();
    let mut created_index = false;

    match preflight::index_state(&info, &index_name) {
        IndexState::Valid => {
            info!(index = %index_name, "unique index already valid, skipping build");
        }
        IndexState::Invalid => {
            return Err(Error::InvalidIndex {
                table: table.clone(),
                index: index_name,
            });
        }
        IndexState::Missing => {
            let sql = ddl::create_unique_index_concurrently(
                &table,
                &index_name,
                &[&config.id_column, &config.partition_column],
            );

            if config.dry_run {
                info!(%sql, "dry-run: skipping index build");
            } else {
                info!(index = %index_name, "building unique index concurrently");
                debug!(%sql);

                // CONCURRENTLY refuses transaction blocks; run on a plain
                // pool connection in autocommit.
                let mut conn = pool.acquire().await?;
                sqlx::query(&sql).execute(&mut *conn).await?;
                created_index = true;

                // The build can die without this session seeing an error
                // (e.g. a deadlock against it); only the catalog knows.
                let after = inspect::table_info(pool, &table).await?;
                if preflight::index_state(&after, &index_name) != IndexState::Valid {
                    return Err(Error::InvalidIndex {
                        table: table.clone(),
                        index: index_name,
                    });
                }
                info!(index = %index_name, "unique index built and valid");
            }
        }
    }

    let constraint_name = config.check_constraint_name();
    let mut created_check = false;

    match preflight::check_state(&info, &constraint_name) {
        CheckState::Validated | CheckState::NotValid => {
            // Already present from an earlier run; make sure its bounds are
            // the ones this migration was configured with.
            preflight::ensure_bounds_match(&info, config)?;
            info!(constraint = %constraint_name, "range check already registered");
        }
        CheckState::Missing => {
            let sql = ddl::add_range_check_not_valid(
                &table,
                &constraint_name,
                &config.partition_column,
                &config.bounds(),
            );

            if config.dry_run {
                info!(%sql, "dry-run: skipping check constraint");
            } else {
                info!(constraint = %constraint_name, "registering range check NOT VALID");
                debug!(%sql);
                sqlx::query(&sql).execute(pool).await?;
                created_check = true;
            }
        }
    }

    Ok(PrepareReport {
        row_count,
        created_index,
        created_check,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_timestamp;

    #[test]
    fn prepare_statements_cover_both_constraints() {
        let config = MigrationConfig::new(
            "transaction",
            parse_timestamp("2020-01-01").unwrap(),
            parse_timestamp("2024-01-01").unwrap(),
        )
        .unwrap();

        let steps = statements(&config);
        assert_eq!(steps.len(), 2);
        assert!(steps[0].sql.contains("CREATE UNIQUE INDEX CONCURRENTLY"));
        assert!(steps[1].sql.ends_with("NOT VALID"));
    }
}
