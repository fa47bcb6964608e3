//! Phases 3 and 4: the cutover transaction.
//!
//! Everything here is metadata-only - catalog renames, a primary-key
//! promotion onto an already-valid index, and a bounds-proven attach - so
//! the ACCESS EXCLUSIVE window lasts seconds regardless of table size. The
//! gates in [`preflight`](crate::preflight) exist to keep it that way: the
//! one operation that could re-introduce a data scan is an attach whose
//! bounds the validated constraint does not prove.

use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::config::MigrationConfig;
use crate::error::{Error, Result};
use crate::inspect::{self, TableInfo};
use crate::plan::PlannedStep;
use crate::preflight;
use repart_sql::ddl;

#[derive(Debug, Clone, Serialize)]
pub struct CutoverReport {
    pub statements_executed: usize,
    pub triggers_rehomed: Vec<String>,
}

/// The cutover statement sequence, in execution order.
pub fn statements(config: &MigrationConfig, info: &TableInfo) -> Result<Vec<PlannedStep>> {
    let table = config.table_ref();
    let shell = config.shell_ref();
    let retired = config.retired_ref();
    let bounds = config.bounds();

    let old_pk = info
        .primary_key()
        .ok_or_else(|| Error::MissingPrimaryKey {
            table: table.clone(),
        })?;

    let mut steps = vec![PlannedStep::new(
        "bound the time this transaction may queue for locks",
        ddl::set_local_lock_timeout(&config.lock_timeout),
    )];

    if let Some(timeout) = &config.statement_timeout {
        steps.push(PlannedStep::new(
            "bound individual statement runtime",
            ddl::set_local_statement_timeout(timeout),
        ));
    }

    steps.push(PlannedStep::new(
        "create the partitioned shell from the source's columns",
        ddl::create_partitioned_shell(&shell, &table, &config.partition_column),
    ));

    steps.push(PlannedStep::new(
        "primary key widened to include the partition key",
        ddl::add_primary_key(
            &shell,
            &config.parent_pk_name(),
            &[&config.id_column, &config.partition_column],
        ),
    ));

    for index in info.secondary_indexes(&config.unique_index_name()) {
        let sql = ddl::index_on_table(&index.definition, &shell).ok_or_else(|| {
            Error::UnparsableIndex {
                index: index.name.clone(),
                definition: index.definition.clone(),
            }
        })?;
        steps.push(PlannedStep::new(
            format!("recreate secondary index {} on the parent", index.name),
            sql,
        ));
    }

    steps.push(PlannedStep::new(
        "rename the source out of the way",
        ddl::rename_table(&table, &retired.name),
    ));

    steps.push(PlannedStep::new(
        "the partitioned table takes over the source's name",
        ddl::rename_table(&shell, &table.name),
    ));

    steps.push(PlannedStep::new(
        "drop the narrow primary key",
        ddl::drop_constraint(&retired, &old_pk.name),
    ));

    steps.push(PlannedStep::new(
        "promote the prepared unique index to primary key (no scan, already valid)",
        ddl::primary_key_using_index(
            &retired,
            &config.retired_pk_name(),
            &config.unique_index_name(),
        ),
    ));

    // Triggers come off the partition before attach so the clones the parent
    // later propagates do not collide with the originals by name.
    for trigger in &info.triggers {
        steps.push(PlannedStep::new(
            format!("detach trigger {} from the retired table", trigger.name),
            ddl::drop_trigger(&retired, &trigger.name),
        ));
    }

    steps.push(PlannedStep::new(
        "attach as the first partition; metadata-only while the validated \
         check constraint proves these exact bounds",
        ddl::attach_partition(&table, &retired, &bounds),
    ));

    // The captured definitions still name the original table, which the
    // parent now owns, so they re-create against the parent verbatim.
    for trigger in &info.triggers {
        steps.push(PlannedStep::new(
            format!("re-home trigger {} onto the parent", trigger.name),
            trigger.definition.clone(),
        ));
    }

    Ok(steps)
}

pub async fn run(pool: &PgPool, config: &MigrationConfig) -> Result<CutoverReport> {
    config.validate()?;

    let table = config.table_ref();
    let info = inspect::table_info(pool, &table).await?;
    info.ensure_timestamp_column(&config.partition_column)?;
    info.ensure_not_null(&config.id_column)?;
    info.ensure_not_null(&config.partition_column)?;

    preflight::gates(&info, config).ensure_cutover_ready(&info, config)?;
    preflight::ensure_bounds_match(&info, config)?;

    for candidate in [config.retired_ref(), config.shell_ref()] {
        if inspect::table_oid(pool, &candidate).await?.is_some() {
            return Err(Error::NameTaken(candidate));
        }
    }

    let steps = statements(config, &info)?;
    let triggers_rehomed: Vec<String> = info.triggers.iter().map(|t| t.name.clone()).collect();

    if config.dry_run {
        for step in &steps {
            info!(sql = %step.sql, "dry-run: {}", step.description);
        }
        return Ok(CutoverReport {
            statements_executed: 0,
            triggers_rehomed,
        });
    }

    info!(table = %table, steps = steps.len(), "starting cutover transaction");
    let mut tx = pool.begin().await?;

    for step in &steps {
        debug!(sql = %step.sql, "{}", step.description);
        sqlx::query(&step.sql).execute(&mut *tx).await?;
    }

    tx.commit().await?;
    info!(table = %table, "cutover committed; source now attached as {}", config.retired_ref());

    Ok(CutoverReport {
        statements_executed: steps.len(),
        triggers_rehomed,
    })
}
