//! Phase 5: post-migration verification.
//!
//! Three checks, all read-only: the planner prunes down to a single
//! partition for an in-range probe, no invalid index survived the
//! migration, and the row count across all partitions matches the count
//! captured during prepare.

use chrono::Months;
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{debug, info, warn};

use crate::config::MigrationConfig;
use crate::error::{Error, Result};
use crate::inspect;
use crate::plan::PlannedStep;
use repart_sql::{ddl, PartitionBounds};

/// Relations and indexes mentioned by an execution plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlanSummary {
    pub relations: Vec<String>,
    pub indexes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    /// Relations the probe plan scans; pruning worked when this is exactly
    /// the attached partition.
    pub scanned_relations: Vec<String>,
    pub pruning_ok: bool,
    pub indexes_used: Vec<String>,
    pub invalid_indexes: Vec<String>,
    pub row_count: i64,
    pub expected_rows: Option<i64>,
    pub row_count_ok: bool,
}

impl VerifyReport {
    pub fn passed(&self) -> bool {
        self.pruning_ok && self.invalid_indexes.is_empty() && self.row_count_ok
    }

    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        lines.push(if self.pruning_ok {
            format!("pruning: ok (scanned {})", self.scanned_relations.join(", "))
        } else {
            format!(
                "pruning: FAILED (scanned {} relations: {})",
                self.scanned_relations.len(),
                self.scanned_relations.join(", ")
            )
        });

        lines.push(if self.invalid_indexes.is_empty() {
            "invalid indexes: none".to_owned()
        } else {
            format!("invalid indexes: {}", self.invalid_indexes.join(", "))
        });

        lines.push(match self.expected_rows {
            Some(expected) if self.row_count_ok => {
                format!("row count: {} (matches expected {expected})", self.row_count)
            }
            Some(expected) => format!(
                "row count: MISMATCH ({} counted, {expected} expected)",
                self.row_count
            ),
            None => format!("row count: {} (no expectation given)", self.row_count),
        });

        lines.join("\n")
    }
}

/// The probe window: one month from the partition's lower bound, clamped to
/// its upper bound. Small enough that a pruned plan must land in a single
/// partition.
pub fn probe_bounds(config: &MigrationConfig) -> PartitionBounds {
    let upper = config
        .lower
        .checked_add_months(Months::new(1))
        .map(|candidate| candidate.min(config.upper))
        .unwrap_or(config.upper);

    PartitionBounds::new(config.lower, upper)
}

pub fn statements(config: &MigrationConfig) -> Vec<PlannedStep> {
    let table = config.table_ref();

    vec![
        PlannedStep::new(
            "probe plan must scan exactly one partition",
            ddl::explain_pruning_probe(&table, &config.partition_column, &probe_bounds(config)),
        ),
        PlannedStep::new(
            "no invalid index may survive on the parent or its partitions",
            repart_sql::catalog::INVALID_INDEXES.to_owned(),
        ),
        PlannedStep::new(
            "row count across all partitions must match the prepare-phase count",
            ddl::count_rows(&table),
        ),
    ]
}

/// Walk an `EXPLAIN (FORMAT JSON)` tree collecting relation and index names.
pub fn analyze_plan(explain: &Value) -> Result<PlanSummary> {
    let root = explain
        .as_array()
        .and_then(|plans| plans.first())
        .and_then(|entry| entry.get("Plan"))
        .ok_or_else(|| Error::UnexpectedPlan(explain.to_string()))?;

    let mut summary = PlanSummary::default();
    walk(root, &mut summary);
    Ok(summary)
}

fn walk(node: &Value, summary: &mut PlanSummary) {
    if let Some(relation) = node.get("Relation Name").and_then(Value::as_str) {
        if !summary.relations.iter().any(|r| r == relation) {
            summary.relations.push(relation.to_owned());
        }
    }

    if let Some(index) = node.get("Index Name").and_then(Value::as_str) {
        if !summary.indexes.iter().any(|i| i == index) {
            summary.indexes.push(index.to_owned());
        }
    }

    if let Some(children) = node.get("Plans").and_then(Value::as_array) {
        for child in children {
            walk(child, summary);
        }
    }
}

pub async fn run(
    pool: &PgPool,
    config: &MigrationConfig,
    expected_rows: Option<i64>,
) -> Result<VerifyReport> {
    config.validate()?;

    let table = config.table_ref();
    let info = inspect::table_info(pool, &table).await?;

    let probe = ddl::explain_pruning_probe(&table, &config.partition_column, &probe_bounds(config));
    debug!(sql = %probe);
    let (plan,): (Value,) = sqlx::query_as(&probe).fetch_one(pool).await?;
    let summary = analyze_plan(&plan)?;
    let pruning_ok = summary.relations.len() == 1;

    if pruning_ok {
        info!(relation = %summary.relations[0], "probe plan pruned to a single partition");
    } else {
        warn!(
            relations = summary.relations.len(),
            "probe plan was not pruned to a single partition"
        );
    }

    let invalid: Vec<String> = inspect::invalid_indexes(pool, info.oid)
        .await?
        .into_iter()
        .map(|row| format!("{}.{}", row.table_name, row.index_name))
        .collect();

    let row_count = inspect::count_rows(pool, &table).await?;
    let row_count_ok = expected_rows.map_or(true, |expected| expected == row_count);

    let report = VerifyReport {
        scanned_relations: summary.relations,
        pruning_ok,
        indexes_used: summary.indexes,
        invalid_indexes: invalid,
        row_count,
        expected_rows,
        row_count_ok,
    };

    info!(passed = report.passed(), "verification finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_timestamp;
    use serde_json::json;

    fn config() -> MigrationConfig {
        MigrationConfig::new(
            "transaction",
            parse_timestamp("2020-01-01").unwrap(),
            parse_timestamp("2024-01-01").unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn probe_window_is_one_month_clamped() {
        let probe = probe_bounds(&config());
        assert_eq!(probe.lower_literal(), "2020-01-01 00:00:00");
        assert_eq!(probe.upper_literal(), "2020-02-01 00:00:00");

        let narrow = MigrationConfig::new(
            "transaction",
            parse_timestamp("2020-01-01").unwrap(),
            parse_timestamp("2020-01-15").unwrap(),
        )
        .unwrap();
        assert_eq!(probe_bounds(&narrow).upper_literal(), "2020-01-15 00:00:00");
    }

    #[test]
    fn pruned_plan_reports_one_relation() {
        let plan = json!([{
            "Plan": {
                "Node Type": "Index Scan",
                "Relation Name": "transaction_old",
                "Index Name": "transaction_old_pkey",
                "Plans": []
            }
        }]);

        let summary = analyze_plan(&plan).unwrap();
        assert_eq!(summary.relations, vec!["transaction_old"]);
        assert_eq!(summary.indexes, vec!["transaction_old_pkey"]);
    }

    #[test]
    fn unpruned_append_reports_every_partition() {
        let plan = json!([{
            "Plan": {
                "Node Type": "Append",
                "Plans": [
                    {"Node Type": "Seq Scan", "Relation Name": "transaction_old"},
                    {"Node Type": "Seq Scan", "Relation Name": "transaction_2024"},
                ]
            }
        }]);

        let summary = analyze_plan(&plan).unwrap();
        assert_eq!(
            summary.relations,
            vec!["transaction_old", "transaction_2024"]
        );
    }

    #[test]
    fn gather_nodes_are_walked_through() {
        let plan = json!([{
            "Plan": {
                "Node Type": "Gather",
                "Plans": [{
                    "Node Type": "Parallel Seq Scan",
                    "Relation Name": "transaction_old",
                    "Plans": []
                }]
            }
        }]);

        let summary = analyze_plan(&plan).unwrap();
        assert_eq!(summary.relations, vec!["transaction_old"]);
    }

    #[test]
    fn rejects_unexpected_explain_shape() {
        assert!(analyze_plan(&json!({"not": "a plan"})).is_err());
        assert!(analyze_plan(&json!([])).is_err());
    }

    #[test]
    fn report_passes_only_when_all_checks_pass() {
        let mut report = VerifyReport {
            scanned_relations: vec!["transaction_old".into()],
            pruning_ok: true,
            indexes_used: vec![],
            invalid_indexes: vec![],
            row_count: 100,
            expected_rows: Some(100),
            row_count_ok: true,
        };
        assert!(report.passed());

        report.invalid_indexes.push("public.broken_idx".into());
        assert!(!report.passed());

        report.invalid_indexes.clear();
        report.row_count_ok = false;
        assert!(!report.passed());
        assert!(report.summary().contains("MISMATCH"));
    }
}
