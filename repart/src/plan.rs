//! Rendered runbook: every statement of every phase, for review before
//! anything runs.

use serde::Serialize;
use sqlx::PgPool;

use crate::config::MigrationConfig;
use crate::error::Result;
use crate::{cutover, inspect, prepare, validate, verify};

/// One executable statement with its operator-facing description.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedStep {
    pub description: String,
    pub sql: String,
}

impl PlannedStep {
    pub fn new(description: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            sql: sql.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PhasePlan {
    pub name: &'static str,
    /// Whether the phase runs inside a single transaction. The prepare
    /// phase must not: `CREATE INDEX CONCURRENTLY` refuses transaction
    /// blocks.
    pub transactional: bool,
    pub steps: Vec<PlannedStep>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationPlan {
    pub phases: Vec<PhasePlan>,
}

impl MigrationPlan {
    pub fn render(&self) -> String {
        let mut out = String::new();

        for phase in &self.phases {
            let mode = if phase.transactional {
                "single transaction"
            } else {
                "autocommit"
            };
            out.push_str(&format!("-- phase: {} ({mode})\n", phase.name));

            for step in &phase.steps {
                out.push_str(&format!("-- {}\n{};\n", step.description, step.sql));
            }
            out.push('\n');
        }

        out
    }
}

/// Build the full plan from a read-only inspection of the live table.
pub async fn build(pool: &PgPool, config: &MigrationConfig) -> Result<MigrationPlan> {
    config.validate()?;

    let info = inspect::table_info(pool, &config.table_ref()).await?;
    info.ensure_timestamp_column(&config.partition_column)?;

    Ok(MigrationPlan {
        phases: vec![
            PhasePlan {
                name: "prepare",
                transactional: false,
                steps: prepare::statements(config),
            },
            PhasePlan {
                name: "validate",
                transactional: false,
                steps: validate::statements(config),
            },
            PhasePlan {
                name: "cutover",
                transactional: true,
                steps: cutover::statements(config, &info)?,
            },
            PhasePlan {
                name: "verify",
                transactional: false,
                steps: verify::statements(config),
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_phase_headers_and_terminators() {
        let plan = MigrationPlan {
            phases: vec![PhasePlan {
                name: "cutover",
                transactional: true,
                steps: vec![PlannedStep::new("do the thing", "SELECT 1")],
            }],
        };

        let rendered = plan.render();
        assert!(rendered.contains("-- phase: cutover (single transaction)"));
        assert!(rendered.contains("-- do the thing\nSELECT 1;\n"));
    }
}
