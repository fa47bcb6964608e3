//! Online range-partition migration for live PostgreSQL tables.
//!
//! `repart` converts a large, unpartitioned table into a range-partitioned
//! one while the application keeps reading and writing it. The original
//! table is never copied: it is renamed aside and attached as the first
//! partition, so the exclusive-lock window covers only catalog renames and
//! a metadata-only `ATTACH PARTITION` - seconds, independent of table size.
//!
//! # The five phases
//!
//! 1. **prepare** - `CREATE UNIQUE INDEX CONCURRENTLY` on the widened key
//!    and a range `CHECK ... NOT VALID`; no blocking locks. Captures the
//!    row count for the final no-data-loss check.
//! 2. **validate** - `VALIDATE CONSTRAINT`, one scan that blocks only DDL.
//! 3. **cutover** - one short transaction: partitioned shell, widened
//!    primary key, secondary indexes, rename swap, primary-key promotion
//!    onto the prepared index, attach.
//! 4. **re-home** - the source's triggers move onto the partitioned parent
//!    (part of the cutover transaction).
//! 5. **verify** - the planner must prune an in-range probe down to one
//!    partition, no invalid index may remain, and row counts must match.
//!
//! # Gates
//!
//! Phases only run when the catalog says their prerequisites hold
//! ([`preflight`]): the unique index must be VALID (a failed concurrent
//! build only surfaces in `pg_index.indisvalid`), the check constraint must
//! be validated, and the check's bound literals must equal the attach
//! bounds byte for byte. The last gate is the difference between a
//! metadata-only attach and a full validating scan held under
//! ACCESS EXCLUSIVE.
//!
//! # Example
//!
//! ```rust,ignore
//! use repart::{parse_timestamp, runbook, MigrationConfig};
//!
//! let config = MigrationConfig::new(
//!     "transaction",
//!     parse_timestamp("2020-01-01")?,
//!     parse_timestamp("2024-01-01")?,
//! )?;
//!
//! let report = runbook::run_all(&pool, &config).await?;
//! assert!(report.verify.map_or(true, |v| v.passed()));
//! ```

pub mod config;
pub mod cutover;
pub mod error;
pub mod inspect;
pub mod plan;
pub mod preflight;
pub mod prepare;
pub mod runbook;
pub mod validate;
pub mod verify;

pub use config::{parse_timestamp, MigrationConfig};
pub use error::{Error, Result};
pub use plan::MigrationPlan;
pub use repart_sql::{PartitionBounds, TableRef};
