//! SQL surface for the repart partition migration tool.
//!
//! This crate owns everything that renders to SQL text or reads back from the
//! PostgreSQL system catalogs:
//!
//! - [`ident`] - identifier and literal quoting, plus [`TableRef`] for
//!   schema-qualified table names
//! - [`bounds`] - [`PartitionBounds`], the single source of truth for the
//!   half-open partition range and its canonical literal rendering
//! - [`ddl`] - one function per runbook statement (concurrent index build,
//!   `NOT VALID` check constraint, cutover DDL, `ATTACH PARTITION`, ...)
//! - [`catalog`] - introspection query text and `FromRow` row types for
//!   `pg_class`, `pg_index`, `pg_constraint`, `pg_trigger` and `pg_inherits`
//!
//! Statements that name tables or columns interpolate quoted identifiers into
//! the SQL text; bound literals for the partition range are always rendered
//! through [`PartitionBounds`] so the `CHECK` expression and the
//! `ATTACH PARTITION` clause can never drift apart. A drift between the two
//! downgrades the attach from a metadata-only operation into a full
//! validating scan under `ACCESS EXCLUSIVE`, which is the failure mode this
//! tool exists to rule out.

pub mod bounds;
pub mod catalog;
pub mod ddl;
pub mod ident;

pub use bounds::PartitionBounds;
pub use ident::TableRef;
