//! Catalog introspection queries and their row types.
//!
//! Query text lives here, execution lives in the core crate. All queries
//! bind the table OID (or schema/name pair) and read back through
//! `sqlx::FromRow` structs.

use serde::Serialize;
use sqlx::postgres::types::Oid;

/// Resolve a table's OID from its schema-qualified name.
pub const TABLE_OID: &str = "\
SELECT c.oid
FROM pg_class c
JOIN pg_namespace n ON n.oid = c.relnamespace
WHERE n.nspname = $1 AND c.relname = $2 AND c.relkind IN ('r', 'p')";

/// Ordinary columns in attribute order, for shell-table sanity checks.
pub const COLUMNS: &str = "\
SELECT a.attname AS name,
       format_type(a.atttypid, a.atttypmod) AS data_type,
       a.attnotnull AS not_null
FROM pg_attribute a
WHERE a.attrelid = $1 AND a.attnum > 0 AND NOT a.attisdropped
ORDER BY a.attnum";

/// Every index on a table, with validity. `indisvalid = false` is how a
/// failed concurrent build shows up; nothing else reports it.
pub const INDEXES: &str = "\
SELECT ci.relname AS name,
       i.indisvalid AS is_valid,
       i.indisprimary AS is_primary,
       i.indisunique AS is_unique,
       pg_get_indexdef(i.indexrelid) AS definition
FROM pg_index i
JOIN pg_class ci ON ci.oid = i.indexrelid
WHERE i.indrelid = $1
ORDER BY ci.relname";

/// Table constraints with their validation state and normalized definition.
pub const CONSTRAINTS: &str = "\
SELECT con.conname AS name,
       con.contype::text AS kind,
       con.convalidated AS is_validated,
       pg_get_constraintdef(con.oid) AS definition
FROM pg_constraint con
WHERE con.conrelid = $1
ORDER BY con.conname";

/// User-defined triggers with their full `CREATE TRIGGER` rendering.
pub const TRIGGERS: &str = "\
SELECT t.tgname AS name,
       pg_get_triggerdef(t.oid) AS definition
FROM pg_trigger t
WHERE t.tgrelid = $1 AND NOT t.tgisinternal
ORDER BY t.tgname";

/// Partitions of a partitioned parent, with their attach bounds.
pub const PARTITIONS: &str = "\
SELECT c.relname AS name,
       pg_get_expr(c.relpartbound, c.oid) AS bounds
FROM pg_inherits h
JOIN pg_class c ON c.oid = h.inhrelid
WHERE h.inhparent = $1
ORDER BY c.relname";

/// Invalid indexes on a table or any of its partitions.
pub const INVALID_INDEXES: &str = "\
SELECT t.relname AS table_name,
       ci.relname AS index_name
FROM pg_index i
JOIN pg_class ci ON ci.oid = i.indexrelid
JOIN pg_class t ON t.oid = i.indrelid
WHERE NOT i.indisvalid
  AND (i.indrelid = $1
       OR i.indrelid IN (SELECT h.inhrelid FROM pg_inherits h WHERE h.inhparent = $1))
ORDER BY t.relname, ci.relname";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OidRow {
    pub oid: Oid,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ColumnRow {
    pub name: String,
    pub data_type: String,
    pub not_null: bool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct IndexRow {
    pub name: String,
    pub is_valid: bool,
    pub is_primary: bool,
    pub is_unique: bool,
    pub definition: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ConstraintRow {
    pub name: String,
    /// `pg_constraint.contype`: `p` primary key, `c` check, `u` unique, ...
    pub kind: String,
    pub is_validated: bool,
    pub definition: String,
}

impl ConstraintRow {
    pub fn is_primary_key(&self) -> bool {
        self.kind == "p"
    }

    pub fn is_check(&self) -> bool {
        self.kind == "c"
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TriggerRow {
    pub name: String,
    pub definition: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PartitionRow {
    pub name: String,
    pub bounds: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct InvalidIndexRow {
    pub table_name: String,
    pub index_name: String,
}
