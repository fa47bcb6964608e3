//! DDL statement construction, one function per runbook step.
//!
//! Everything here renders to a `String` and nothing executes; execution
//! order and transaction boundaries are the caller's concern. Lock behavior
//! is part of each statement's contract and is documented where it is not
//! obvious.

use crate::bounds::PartitionBounds;
use crate::ident::{quote_ident, quote_literal, TableRef};

/// `CREATE UNIQUE INDEX CONCURRENTLY` over the widened key.
///
/// Two-pass build, no exclusive lock. Must not run inside a transaction
/// block. A failed build leaves an INVALID index behind without raising in
/// any later session, so the catalog has to be re-checked after this
/// completes.
pub fn create_unique_index_concurrently(
    table: &TableRef,
    index: &str,
    columns: &[&str],
) -> String {
    let cols = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "CREATE UNIQUE INDEX CONCURRENTLY {} ON {} ({cols})",
        quote_ident(index),
        table.qualified()
    )
}

/// Register the range check without scanning existing rows.
///
/// `NOT VALID` takes only a brief weak lock; the constraint is enforced for
/// new writes immediately and validated separately.
pub fn add_range_check_not_valid(
    table: &TableRef,
    constraint: &str,
    column: &str,
    bounds: &PartitionBounds,
) -> String {
    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} CHECK ({}) NOT VALID",
        table.qualified(),
        quote_ident(constraint),
        bounds.check_expr(column)
    )
}

/// Single validating scan under `SHARE UPDATE EXCLUSIVE`; blocks other DDL
/// but not reads or writes.
pub fn validate_constraint(table: &TableRef, constraint: &str) -> String {
    format!(
        "ALTER TABLE {} VALIDATE CONSTRAINT {}",
        table.qualified(),
        quote_ident(constraint)
    )
}

/// The partitioned shell table, cloned from the source's column list.
///
/// Indexes are intentionally not cloned; the parent's indexes are created
/// explicitly so the prepared unique index on the source stays untouched.
pub fn create_partitioned_shell(shell: &TableRef, source: &TableRef, column: &str) -> String {
    format!(
        "CREATE TABLE {} (LIKE {} INCLUDING DEFAULTS INCLUDING STORAGE) PARTITION BY RANGE ({})",
        shell.qualified(),
        source.qualified(),
        quote_ident(column)
    )
}

pub fn add_primary_key(table: &TableRef, constraint: &str, columns: &[&str]) -> String {
    let cols = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({cols})",
        table.qualified(),
        quote_ident(constraint)
    )
}

/// In-place catalog rename; the only cost is the ACCESS EXCLUSIVE lock it
/// queues for.
pub fn rename_table(table: &TableRef, new_name: &str) -> String {
    format!(
        "ALTER TABLE {} RENAME TO {}",
        table.qualified(),
        quote_ident(new_name)
    )
}

pub fn drop_constraint(table: &TableRef, constraint: &str) -> String {
    format!(
        "ALTER TABLE {} DROP CONSTRAINT {}",
        table.qualified(),
        quote_ident(constraint)
    )
}

/// Promote an already-valid unique index to primary key. Zero scan: the
/// index was built and validated ahead of the cutover.
pub fn primary_key_using_index(table: &TableRef, constraint: &str, index: &str) -> String {
    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY USING INDEX {}",
        table.qualified(),
        quote_ident(constraint),
        quote_ident(index)
    )
}

/// Attach the retired table as a partition.
///
/// Metadata-only when a validated check constraint proves the bounds; any
/// mismatch silently degrades this into a full validating scan inside the
/// ACCESS EXCLUSIVE window.
pub fn attach_partition(parent: &TableRef, child: &TableRef, bounds: &PartitionBounds) -> String {
    format!(
        "ALTER TABLE {} ATTACH PARTITION {} {}",
        parent.qualified(),
        child.qualified(),
        bounds.attach_clause()
    )
}

pub fn drop_trigger(table: &TableRef, trigger: &str) -> String {
    format!(
        "DROP TRIGGER {} ON {}",
        quote_ident(trigger),
        table.qualified()
    )
}

/// Transaction-scoped lock timeout, so the cutover cannot queue behind a
/// long-running query for longer than the operator allows.
pub fn set_local_lock_timeout(timeout: &str) -> String {
    format!("SET LOCAL lock_timeout = {}", quote_literal(timeout))
}

pub fn set_local_statement_timeout(timeout: &str) -> String {
    format!("SET LOCAL statement_timeout = {}", quote_literal(timeout))
}

/// Rewrite a secondary index definition from `pg_get_indexdef` to target the
/// shell table, letting PostgreSQL pick the index name.
///
/// `pg_get_indexdef` renders `CREATE [UNIQUE] INDEX name ON schema.table
/// USING method (...)`; everything from `USING` onward is carried over
/// verbatim (method, columns, operator classes, predicates).
pub fn index_on_table(definition: &str, target: &TableRef) -> Option<String> {
    let rest = definition.strip_prefix("CREATE ")?;
    let (unique, rest) = match rest.strip_prefix("UNIQUE ") {
        Some(rest) => ("UNIQUE ", rest),
        None => ("", rest),
    };
    let rest = rest.strip_prefix("INDEX ")?;

    let using = rest.find(" USING ")?;
    let tail = &rest[using + 1..];

    Some(format!(
        "CREATE {unique}INDEX ON {} {tail}",
        target.qualified()
    ))
}

/// `EXPLAIN (FORMAT JSON)` probe used to confirm partition pruning.
pub fn explain_pruning_probe(table: &TableRef, column: &str, bounds: &PartitionBounds) -> String {
    format!(
        "EXPLAIN (FORMAT JSON) SELECT * FROM {} WHERE {}",
        table.qualified(),
        bounds.check_expr(column)
    )
}

pub fn count_rows(table: &TableRef) -> String {
    format!("SELECT count(*) FROM {}", table.qualified())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn table() -> TableRef {
        TableRef::new("public", "transaction")
    }

    fn bounds() -> PartitionBounds {
        PartitionBounds::new(
            NaiveDate::from_ymd_opt(2020, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        )
    }

    #[test]
    fn concurrent_unique_index() {
        let sql = create_unique_index_concurrently(
            &table(),
            "transaction_id_created_at_key",
            &["id", "created_at"],
        );
        assert_eq!(
            sql,
            "CREATE UNIQUE INDEX CONCURRENTLY \"transaction_id_created_at_key\" \
             ON \"public\".\"transaction\" (\"id\", \"created_at\")"
        );
    }

    #[test]
    fn range_check_not_valid() {
        let sql = add_range_check_not_valid(
            &table(),
            "transaction_created_at_range_check",
            "created_at",
            &bounds(),
        );
        assert_eq!(
            sql,
            "ALTER TABLE \"public\".\"transaction\" \
             ADD CONSTRAINT \"transaction_created_at_range_check\" \
             CHECK ((\"created_at\" >= '2020-01-01 00:00:00' AND \"created_at\" < '2024-01-01 00:00:00')) \
             NOT VALID"
        );
    }

    #[test]
    fn validate() {
        assert_eq!(
            validate_constraint(&table(), "transaction_created_at_range_check"),
            "ALTER TABLE \"public\".\"transaction\" \
             VALIDATE CONSTRAINT \"transaction_created_at_range_check\""
        );
    }

    #[test]
    fn partitioned_shell() {
        let shell = table().sibling("transaction_partitioned");
        assert_eq!(
            create_partitioned_shell(&shell, &table(), "created_at"),
            "CREATE TABLE \"public\".\"transaction_partitioned\" \
             (LIKE \"public\".\"transaction\" INCLUDING DEFAULTS INCLUDING STORAGE) \
             PARTITION BY RANGE (\"created_at\")"
        );
    }

    #[test]
    fn attach_bounds_match_check_bounds() {
        let check = add_range_check_not_valid(&table(), "c", "created_at", &bounds());
        let attach = attach_partition(&table(), &table().sibling("transaction_old"), &bounds());

        let from_check = crate::bounds::extract_check_bounds(&check).unwrap();
        let from_attach = crate::bounds::extract_check_bounds(&attach).unwrap();
        assert_eq!(from_check, from_attach);
    }

    #[test]
    fn promote_prepared_index() {
        assert_eq!(
            primary_key_using_index(
                &table().sibling("transaction_old"),
                "transaction_old_pkey",
                "transaction_id_created_at_key"
            ),
            "ALTER TABLE \"public\".\"transaction_old\" \
             ADD CONSTRAINT \"transaction_old_pkey\" \
             PRIMARY KEY USING INDEX \"transaction_id_created_at_key\""
        );
    }

    #[test]
    fn lock_timeout_is_quoted() {
        assert_eq!(set_local_lock_timeout("5s"), "SET LOCAL lock_timeout = '5s'");
    }

    #[test]
    fn retargets_secondary_index() {
        let def = "CREATE INDEX idx_transaction_biller_id ON public.transaction \
                   USING btree (biller_id)";
        let shell = table().sibling("transaction_partitioned");

        assert_eq!(
            index_on_table(def, &shell).unwrap(),
            "CREATE INDEX ON \"public\".\"transaction_partitioned\" USING btree (biller_id)"
        );
    }

    #[test]
    fn retargets_unique_index() {
        let def = "CREATE UNIQUE INDEX transaction_ref_key ON public.transaction \
                   USING btree (ref_id, created_at)";
        let shell = table().sibling("transaction_partitioned");

        assert_eq!(
            index_on_table(def, &shell).unwrap(),
            "CREATE UNIQUE INDEX ON \"public\".\"transaction_partitioned\" \
             USING btree (ref_id, created_at)"
        );
    }

    #[test]
    fn rejects_unexpected_index_definition() {
        assert!(index_on_table("CREATE RULE something", &table()).is_none());
        assert!(index_on_table("CREATE INDEX broken ON t (no_using)", &table()).is_none());
    }

    #[test]
    fn pruning_probe_uses_bound_literals() {
        let sql = explain_pruning_probe(&table(), "created_at", &bounds());
        assert_eq!(
            sql,
            "EXPLAIN (FORMAT JSON) SELECT * FROM \"public\".\"transaction\" \
             WHERE (\"created_at\" >= '2020-01-01 00:00:00' AND \"created_at\" < '2024-01-01 00:00:00')"
        );
    }
}
