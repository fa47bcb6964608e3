//! Catalog inspection of the migration's tables.

use repart_sql::catalog::{
    ColumnRow, ConstraintRow, IndexRow, InvalidIndexRow, OidRow, PartitionRow, TriggerRow,
};
use repart_sql::{catalog, ddl, TableRef};
use sqlx::postgres::types::Oid;
use sqlx::PgPool;

use crate::error::{Error, Result};

/// Snapshot of one table's catalog state.
#[derive(Debug, Clone)]
pub struct TableInfo {
    pub table: TableRef,
    pub oid: Oid,
    pub columns: Vec<ColumnRow>,
    pub indexes: Vec<IndexRow>,
    pub constraints: Vec<ConstraintRow>,
    pub triggers: Vec<TriggerRow>,
}

impl TableInfo {
    pub fn column(&self, name: &str) -> Option<&ColumnRow> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn index(&self, name: &str) -> Option<&IndexRow> {
        self.indexes.iter().find(|i| i.name == name)
    }

    pub fn constraint(&self, name: &str) -> Option<&ConstraintRow> {
        self.constraints.iter().find(|c| c.name == name)
    }

    pub fn primary_key(&self) -> Option<&ConstraintRow> {
        self.constraints.iter().find(|c| c.is_primary_key())
    }

    /// Secondary indexes to recreate on the partitioned parent: everything
    /// except the primary key's index and the prepared unique index (which
    /// stays on the retired partition as its promoted primary key).
    pub fn secondary_indexes(&self, prepared_index: &str) -> Vec<&IndexRow> {
        self.indexes
            .iter()
            .filter(|i| !i.is_primary && i.name != prepared_index)
            .collect()
    }

    /// Both key columns must be NOT NULL already: `PRIMARY KEY USING INDEX`
    /// otherwise adds the NOT NULL itself, paying for a full scan inside
    /// the cutover transaction.
    pub fn ensure_not_null(&self, column: &str) -> Result<()> {
        let col = self.column(column).ok_or_else(|| Error::ColumnNotFound {
            table: self.table.clone(),
            column: column.to_owned(),
        })?;

        if !col.not_null {
            return Err(Error::NullableKeyColumn {
                table: self.table.clone(),
                column: column.to_owned(),
            });
        }

        Ok(())
    }

    /// The partition column must exist and be a timestamp flavor; range
    /// partitioning on anything else is outside this tool's scope.
    pub fn ensure_timestamp_column(&self, column: &str) -> Result<()> {
        let col = self
            .column(column)
            .ok_or_else(|| Error::ColumnNotFound {
                table: self.table.clone(),
                column: column.to_owned(),
            })?;

        if !col.data_type.starts_with("timestamp") {
            return Err(Error::NotATimestampColumn {
                table: self.table.clone(),
                column: column.to_owned(),
                data_type: col.data_type.clone(),
            });
        }

        Ok(())
    }
}

pub async fn table_oid(pool: &PgPool, table: &TableRef) -> Result<Option<Oid>> {
    let row: Option<OidRow> = sqlx::query_as(catalog::TABLE_OID)
        .bind(&table.schema)
        .bind(&table.name)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| r.oid))
}

/// Load the full catalog snapshot, erroring when the table does not exist.
pub async fn table_info(pool: &PgPool, table: &TableRef) -> Result<TableInfo> {
    let oid = table_oid(pool, table)
        .await?
        .ok_or_else(|| Error::TableNotFound(table.clone()))?;

    let columns = sqlx::query_as(catalog::COLUMNS)
        .bind(oid)
        .fetch_all(pool)
        .await?;
    let indexes = sqlx::query_as(catalog::INDEXES)
        .bind(oid)
        .fetch_all(pool)
        .await?;
    let constraints = sqlx::query_as(catalog::CONSTRAINTS)
        .bind(oid)
        .fetch_all(pool)
        .await?;
    let triggers = sqlx::query_as(catalog::TRIGGERS)
        .bind(oid)
        .fetch_all(pool)
        .await?;

    Ok(TableInfo {
        table: table.clone(),
        oid,
        columns,
        indexes,
        constraints,
        triggers,
    })
}

pub async fn partitions(pool: &PgPool, parent: Oid) -> Result<Vec<PartitionRow>> {
    Ok(sqlx::query_as(catalog::PARTITIONS)
        .bind(parent)
        .fetch_all(pool)
        .await?)
}

pub async fn invalid_indexes(pool: &PgPool, table: Oid) -> Result<Vec<InvalidIndexRow>> {
    Ok(sqlx::query_as(catalog::INVALID_INDEXES)
        .bind(table)
        .fetch_all(pool)
        .await?)
}

/// Exact row count. A sequential scan on purpose: the count anchors the
/// post-migration no-data-loss check.
pub async fn count_rows(pool: &PgPool, table: &TableRef) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(&ddl::count_rows(table))
        .fetch_one(pool)
        .await?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> TableInfo {
        TableInfo {
            table: TableRef::new("public", "transaction"),
            oid: Oid(16384),
            columns: vec![
                ColumnRow {
                    name: "id".into(),
                    data_type: "bigint".into(),
                    not_null: true,
                },
                ColumnRow {
                    name: "created_at".into(),
                    data_type: "timestamp without time zone".into(),
                    not_null: true,
                },
                ColumnRow {
                    name: "biller_id".into(),
                    data_type: "text".into(),
                    not_null: false,
                },
            ],
            indexes: Vec::new(),
            constraints: Vec::new(),
            triggers: Vec::new(),
        }
    }

    #[test]
    fn timestamp_column_check() {
        let info = info();
        assert!(info.ensure_timestamp_column("created_at").is_ok());
        assert!(matches!(
            info.ensure_timestamp_column("biller_id"),
            Err(Error::NotATimestampColumn { .. })
        ));
        assert!(matches!(
            info.ensure_timestamp_column("missing"),
            Err(Error::ColumnNotFound { .. })
        ));
    }

    #[test]
    fn not_null_check() {
        let info = info();
        assert!(info.ensure_not_null("id").is_ok());
        assert!(matches!(
            info.ensure_not_null("biller_id"),
            Err(Error::NullableKeyColumn { .. })
        ));
    }
}
