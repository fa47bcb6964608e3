//! Migration configuration and derived object names.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use repart_sql::{PartitionBounds, TableRef};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

fn default_schema() -> String {
    "public".to_owned()
}

fn default_partition_column() -> String {
    "created_at".to_owned()
}

fn default_id_column() -> String {
    "id".to_owned()
}

fn default_retired_suffix() -> String {
    "_old".to_owned()
}

fn default_lock_timeout() -> String {
    "5s".to_owned()
}

/// Everything the runbook needs to know about one migration.
///
/// Deserializable so the CLI can load it from a JSON file; every phase takes
/// the same config, so a single file describes the whole migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    #[serde(default = "default_schema")]
    pub schema: String,

    pub table: String,

    /// Range partition key; must be a timestamp column.
    #[serde(default = "default_partition_column")]
    pub partition_column: String,

    /// Surrogate key of the source table. The widened primary key is
    /// `(id_column, partition_column)`.
    #[serde(default = "default_id_column")]
    pub id_column: String,

    /// Inclusive lower bound of the retired table's partition range.
    pub lower: NaiveDateTime,

    /// Exclusive upper bound of the retired table's partition range.
    pub upper: NaiveDateTime,

    /// Suffix appended to the source table's name when it is renamed out of
    /// the way during cutover.
    #[serde(default = "default_retired_suffix")]
    pub retired_suffix: String,

    /// `lock_timeout` applied inside the cutover transaction.
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout: String,

    /// Optional `statement_timeout` for the cutover transaction. Off by
    /// default: the attach is metadata-only by construction, and a timeout
    /// firing mid-transaction only adds noise.
    #[serde(default)]
    pub statement_timeout: Option<String>,

    /// Render and log every statement without executing DDL.
    #[serde(default)]
    pub dry_run: bool,
}

impl MigrationConfig {
    pub fn new(
        table: impl Into<String>,
        lower: NaiveDateTime,
        upper: NaiveDateTime,
    ) -> Result<Self> {
        let config = Self {
            schema: default_schema(),
            table: table.into(),
            partition_column: default_partition_column(),
            id_column: default_id_column(),
            lower,
            upper,
            retired_suffix: default_retired_suffix(),
            lock_timeout: default_lock_timeout(),
            statement_timeout: None,
            dry_run: false,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("schema", &self.schema),
            ("table", &self.table),
            ("partition_column", &self.partition_column),
            ("id_column", &self.id_column),
            ("retired_suffix", &self.retired_suffix),
            ("lock_timeout", &self.lock_timeout),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{field} must not be empty")));
            }
        }

        if self.lower >= self.upper {
            return Err(Error::Config(format!(
                "partition range is empty or inverted: lower {} >= upper {}",
                self.lower, self.upper
            )));
        }

        Ok(())
    }

    pub fn bounds(&self) -> PartitionBounds {
        PartitionBounds::new(self.lower, self.upper)
    }

    /// The source table, which the partitioned parent takes over by name.
    pub fn table_ref(&self) -> TableRef {
        TableRef::new(self.schema.clone(), self.table.clone())
    }

    /// The partitioned shell, which only exists inside the cutover
    /// transaction before it is renamed into place.
    pub fn shell_ref(&self) -> TableRef {
        self.table_ref()
            .sibling(format!("{}_partitioned", self.table))
    }

    /// The source table's name after cutover, when it lives on as the first
    /// partition.
    pub fn retired_ref(&self) -> TableRef {
        self.table_ref()
            .sibling(format!("{}{}", self.table, self.retired_suffix))
    }

    /// Name of the concurrently-built unique index on the widened key.
    pub fn unique_index_name(&self) -> String {
        format!(
            "{}_{}_{}_key",
            self.table, self.id_column, self.partition_column
        )
    }

    /// Name of the range check constraint added `NOT VALID` during prepare.
    pub fn check_constraint_name(&self) -> String {
        format!("{}_{}_range_check", self.table, self.partition_column)
    }

    /// Primary-key constraint name for the partitioned parent.
    pub fn parent_pk_name(&self) -> String {
        format!("{}_partitioned_pkey", self.table)
    }

    /// Primary-key constraint name for the retired partition, taken by the
    /// promoted unique index.
    pub fn retired_pk_name(&self) -> String {
        format!("{}_pkey", self.retired_ref().name)
    }
}

/// Parse a bound given on the command line: either `YYYY-MM-DD` (midnight)
/// or `YYYY-MM-DD HH:MM:SS`.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    if let Ok(ts) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Ok(ts);
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|d| d.and_time(NaiveTime::MIN))
        .map_err(|_| {
            Error::Config(format!(
                "cannot parse timestamp `{value}`; expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS"
            ))
        })
}
