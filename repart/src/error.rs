use repart_sql::TableRef;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("sqlx `{0}`")]
    Sqlx(#[from] sqlx::Error),

    #[error("serde_json `{0}`")]
    SerdeJson(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("table {0} not found")]
    TableNotFound(TableRef),

    #[error("column {column} not found on {table}")]
    ColumnNotFound { table: TableRef, column: String },

    #[error(
        "partition column {column} on {table} has type {data_type}, expected a timestamp type"
    )]
    NotATimestampColumn {
        table: TableRef,
        column: String,
        data_type: String,
    },

    #[error("{table} has no primary key to replace")]
    MissingPrimaryKey { table: TableRef },

    #[error(
        "column {column} on {table} is nullable; promoting the widened key to \
         PRIMARY KEY would force a NOT NULL scan inside the cutover transaction"
    )]
    NullableKeyColumn { table: TableRef, column: String },

    #[error(
        "unique index {index} on {table} is INVALID; a concurrent build failed. \
         Drop the index and re-run prepare before continuing"
    )]
    InvalidIndex { table: TableRef, index: String },

    #[error("unique index {index} on {table} is missing; run prepare first")]
    MissingIndex { table: TableRef, index: String },

    #[error("check constraint {constraint} on {table} is missing; run prepare first")]
    MissingCheck { table: TableRef, constraint: String },

    #[error(
        "check constraint {constraint} on {table} is NOT VALID; run validate before cutover"
    )]
    UnvalidatedCheck { table: TableRef, constraint: String },

    #[error("table {0} already exists; choose another retired-table suffix or shell name")]
    NameTaken(TableRef),

    #[error(
        "bounds of {constraint} do not match the planned attach bounds \
         (constraint: [{found_lower}, {found_upper}), attach: [{want_lower}, {want_upper})); \
         attaching would trigger a full validating scan under ACCESS EXCLUSIVE"
    )]
    BoundsMismatch {
        constraint: String,
        found_lower: String,
        found_upper: String,
        want_lower: String,
        want_upper: String,
    },

    #[error("cannot extract range bounds from constraint {constraint}: {definition}")]
    UnparsableBounds {
        constraint: String,
        definition: String,
    },

    #[error("cannot rebuild index {index} on the partitioned parent from: {definition}")]
    UnparsableIndex { index: String, definition: String },

    #[error("unexpected EXPLAIN output: {0}")]
    UnexpectedPlan(String),

    #[error("verification failed: {0}")]
    Verification(String),

    #[error("{0}")]
    Any(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
