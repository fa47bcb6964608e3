//! Command-line interface for the repart binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use repart::{parse_timestamp, MigrationConfig};

/// Online range-partition migration for live PostgreSQL tables.
#[derive(Parser, Debug)]
#[command(name = "repart")]
#[command(about = "Convert a live table into a range-partitioned one, phase by phase", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print every statement of the runbook without executing anything
    Plan(MigrationArgs),
    /// Phase 1: build the widened unique index and range check (non-blocking)
    Prepare(MigrationArgs),
    /// Phase 2: validate the range check (single scan, blocks DDL only)
    Validate(MigrationArgs),
    /// Phases 3-4: the cutover transaction (rename, promote, attach, re-home)
    Cutover(MigrationArgs),
    /// Phase 5: pruning, index-validity and row-count checks
    Verify(VerifyArgs),
    /// All phases in order, with the gates between them
    Run(MigrationArgs),
}

impl Commands {
    pub fn migration_args(&self) -> &MigrationArgs {
        match self {
            Commands::Plan(args)
            | Commands::Prepare(args)
            | Commands::Validate(args)
            | Commands::Cutover(args)
            | Commands::Run(args) => args,
            Commands::Verify(args) => &args.migration,
        }
    }
}

/// Arguments shared by every phase command.
#[derive(Args, Debug, Clone)]
pub struct MigrationArgs {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Load migration settings from a JSON config file instead of flags
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[arg(long, default_value = "public")]
    pub schema: String,

    /// Table to migrate (required unless --config is given)
    #[arg(long)]
    pub table: Option<String>,

    /// Range partition key; must be a timestamp column
    #[arg(long, default_value = "created_at")]
    pub partition_column: String,

    /// Surrogate key column of the source table
    #[arg(long, default_value = "id")]
    pub id_column: String,

    /// Inclusive lower bound, YYYY-MM-DD or "YYYY-MM-DD HH:MM:SS"
    #[arg(long)]
    pub from: Option<String>,

    /// Exclusive upper bound, YYYY-MM-DD or "YYYY-MM-DD HH:MM:SS"
    #[arg(long)]
    pub to: Option<String>,

    /// Suffix for the renamed source table
    #[arg(long, default_value = "_old")]
    pub retired_suffix: String,

    /// lock_timeout inside the cutover transaction
    #[arg(long, default_value = "5s")]
    pub lock_timeout: String,

    /// Optional statement_timeout inside the cutover transaction
    #[arg(long)]
    pub statement_timeout: Option<String>,

    /// Render and log statements without executing DDL
    #[arg(long)]
    pub dry_run: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Arguments for the verify command.
#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub migration: MigrationArgs,

    /// Row count captured during prepare, for the no-data-loss check
    #[arg(long)]
    pub expected_rows: Option<i64>,
}

impl MigrationArgs {
    /// Validate flag combinations and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.config.is_some() {
            return Ok(());
        }

        if self.table.is_none() {
            return Err("--table is required unless --config is given".to_string());
        }

        if self.from.is_none() || self.to.is_none() {
            return Err("--from and --to are required unless --config is given".to_string());
        }

        Ok(())
    }

    /// Build the migration config, either from the JSON file or from flags.
    /// `--dry-run` on the command line wins over the file.
    pub fn to_config(&self) -> anyhow::Result<MigrationConfig> {
        if let Some(path) = &self.config {
            let raw = std::fs::read_to_string(path)?;
            let mut config: MigrationConfig = serde_json::from_str(&raw)?;
            if self.dry_run {
                config.dry_run = true;
            }
            config.validate()?;
            return Ok(config);
        }

        let table = self
            .table
            .clone()
            .ok_or_else(|| anyhow::anyhow!("--table is required unless --config is given"))?;
        let from = self
            .from
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("--from is required unless --config is given"))?;
        let to = self
            .to
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("--to is required unless --config is given"))?;

        let mut config =
            MigrationConfig::new(table, parse_timestamp(from)?, parse_timestamp(to)?)?;
        config.schema = self.schema.clone();
        config.partition_column = self.partition_column.clone();
        config.id_column = self.id_column.clone();
        config.retired_suffix = self.retired_suffix.clone();
        config.lock_timeout = self.lock_timeout.clone();
        config.statement_timeout = self.statement_timeout.clone();
        config.dry_run = self.dry_run;
        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> MigrationArgs {
        MigrationArgs {
            database_url: "postgres://localhost/app".to_string(),
            config: None,
            schema: "public".to_string(),
            table: Some("transaction".to_string()),
            partition_column: "created_at".to_string(),
            id_column: "id".to_string(),
            from: Some("2020-01-01".to_string()),
            to: Some("2024-01-01".to_string()),
            retired_suffix: "_old".to_string(),
            lock_timeout: "5s".to_string(),
            statement_timeout: None,
            dry_run: false,
            verbose: false,
        }
    }

    #[test]
    fn flags_build_a_config() {
        let config = args().to_config().unwrap();
        assert_eq!(config.table, "transaction");
        assert_eq!(config.schema, "public");
        assert_eq!(config.bounds().lower_literal(), "2020-01-01 00:00:00");
    }

    #[test]
    fn table_is_required_without_config_file() {
        let mut args = args();
        args.table = None;
        assert!(args.validate().is_err());
    }

    #[test]
    fn bounds_are_required_without_config_file() {
        let mut args = args();
        args.to = None;
        assert!(args.validate().is_err());
    }

    #[test]
    fn config_file_lifts_flag_requirements() {
        let mut args = args();
        args.table = None;
        args.from = None;
        args.to = None;
        args.config = Some(PathBuf::from("migration.json"));
        assert!(args.validate().is_ok());
    }

    #[test]
    fn rejects_unparsable_bound() {
        let mut args = args();
        args.from = Some("01/01/2020".to_string());
        assert!(args.to_config().is_err());
    }
}
