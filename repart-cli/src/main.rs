//! The repart binary: one subcommand per runbook phase.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let args = cli.command.migration_args();
    init_tracing(args.verbose);
    args.validate().map_err(anyhow::Error::msg)?;

    let config = args.to_config()?;
    let pool = connect(&args.database_url).await?;

    match cli.command {
        Commands::Plan(_) => {
            let plan = repart::plan::build(&pool, &config).await?;
            print!("{}", plan.render());
        }
        Commands::Prepare(_) => {
            let report = repart::prepare::run(&pool, &config).await?;
            info!(
                rows = report.row_count,
                created_index = report.created_index,
                created_check = report.created_check,
                "prepare finished"
            );
            println!(
                "prepared; {} rows counted. Keep this for the final check: \
                 repart verify --expected-rows {}",
                report.row_count, report.row_count
            );
        }
        Commands::Validate(_) => {
            repart::validate::run(&pool, &config).await?;
            println!("range check validated");
        }
        Commands::Cutover(_) => {
            let report = repart::cutover::run(&pool, &config).await?;
            println!(
                "cutover complete: {} statements, {} trigger(s) re-homed",
                report.statements_executed,
                report.triggers_rehomed.len()
            );
        }
        Commands::Verify(ref verify_args) => {
            let report = repart::verify::run(&pool, &config, verify_args.expected_rows).await?;
            println!("{}", report.summary());

            if !report.passed() {
                std::process::exit(1);
            }
            println!("verification passed");
        }
        Commands::Run(_) => {
            let report = repart::runbook::run_all(&pool, &config).await?;
            match report.verify {
                Some(verify) => {
                    println!("{}", verify.summary());
                    println!("migration complete");
                }
                None => println!("dry run complete; no DDL was executed"),
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();
}

async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}
