use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

mod combiner;
mod config;
mod coordinator;
mod db;
mod error;
mod histogram;
mod ingest;
mod merger;
mod models;
mod period;
mod report;
mod resolver;
mod store;
mod submission;
mod validation;

use coordinator::AggregationCoordinator;
use db::PgRecordStore;
use period::SemesterOrder;

#[derive(Parser)]
#[command(name = "grade-statistics")]
#[command(about = "Exam grade statistics per module and institution", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Markdown,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Import historical datasets from a directory of JSON files
    ImportDatasets {
        #[arg(long)]
        dir: PathBuf,
    },
    /// Replace an identity's grades with the rows of a CSV file
    Submit {
        #[arg(long)]
        identity: String,
        #[arg(long, default_value = config::DEFAULT_INSTITUTION)]
        institution: String,
        #[arg(long)]
        csv: PathBuf,
    },
    /// Compute statistics for a module
    Stats {
        #[arg(long)]
        module: String,
        #[arg(long, default_value = config::DEFAULT_INSTITUTION)]
        institution: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Delete an identity's grades and record the opt-out
    Withdraw {
        #[arg(long)]
        identity: String,
        #[arg(long, default_value = config::DEFAULT_INSTITUTION)]
        institution: String,
        #[arg(long, env = "MAX_OPT_OUTS", default_value_t = config::DEFAULT_MAX_OPT_OUTS)]
        max_opt_outs: i64,
    },
    /// Show whether an identity has grades and how often it opted out
    OptOutStatus {
        #[arg(long)]
        identity: String,
        #[arg(long, default_value = config::DEFAULT_INSTITUTION)]
        institution: String,
    },
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose >= 2)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;
    let store = Arc::new(PgRecordStore::new(pool.clone()));

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::ImportDatasets { dir } => {
            let summary = ingest::import_datasets(store.as_ref(), &dir).await?;
            for path in &summary.inserted {
                println!("inserted {}", path.display());
            }
            for path in &summary.skipped {
                println!("{} was already inserted", path.display());
            }
        }
        Commands::Submit {
            identity,
            institution,
            csv,
        } => {
            let entries = ingest::read_grade_entries(&csv)?;
            let receipt =
                submission::submit(store.as_ref(), &SemesterOrder, &identity, &institution, entries)
                    .await?;
            println!(
                "Stored {} grades ({} repeats), replacing {} previous records.",
                receipt.inserted, receipt.repeats, receipt.replaced
            );
        }
        Commands::Stats {
            module,
            institution,
            format,
            out,
        } => {
            validation::validate_institution(&institution)?;
            let coordinator = AggregationCoordinator::new(store, Arc::new(SemesterOrder));
            let stats = coordinator.get_statistics(&module, &institution).await?;

            let rendered = match format {
                OutputFormat::Json => serde_json::to_string_pretty(&stats)?,
                OutputFormat::Markdown => report::build_report(&module, &institution, &stats),
            };
            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)?;
                    println!("Statistics written to {}.", path.display());
                }
                None => println!("{rendered}"),
            }
        }
        Commands::Withdraw {
            identity,
            institution,
            max_opt_outs,
        } => {
            if submission::withdraw(store.as_ref(), &identity, &institution, max_opt_outs).await? {
                println!("Grades withdrawn.");
            } else {
                println!("No grades stored for this identity.");
            }
        }
        Commands::OptOutStatus {
            identity,
            institution,
        } => {
            let status = submission::opt_out_status(store.as_ref(), &identity, &institution).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}
