use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

mod db;
mod engine;
mod enrich;
mod metrics;
mod models;
mod reconcile;
mod report;
mod rules;
mod temporal;

use enrich::{Enricher, HttpEnricher, NoopEnricher};

#[derive(Parser)]
#[command(name = "engagement-health")]
#[command(about = "Engagement health assessment engine for project portfolios", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import projects from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Assess health across the project portfolio
    #[command(group(
        ArgGroup::new("scope")
            .args(["status", "name"])
            .multiple(false)
    ))]
    Assess {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        name: Option<String>,
        /// Keep only the first N verdicts in the output
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value_t = engine::DEFAULT_CONCURRENCY)]
        concurrency: usize,
        /// Enrich verdicts with narrative text from the configured service
        #[arg(long)]
        enrich: bool,
        /// Emit verdicts as JSON instead of a summary table
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    #[command(group(
        ArgGroup::new("scope")
            .args(["status", "name"])
            .multiple(false)
    ))]
    Report {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value_t = engine::DEFAULT_CONCURRENCY)]
        concurrency: usize,
        #[arg(long)]
        enrich: bool,
        #[arg(long, default_value = "health-report.md")]
        out: PathBuf,
    },
}

fn build_enricher(enabled: bool) -> anyhow::Result<Arc<dyn Enricher>> {
    if !enabled {
        return Ok(Arc::new(NoopEnricher));
    }
    let endpoint = std::env::var("ENRICHMENT_URL")
        .context("ENRICHMENT_URL must be set when --enrich is passed")?;
    let api_key = std::env::var("ENRICHMENT_API_KEY")
        .context("ENRICHMENT_API_KEY must be set when --enrich is passed")?;
    let model =
        std::env::var("ENRICHMENT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
    Ok(Arc::new(HttpEnricher::new(endpoint, api_key, model)?))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} projects from {}.", csv.display());
        }
        Commands::Assess {
            status,
            name,
            limit,
            concurrency,
            enrich,
            json,
        } => {
            let enricher = build_enricher(enrich)?;
            let snapshots =
                db::fetch_projects(&pool, status.as_deref(), name.as_deref()).await?;

            if snapshots.is_empty() {
                println!("No projects matched this scope.");
                return Ok(());
            }

            let mut verdicts =
                engine::assess_portfolio(snapshots, Utc::now(), enricher, concurrency).await;
            if let Some(limit) = limit {
                verdicts.truncate(limit);
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&verdicts)?);
            } else {
                for verdict in &verdicts {
                    println!(
                        "- {} [{}] {} (next: {})",
                        verdict.project_name, verdict.health, verdict.reason, verdict.action
                    );
                }
                let counts = report::count_by_state(&verdicts);
                println!(
                    "{} project(s): {} healthy, {} at risk, {} critical",
                    verdicts.len(),
                    counts.healthy,
                    counts.at_risk,
                    counts.critical
                );
            }
        }
        Commands::Report {
            status,
            name,
            concurrency,
            enrich,
            out,
        } => {
            let enricher = build_enricher(enrich)?;
            let snapshots =
                db::fetch_projects(&pool, status.as_deref(), name.as_deref()).await?;
            let now = Utc::now();
            let verdicts = engine::assess_portfolio(snapshots, now, enricher, concurrency).await;
            let scope = status.as_deref().or(name.as_deref());
            let rendered = report::build_report(scope, now, &verdicts);
            std::fs::write(&out, rendered)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
