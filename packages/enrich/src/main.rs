#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the speed-limit enrichment tool.

use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use speed_map_database::{db, ensure_schema, queries};
use speed_map_enrich::EnrichConfig;
use speed_map_overpass::client::OverpassClient;
use speed_map_overpass::retry::RetryPolicy;

/// User agent sent with every Overpass request.
const USER_AGENT: &str = concat!("speed-map/", env!("CARGO_PKG_VERSION"));

/// Per-request HTTP timeout, so one hung query cannot stall its batch.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "speed_map_enrich", about = "Speed limit enrichment for vehicle positions")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Drain the backlog of unprocessed positions
    Run {
        /// Maximum number of positions to process (for testing)
        #[arg(long)]
        limit: Option<u64>,
    },
    /// Create the speed_limits table and index if absent
    Bootstrap,
    /// Print the number of unprocessed positions
    Backlog,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run { limit: None }) {
        Commands::Bootstrap => {
            let db = db::connect_from_env().await?;
            ensure_schema(db.as_ref()).await?;
            log::info!("Schema bootstrap complete.");
        }
        Commands::Backlog => {
            let db = db::connect_from_env().await?;
            ensure_schema(db.as_ref()).await?;
            let count = queries::count_unprocessed(db.as_ref()).await?;
            println!("{count} unprocessed positions");
        }
        Commands::Run { limit } => {
            let config = EnrichConfig::from_env();
            let db = db::connect_from_env().await?;
            ensure_schema(db.as_ref()).await?;

            let http = reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .timeout(REQUEST_TIMEOUT)
                .build()?;
            let overpass = OverpassClient::with_retry(
                http,
                config.overpass_url.clone(),
                RetryPolicy::with_max_retries(config.max_retries),
            );

            log::info!(
                "Enriching via {} (concurrency={}, batch_size={})",
                config.overpass_url,
                config.concurrency,
                config.batch_size
            );

            let start = Instant::now();
            let stats = speed_map_enrich::run(db.as_ref(), &overpass, &config, limit).await?;
            let elapsed = start.elapsed();

            log::info!(
                "Enrichment complete: {} positions processed, {} records inserted, {} unresolved in {:.1}s",
                stats.processed,
                stats.inserted,
                stats.unresolved,
                elapsed.as_secs_f64()
            );

            if !stats.road_stats.is_empty() {
                println!("\nRoad Duplication Stats:");
                for (key, count) in stats.road_stats_sorted() {
                    let (road_name, speed_limit) = key;
                    println!("{road_name}: {speed_limit} km/h - {count} entries");
                }
            }
        }
    }

    Ok(())
}
