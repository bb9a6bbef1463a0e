//! CLI entry point for the geo demand engine.
//!
//! Every invocation ingests one probe batch (a CSV file or URL, optionally
//! gzipped) and then answers a single query against the resulting grid.

use anyhow::Result;
use clap::{Parser, Subcommand};
use geo_demand::config::{BoundingBox, CoordinateBounds, EngineConfig};
use geo_demand::engine::Engine;
use geo_demand::output::{append_kpis, print_json, print_pretty, write_grid_csv};
use geo_demand::parser::parse_probes;
use geo_demand::source::load_source;
use geo_demand::store::GridStore;
use std::ffi::OsStr;
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "geo_demand")]
#[command(about = "Demand, anomaly and rebalancing analytics over GPS probe batches", long_about = None)]
struct Cli {
    /// JSON engine configuration
    #[arg(short, long, env = "GEO_DEMAND_CONFIG")]
    config: Option<String>,

    /// Only accept probes inside the built-in operating region
    #[arg(long, default_value_t = false)]
    region: bool,

    /// Path to file or URL to ingest
    #[arg(value_name = "FILE_OR_URL")]
    source: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest the batch and report ingestion counts
    Ingest,
    /// Print the hex grid
    Grid {
        /// Also export the grid to this CSV file
        #[arg(long)]
        csv: Option<String>,
    },
    /// Print operational KPIs
    Kpi {
        /// CSV file to append the KPI row to
        #[arg(long)]
        csv: Option<String>,
    },
    /// List detected anomalies
    Anomalies,
    /// Safety summary with recommendations
    Safety,
    /// Highest-demand cells
    Forecast {
        #[arg(short, long, default_value_t = 20)]
        top: usize,
    },
    /// Relocation targets around a point
    Recommend {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        #[arg(short, default_value_t = 3)]
        k: usize,
    },
    /// Simulate relocating supply into the top recommendations
    Simulate {
        /// Share of donor trips to relocate, in (0, 1]
        #[arg(short, long, default_value_t = 0.1)]
        share: f64,
        /// Number of recommendations (from 0, 0) used as targets
        #[arg(short, long, default_value_t = 5)]
        targets: usize,
    },
    /// Store diagnostics
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/geo_demand.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("geo_demand.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(
            EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        );

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(
            EnvFilter::try_from_env("RUST_LOG_JSON").unwrap_or_else(|_| EnvFilter::new("debug")),
        );

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if cli.region {
        config.validation.bounds = CoordinateBounds::Region(BoundingBox::OPERATING_REGION);
    }

    let engine = Engine::new(GridStore::new_arc(), config)?;

    let bytes = load_source(&cli.source).await?;
    let probes = parse_probes(&bytes)?;
    let ingested = engine.ingest(&probes);

    match cli.command {
        Commands::Ingest => print_json(&ingested)?,
        Commands::Grid { csv } => {
            let grid = engine.grid();
            if let Some(path) = csv {
                write_grid_csv(&path, &grid)?;
            }
            print_json(&grid)?;
        }
        Commands::Kpi { csv } => {
            let kpis = engine.kpis();
            print_pretty(&kpis);
            if let Some(path) = csv {
                append_kpis(&path, &kpis)?;
            }
            print_json(&kpis)?;
        }
        Commands::Anomalies => print_json(&engine.anomalies())?,
        Commands::Safety => print_json(&engine.safety_scan())?,
        Commands::Forecast { top } => print_json(&engine.forecast(top))?,
        Commands::Recommend { lat, lng, k } => print_json(&engine.recommendations(lat, lng, k))?,
        Commands::Simulate { share, targets } => {
            let recommendations = engine.recommendations(0.0, 0.0, targets);
            match engine.run_simulation(&recommendations, share) {
                Ok(result) => print_json(&result)?,
                Err(e) => {
                    error!(error = %e, "Simulation not run");
                    print_json(&serde_json::json!({ "error": e.to_string() }))?;
                }
            }
        }
        Commands::Status => print_json(&engine.status())?,
    }

    info!(source = %cli.source, "Done");
    Ok(())
}
