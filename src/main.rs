//! CLI entry point for the commute tracker.
//!
//! Provides subcommands for sampling live travel times, generating and
//! reconciling forecasts, and producing analytics reports.

use anyhow::{Context, Result, anyhow};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use commute_tracker::analytics::analyzer::build_report;
use commute_tracker::analytics::reliability::DEFAULT_CONFIDENCE_LEVELS;
use commute_tracker::analytics::writetos3::write_json_to_s3;
use commute_tracker::collector::run_collector;
use commute_tracker::config::RoutesConfig;
use commute_tracker::fetch::BasicClient;
use commute_tracker::fetch::auth::UrlParam;
use commute_tracker::filter::FilterSpec;
use commute_tracker::infra::google::GoogleDirectionsClient;
use commute_tracker::models::{Direction, TrafficModel};
use commute_tracker::output::{print_json, write_json};
use commute_tracker::predictions::accuracy::{accuracy_overview, get_prediction_accuracy};
use commute_tracker::predictions::generator::{GeneratorOptions, generate_predictions};
use commute_tracker::predictions::heatmap::prediction_heatmap;
use commute_tracker::predictions::reconcile::reconcile;
use commute_tracker::store::{CsvStore, PredictionStore};
use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "commute_tracker")]
#[command(about = "Track, forecast and analyze commute travel times", long_about = None)]
struct Cli {
    /// Directory holding the CSV data files
    #[arg(short, long, global = true, default_value = "data")]
    data_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// Only include this route
    #[arg(long)]
    route: Option<String>,

    /// Only include this direction (outbound or inbound)
    #[arg(long)]
    direction: Option<Direction>,

    /// First local date to include (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last local date to include (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Drop samples taken on holidays
    #[arg(long, default_value_t = false)]
    exclude_holidays: bool,

    /// Drop samples taken on Saturday or Sunday
    #[arg(long, default_value_t = false)]
    weekdays_only: bool,
}

impl From<FilterArgs> for FilterSpec {
    fn from(args: FilterArgs) -> Self {
        FilterSpec {
            start_date: args.start,
            end_date: args.end,
            direction: args.direction,
            route_id: args.route,
            exclude_holidays: args.exclude_holidays,
            weekdays_only: args.weekdays_only,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Sample live travel times for every configured route
    Collect {
        /// Routes config file
        #[arg(long, default_value = "routes.json")]
        routes: String,

        /// Sample rate: query every X seconds
        #[arg(short = 'r', long, default_value_t = 900)]
        sample_rate: u64,

        /// Number of samples to collect (0 = infinite)
        #[arg(short = 'n', long, default_value_t = 1)]
        num_samples: usize,
    },
    /// Request forecasts for upcoming departure slots
    Predict {
        /// Routes config file
        #[arg(short, long, default_value = "routes.json")]
        routes: String,

        /// Number of days ahead to forecast, starting today
        #[arg(long, default_value_t = 7)]
        days: u32,

        /// Local hours of day to forecast (comma-separated)
        #[arg(long, value_delimiter = ',', default_values_t = (6u8..=20).collect::<Vec<_>>())]
        hours: Vec<u8>,

        /// Delay between provider requests, in milliseconds
        #[arg(long, default_value_t = 500)]
        pacing_ms: u64,
    },
    /// Link past forecasts to the measurements that observed them
    Reconcile {
        /// Routes config file
        #[arg(short, long, default_value = "routes.json")]
        routes: String,

        /// Only reconcile this route
        #[arg(long)]
        route: Option<String>,
    },
    /// Build a statistics report for a filter
    Report {
        #[command(flatten)]
        filter: FilterArgs,

        /// Confidence levels for the reliability curve (comma-separated)
        #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_CONFIDENCE_LEVELS.to_vec())]
        levels: Vec<u8>,

        /// Write the report JSON to this file
        #[arg(short, long)]
        output: Option<String>,

        /// Optional: S3 bucket name to upload the report to (e.g., "my-bucket")
        #[arg(long)]
        s3_bucket: Option<String>,

        /// Optional: Gzip compress the report before uploading to S3
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
    /// Show forecast accuracy for a route
    Accuracy {
        #[arg(long)]
        route: String,

        /// Traffic model to break down by bucket
        #[arg(long, default_value = "best_guess")]
        traffic_model: TrafficModel,

        /// Show one pooled line per traffic model instead of buckets
        #[arg(long, default_value_t = false)]
        overview: bool,
    },
    /// Show the upcoming forecast heatmap for a route
    Heatmap {
        #[arg(long)]
        route: String,

        #[arg(long, default_value = "outbound")]
        direction: Direction,

        #[arg(long, default_value = "best_guess")]
        traffic_model: TrafficModel,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/commute_tracker.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("commute_tracker.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let mut store = CsvStore::open(&cli.data_dir)?;

    match cli.command {
        Commands::Collect {
            routes,
            sample_rate,
            num_samples,
        } => {
            let config = RoutesConfig::load(&routes)?;
            let api = directions_client()?;
            run_collector(
                &api,
                &mut store,
                &config,
                Duration::from_secs(sample_rate),
                num_samples,
            )
            .await?;
        }
        Commands::Predict {
            routes,
            days,
            hours,
            pacing_ms,
        } => {
            let config = RoutesConfig::load(&routes)?;
            let api = directions_client()?;
            let options = GeneratorOptions {
                days,
                hours,
                pacing: Duration::from_millis(pacing_ms),
                ..Default::default()
            };
            let stored = generate_predictions(&api, &mut store, &config, &options, Utc::now()).await?;
            info!(stored, "Forecasts stored");
        }
        Commands::Reconcile { routes, route } => {
            let config = RoutesConfig::load(&routes)?;
            let route_ids: Vec<String> = match route {
                Some(id) => {
                    config
                        .route(&id)
                        .ok_or_else(|| anyhow!("route '{id}' is not configured"))?;
                    vec![id]
                }
                None => config.routes.iter().map(|r| r.id.clone()).collect(),
            };

            let now = Utc::now();
            let mut total = 0;
            for route_id in route_ids {
                match reconcile(&mut store, &route_id, now) {
                    Ok(linked) => total += linked,
                    Err(e) => error!(route_id = %route_id, error = %e, "Reconciliation failed"),
                }
            }
            info!(linked = total, "Reconciliation finished");
        }
        Commands::Report {
            filter,
            levels,
            output,
            s3_bucket,
            gzip,
        } => {
            let filter = FilterSpec::from(filter);
            let report = build_report(&store, &filter, &levels)?;

            match &output {
                Some(path) => write_json(path, &report)?,
                None => print_json(&report)?,
            }

            if let Some(bucket) = s3_bucket {
                let config = aws_config::load_from_env().await;
                let s3 = aws_sdk_s3::Client::new(&config);
                let key = format!(
                    "reports/{}/{}.json",
                    filter.route_id.as_deref().unwrap_or("all"),
                    report.generated_at.format("%Y-%m-%dT%H%M%S")
                );
                write_json_to_s3(&s3, &bucket, &key, &report, gzip)
                    .await
                    .with_context(|| format!("failed to upload report to s3://{bucket}/{key}"))?;
                info!(bucket = %bucket, key = %key, gzip, "Report uploaded");
            }
        }
        Commands::Accuracy {
            route,
            traffic_model,
            overview,
        } => {
            if overview {
                print_json(&accuracy_overview(&store, &route)?)?;
            } else {
                print_json(&get_prediction_accuracy(&store, &route, traffic_model)?)?;
            }
        }
        Commands::Heatmap {
            route,
            direction,
            traffic_model,
        } => {
            let predictions = store.fetch_predictions(&route)?;
            let cells = prediction_heatmap(&predictions, direction, traffic_model, Utc::now());
            print_json(&cells)?;
        }
    }

    Ok(())
}

/// Google client keyed from `GOOGLE_MAPS_API_KEY`. `GOOGLE_DIRECTIONS_URL`
/// overrides the endpoint.
fn directions_client() -> Result<GoogleDirectionsClient<UrlParam<BasicClient>>> {
    let api_key =
        std::env::var("GOOGLE_MAPS_API_KEY").context("GOOGLE_MAPS_API_KEY must be set")?;
    let client = GoogleDirectionsClient::with_api_key(api_key);
    Ok(match std::env::var("GOOGLE_DIRECTIONS_URL") {
        Ok(url) => client.with_base_url(&url),
        Err(_) => client,
    })
}
