use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use byowner::config::AppConfig;
use byowner::error::AppError;
use byowner::telemetry;
use byowner::workflows::claims::{
    claim_router, ClaimService, ClaimTokenIssuer, ExpirationSweeper, InMemoryListingStore,
    LogNotices, SweepMode, SweepOutcome, UserId,
};
use byowner::workflows::import::{BatchImporter, ImportRequest, ImportSummary};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use clap::{Args, Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "By-Owner Marketplace Service",
    about = "Run the listing import and claim lifecycle service from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Import a property CSV and report the batch outcome
    Import(ImportArgs),
    /// Retire unclaimed listings whose claim window lapsed
    Sweep(SweepArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
    /// Hydrate the store from a property CSV at boot
    #[arg(long)]
    import_csv: Option<PathBuf>,
    /// Source label recorded on the boot-time import batch
    #[arg(long, default_value = "csv")]
    import_source: String,
}

#[derive(Args, Debug)]
struct ImportArgs {
    /// Property CSV export to import
    #[arg(long)]
    csv: PathBuf,
    /// Source label recorded on the batch (e.g. zillow, assessor)
    #[arg(long, default_value = "csv")]
    source: String,
    /// User id of the operator running the import
    #[arg(long)]
    imported_by: String,
    /// Claim window override in days (defaults to configuration)
    #[arg(long)]
    ttl_days: Option<i64>,
    /// Free-form note recorded on the batch
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Args, Debug)]
struct SweepArgs {
    /// Report the would-be-swept set without mutating
    #[arg(long)]
    dry_run: bool,
    /// Evaluate expiry as of this date (YYYY-MM-DD, midnight UTC;
    /// defaults to now)
    #[arg(long, value_parser = parse_date)]
    as_of: Option<NaiveDate>,
    /// Hydrate the store from a property CSV before sweeping (demo mode)
    #[arg(long)]
    seed_csv: Option<PathBuf>,
    /// Claim window in days applied to the seeded batch
    #[arg(long)]
    seed_ttl_days: Option<i64>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Import(args) => run_import(args),
        Command::Sweep(args) => run_sweep(args),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight exists"))
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let store = Arc::new(InMemoryListingStore::new());
    let notices = Arc::new(LogNotices);

    if let Some(path) = args.import_csv.take() {
        let importer = BatchImporter::with_issuer(
            store.clone(),
            notices.clone(),
            ClaimTokenIssuer::with_attempts(config.claims.token_attempts),
        );
        let summary = importer.from_path(
            path,
            ImportRequest {
                imported_by: UserId("boot".to_string()),
                source: args.import_source.clone(),
                original_filename: None,
                claim_ttl: config.claims.ttl(),
                notes: Some("boot-time hydration".to_string()),
            },
            Utc::now(),
        )?;
        info!(
            batch_id = %summary.batch.id.0,
            imported = summary.batch.imported_count,
            failed = summary.batch.failed_count,
            "store hydrated from csv"
        );
    }

    let service = Arc::new(ClaimService::new(store, notices));

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .merge(claim_router(service))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "by-owner marketplace service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn run_import(args: ImportArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let store = Arc::new(InMemoryListingStore::new());
    let notices = Arc::new(LogNotices);
    let importer = BatchImporter::with_issuer(
        store,
        notices,
        ClaimTokenIssuer::with_attempts(config.claims.token_attempts),
    );

    let claim_ttl = args
        .ttl_days
        .map(chrono::Duration::days)
        .unwrap_or_else(|| config.claims.ttl());
    let filename = args
        .csv
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());

    let summary = importer.from_path(
        &args.csv,
        ImportRequest {
            imported_by: UserId(args.imported_by),
            source: args.source,
            original_filename: filename,
            claim_ttl,
            notes: args.notes,
        },
        Utc::now(),
    )?;

    render_import_summary(&summary);
    Ok(())
}

fn run_sweep(args: SweepArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let store = Arc::new(InMemoryListingStore::new());
    let notices = Arc::new(LogNotices);

    if let Some(path) = &args.seed_csv {
        let importer = BatchImporter::with_issuer(
            store.clone(),
            notices,
            ClaimTokenIssuer::with_attempts(config.claims.token_attempts),
        );
        let claim_ttl = args
            .seed_ttl_days
            .map(chrono::Duration::days)
            .unwrap_or_else(|| config.claims.ttl());
        importer.from_path(
            path,
            ImportRequest {
                imported_by: UserId("sweep-demo".to_string()),
                source: "csv".to_string(),
                original_filename: None,
                claim_ttl,
                notes: Some("sweep demo seed".to_string()),
            },
            Utc::now(),
        )?;
    }

    let now = args.as_of.map(midnight_utc).unwrap_or_else(Utc::now);
    let mode = if args.dry_run {
        SweepMode::DryRun
    } else {
        SweepMode::Apply
    };

    let sweeper = ExpirationSweeper::new(store);
    let outcome = sweeper.sweep(now, mode)?;
    render_sweep_outcome(&outcome, now);
    Ok(())
}

fn render_import_summary(summary: &ImportSummary) {
    println!("Import batch {}", summary.batch.id.0);
    println!(
        "Records: {} total, {} imported, {} failed",
        summary.batch.total_records, summary.batch.imported_count, summary.batch.failed_count
    );
    println!("Claim window closes {}", summary.batch.expires_at);

    if !summary.batch.errors.is_empty() {
        println!("\nRow failures");
        for entry in &summary.batch.errors {
            println!("- line {}: {}", entry.line, entry.message);
        }
    }

    if !summary.listings.is_empty() {
        println!("\nClaim links");
        for listing in &summary.listings {
            if let Some(token) = &listing.claim_token {
                println!("- {} -> /claim/{}", listing.address.single_line(), token.0);
            }
        }
    }
}

fn render_sweep_outcome(outcome: &SweepOutcome, now: DateTime<Utc>) {
    if outcome.dry_run {
        println!("Sweep dry-run as of {now}");
    } else {
        println!("Sweep applied as of {now}");
    }

    if outcome.swept.is_empty() {
        println!("Expired unclaimed listings: none");
        return;
    }

    let verb = if outcome.dry_run {
        "would retire"
    } else {
        "retired"
    };
    println!("{} {} listing(s)", verb, outcome.swept.len());
    for swept in &outcome.swept {
        println!("- {} ({})", swept.listing_id.0, swept.address);
    }

    println!("\nRemaining unclaimed per batch");
    for remaining in &outcome.remaining {
        println!(
            "- {}: {} still claimable",
            remaining.batch_id.0, remaining.remaining_unclaimed
        );
    }
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
