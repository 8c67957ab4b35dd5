use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use lab_dispatch::config::AppConfig;
use lab_dispatch::dispatch::{
    dispatch_router, roster, DispatchService, DispatchState, DispatchSummary,
};
use lab_dispatch::error::AppError;
use lab_dispatch::intake::OrderImporter;
use lab_dispatch::telemetry;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "Lab Dispatch Hub",
    about = "Run the dispatch service or inspect its board from the command line",
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
    /// Print the dispatch board for the demo roster or an imported worklist
    Report(ReportArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
    /// Replace the demo roster's orders with a worklist CSV export
    #[arg(long)]
    orders_csv: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ReportArgs {
    /// Optional worklist CSV export to hydrate the order store
    #[arg(long)]
    orders_csv: Option<PathBuf>,
    /// Evaluation instant for the report (RFC 3339, defaults to now)
    #[arg(long, value_parser = parse_instant)]
    now: Option<DateTime<Utc>>,
    /// Include a full order listing in the output
    #[arg(long)]
    list_orders: bool,
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
        Command::Report(args) => run_report(args),
    }
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| format!("failed to parse '{raw}' as RFC 3339 ({err})"))
}

fn build_state(orders_csv: Option<PathBuf>, now: DateTime<Utc>) -> Result<DispatchState, AppError> {
    let mut state = roster::standard(now);
    if let Some(path) = orders_csv {
        let mut fresh = DispatchState {
            registry: state.registry.clone(),
            store: Default::default(),
        };
        for order in OrderImporter::from_path(path, now)? {
            // Worklist exports are deduplicated by the importer.
            let _ = fresh.store.insert(order);
        }
        state = fresh;
    }
    Ok(state)
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

    let service = Arc::new(DispatchService::new(build_state(
        args.orders_csv.take(),
        Utc::now(),
    )?));

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
        .merge(dispatch_router(service))
        .layer(prometheus_layer)
        .layer(TimeoutLayer::new(config.server.request_timeout()));

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "lab dispatch service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn run_report(args: ReportArgs) -> Result<(), AppError> {
    let ReportArgs {
        orders_csv,
        now,
        list_orders,
    } = args;

    let now = now.unwrap_or_else(Utc::now);
    let imported = orders_csv.is_some();
    let state = build_state(orders_csv, now)?;
    let service = DispatchService::new(state);

    let summary = service.summary_at(now);
    render_report(&service, &summary, now, imported, list_orders);

    Ok(())
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

fn render_report(
    service: &DispatchService,
    summary: &DispatchSummary,
    now: DateTime<Utc>,
    imported: bool,
    list_orders: bool,
) {
    println!("Dispatch board (evaluated {now})");
    if imported {
        println!("Data source: worklist CSV import");
    } else {
        println!("Data source: standard demo roster");
    }

    println!("\nOrders by status");
    for entry in &summary.status_counts {
        println!("- {}: {}", entry.status_label, entry.count);
    }

    println!("\nResource utilization");
    for entry in &summary.utilization {
        println!(
            "- [{}] {} ({}): {}/{} in use",
            entry.kind.label(),
            entry.name,
            entry.status_label,
            entry.in_use,
            entry.capacity
        );
    }

    println!("\nAverage lab turnaround: {}", summary.average_turnaround);

    if summary.overdue_orders.is_empty() {
        println!("\nOverdue orders: none");
    } else {
        println!("\nOverdue orders");
        for order in &summary.overdue_orders {
            println!(
                "- {} | {} | {} priority | due {} | {}",
                order.id, order.test_name, order.priority_label, order.due_at, order.status_label
            );
        }
    }

    if summary.in_flight.is_empty() {
        println!("\nIn-flight orders: none");
    } else {
        println!("\nIn-flight orders");
        for order in &summary.in_flight {
            println!(
                "- {} | {} | elapsed {} | {}%",
                order.id, order.test_name, order.processing_time, order.progress
            );
        }
    }

    if list_orders {
        println!("\nOrder listing");
        for order in service.orders(&Default::default()) {
            let assignment = match (&order.assigned_phlebotomist, &order.assigned_lab) {
                (Some(phlebotomist), Some(lab)) => format!(" -> {phlebotomist} / {lab}"),
                _ => String::new(),
            };
            println!(
                "- {} | {} | {} | {} priority | {}{}",
                order.id,
                order.patient_name,
                order.test_name,
                order.priority_label,
                order.status_label,
                assignment
            );
        }
    }
}
