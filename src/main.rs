//! peoplelint - People Curation JSON Linter
//!
//! A Rust microservice that pre-cleans pasted generator output, validates
//! the people document schema, and emits a cleaned JSON artifact plus an
//! optional CSV pivot.
//!
//! ## Usage
//!
//! ### CLI Mode
//! ```bash
//! peoplelint lint paste.txt --out cleaned.json --csv pivot.csv
//! ```
//!
//! ### HTTP Server Mode
//! ```bash
//! peoplelint serve --port 3000
//! ```

use anyhow::{Context, Result};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use clap::{Parser, Subcommand};
use peoplelint::policy::Policy;
use peoplelint::recover::recover;
use peoplelint::validate::{validate, RepairMode, Report};
use peoplelint::{export, purify};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// People Curation JSON Linter - Rust Microservice
#[derive(Parser)]
#[command(name = "peoplelint")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pre-clean, parse, and lint a people JSON file
    Lint {
        /// Input file (raw generator paste or JSON)
        input: PathBuf,

        /// Path to write cleaned JSON on pass
        #[arg(short, long)]
        out: PathBuf,

        /// Optional path to write the CSV pivot on pass
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Skip the mild pass and repair aggressively right away
        #[arg(long)]
        aggressive: bool,

        /// Silently repair ordering/count/date violations instead of reporting
        #[arg(long)]
        lenient: bool,
    },

    /// Purify a single URL and print its canonical form
    Purify {
        /// URL (or URL-bearing text) to purify
        url: String,
    },

    /// Run as HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    match cli.command {
        Commands::Lint { input, out, csv, aggressive, lenient } => {
            run_lint(input, out, csv, aggressive, lenient)
        }
        Commands::Purify { url } => run_purify(&url),
        Commands::Serve { port, host } => run_server(host, port).await,
    }
}

// ============================================================================
// Lint Pipeline
// ============================================================================

/// Recover, validate, and report. On pass, write the cleaned JSON (and the
/// optional CSV pivot); on parse or validation failure, print the report
/// only and exit 1.
fn run_lint(
    input: PathBuf,
    out: PathBuf,
    csv: Option<PathBuf>,
    aggressive: bool,
    lenient: bool,
) -> Result<()> {
    let policy = Policy::new()?;
    let raw = std::fs::read_to_string(&input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let document = match recover(&raw, aggressive, &policy) {
        Ok(doc) => doc,
        Err(e) => {
            let report = Report {
                status: "fail".to_string(),
                errors: vec![e.to_string()],
                warnings: Vec::new(),
                people_count: 0,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            std::process::exit(1);
        }
    };

    let mode = if lenient { RepairMode::Lenient } else { RepairMode::Strict };
    let outcome = validate(document, &policy, mode);
    let report = outcome.report();
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !outcome.passed() {
        std::process::exit(1);
    }

    let mut cleaned = serde_json::to_string_pretty(&outcome.document)?;
    cleaned.push('\n');
    std::fs::write(&out, cleaned)
        .with_context(|| format!("Failed to write {}", out.display()))?;
    info!(path = %out.display(), "cleaned JSON written");

    if let Some(csv_path) = csv {
        let file = std::fs::File::create(&csv_path)
            .with_context(|| format!("Failed to create {}", csv_path.display()))?;
        export::write_csv(&outcome.document, file)?;
        info!(path = %csv_path.display(), "CSV pivot written");
    }

    Ok(())
}

fn run_purify(url: &str) -> Result<()> {
    let policy = Policy::new()?;
    match purify::purify_url(url, &policy) {
        Some(clean) => {
            println!("{clean}");
            Ok(())
        }
        None => {
            eprintln!("unrecoverable: no https:// token found");
            std::process::exit(1);
        }
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

struct AppState {
    policy: Policy,
}

async fn run_server(host: String, port: u16) -> Result<()> {
    info!(host = %host, port = port, "Starting HTTP server");

    let app_state = Arc::new(AppState { policy: Policy::new()? });

    let app = Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/emit_people_json", post(emit_handler))
        .route("/lint_text", post(lint_text_handler))
        .route("/purify_url", post(purify_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("Invalid host:port")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}

/// Emit request body: the people JSON object produced by the generator.
#[derive(Debug, Deserialize)]
struct EmitRequest {
    payload: Value,
}

/// Emit response: the report plus, on pass, the cleaned document and its
/// CSV pivot (base64).
#[derive(Debug, Serialize)]
struct EmitResponse {
    status: String,
    cleaned_json: Option<Value>,
    csv_base64: Option<String>,
    errors: Vec<String>,
    warnings: Vec<String>,
}

/// Validate an already-parsed payload object.
async fn emit_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EmitRequest>,
) -> Json<EmitResponse> {
    info!("emit_people_json request");
    Json(lint_document(&state, req.payload))
}

/// Recover raw pasted text from the request body, then validate.
async fn lint_text_handler(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Json<EmitResponse> {
    info!(bytes = body.len(), "lint_text request");
    match recover(&body, false, &state.policy) {
        Ok(document) => Json(lint_document(&state, document)),
        Err(e) => {
            error!(error = %e, "recovery failed");
            Json(EmitResponse {
                status: "fail".to_string(),
                cleaned_json: None,
                csv_base64: None,
                errors: vec![e.to_string()],
                warnings: Vec::new(),
            })
        }
    }
}

/// The HTTP surface always validates strictly; lenient repair is CLI-only.
fn lint_document(state: &AppState, document: Value) -> EmitResponse {
    let outcome = validate(document, &state.policy, RepairMode::Strict);
    let report = outcome.report();

    if outcome.passed() {
        let csv_base64 = export::csv_string(&outcome.document)
            .ok()
            .map(|csv| STANDARD.encode(csv));
        EmitResponse {
            status: report.status,
            cleaned_json: Some(outcome.document),
            csv_base64,
            errors: report.errors,
            warnings: report.warnings,
        }
    } else {
        EmitResponse {
            status: report.status,
            cleaned_json: None,
            csv_base64: None,
            errors: report.errors,
            warnings: report.warnings,
        }
    }
}

/// Purify request body
#[derive(Debug, Deserialize)]
struct PurifyRequest {
    url: String,
}

/// Purify response
#[derive(Debug, Serialize)]
struct PurifyResponse {
    purified_url: Option<String>,
    ok: bool,
}

/// Purify a single URL (strip tracking/markdown, normalize known hosts).
async fn purify_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PurifyRequest>,
) -> Json<PurifyResponse> {
    let purified = purify::purify_url(&req.url, &state.policy);
    Json(PurifyResponse { ok: purified.is_some(), purified_url: purified })
}

/// Health check endpoint
#[derive(Debug, Serialize)]
struct Healthz {
    ok: bool,
    ts: String,
}

async fn healthz_handler() -> Json<Healthz> {
    Json(Healthz { ok: true, ts: Utc::now().to_rfc3339() })
}
