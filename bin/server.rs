// SWIFT Registry - Directory Server
// Serves the v1 swift-codes API over HTTP

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use clap::Parser;
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;

use swift_registry::api::{self, ApiError, NewEntry};
use swift_registry::logging;

#[derive(Parser)]
#[command(name = "swift-registry-server")]
#[command(about = "HTTP directory for the SWIFT registry")]
struct ServerArgs {
    /// Registry database file
    #[arg(long, default_value = "swift.db")]
    database: PathBuf,

    /// Listen address
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: String,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
}

fn error_response(err: ApiError) -> Response {
    let status = match &err {
        ApiError::InvalidSwiftCode(_) | ApiError::InvalidIso2Code(_) => StatusCode::BAD_REQUEST,
        ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (status, err.to_string()).into_response()
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /v1/swift-codes/:swift-code - bank or branch details
async fn get_swift_code(
    State(state): State<AppState>,
    Path(swift_code): Path<String>,
) -> Response {
    let conn = state.db.lock().unwrap();

    match api::lookup_swift_code(&conn, &swift_code) {
        Ok(summary) => Json(summary).into_response(),
        Err(err) => error_response(err),
    }
}

/// GET /v1/swift-codes/country/:iso2 - every entry of a country
async fn get_country(State(state): State<AppState>, Path(iso2_code): Path<String>) -> Response {
    let conn = state.db.lock().unwrap();

    match api::lookup_country(&conn, &iso2_code) {
        Ok(summary) => Json(summary).into_response(),
        Err(err) => error_response(err),
    }
}

/// POST /v1/swift-codes - add one headquarters or branch entry
async fn add_swift_code(State(state): State<AppState>, Json(entry): Json<NewEntry>) -> Response {
    let conn = state.db.lock().unwrap();

    match api::add_entry(&conn, &entry) {
        Ok(message) => (StatusCode::OK, message).into_response(),
        Err(err) => error_response(err),
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() {
    logging::init();

    let args = ServerArgs::parse();

    println!("🌐 SWIFT Registry - Directory Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if !args.database.exists() {
        eprintln!("❌ Database not found at {:?}", args.database);
        eprintln!("   Run: swift-registry import <file>");
        eprintln!("   to load the registry first.");
        std::process::exit(1);
    }

    let conn = Connection::open(&args.database).expect("Failed to open database");
    println!("✓ Database opened: {:?}", args.database);

    // Create shared state
    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
    };

    // Build routes
    let app = Router::new()
        .route("/v1/swift-codes", post(add_swift_code))
        .route("/v1/swift-codes/:swift_code", get(get_swift_code))
        .route("/v1/swift-codes/country/:iso2_code", get(get_country))
        .with_state(state)
        .layer(CorsLayer::permissive());

    // Start server
    let listener = tokio::net::TcpListener::bind(&args.listen)
        .await
        .expect("Failed to bind to address");

    println!("\n🚀 Server running on http://{}", args.listen);
    println!("   Lookup: http://{}/v1/swift-codes/{{swift-code}}", args.listen);
    println!("   Country: http://{}/v1/swift-codes/country/{{iso2}}", args.listen);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
