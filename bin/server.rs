// Customer Sync - Web Server
// REST API with Axum: push incoming customers, read the store

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use customer_sync::{
    init_logging, CustomerRecord, CustomerSync, IncomingCustomer, SqliteStore, SyncConfig,
    SyncError, Violation,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    sync: Arc<Mutex<CustomerSync<SqliteStore>>>,
}

impl AppState {
    fn lock(&self) -> MutexGuard<'_, CustomerSync<SqliteStore>> {
        self.sync.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    violations: Vec<Violation>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            violations: Vec::new(),
        }
    }

    fn failed(error: String, violations: Vec<Violation>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            violations,
        }
    }
}

/// Sync response
#[derive(Serialize)]
struct SyncResponse {
    created: bool,
    match_term: &'static str,
    customer: CustomerRecord,
    duplicates_updated: usize,
}

fn error_response(err: SyncError) -> Response {
    let status = match &err {
        SyncError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SyncError::TypeMismatch { .. } | SyncError::ExternalIdConflict { .. } => {
            StatusCode::CONFLICT
        }
        SyncError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %err, "Customer sync failed");
    }

    let violations = err.violations().to_vec();
    (
        status,
        Json(ApiResponse::<SyncResponse>::failed(err.to_string(), violations)),
    )
        .into_response()
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/customers - All stored customers
async fn get_customers(State(state): State<AppState>) -> Response {
    let sync = state.lock();

    match sync.store().all_customers() {
        Ok(customers) => (StatusCode::OK, Json(ApiResponse::ok(customers))).into_response(),
        Err(e) => {
            error!(error = %e, "Error getting customers");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<Vec<CustomerRecord>>::failed(e.to_string(), Vec::new())),
            )
                .into_response()
        }
    }
}

/// POST /api/customers/sync - Create or update one customer
async fn sync_customer(
    State(state): State<AppState>,
    Json(incoming): Json<IncomingCustomer>,
) -> Response {
    let mut sync = state.lock();

    match sync.sync_detailed(&incoming) {
        Ok(outcome) => {
            let status = if outcome.created {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            let response = SyncResponse {
                created: outcome.created,
                match_term: outcome.term.as_str(),
                duplicates_updated: outcome.duplicates.len(),
                customer: outcome.record,
            };
            (status, Json(ApiResponse::ok(response))).into_response()
        }
        Err(err) => error_response(err),
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = SyncConfig::discover()?;
    init_logging(&config.logging.filter);

    let store = SqliteStore::open(&config.database.path, config.database.wal)?
        .with_actor(&config.actor);
    info!(path = %config.database.path.display(), "Database opened");

    // Create shared state
    let state = AppState {
        sync: Arc::new(Mutex::new(CustomerSync::new(store))),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/customers", get(get_customers))
        .route("/customers/sync", post(sync_customer))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "Server running");

    axum::serve(listener, app).await?;

    Ok(())
}
