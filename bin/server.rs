// Payout Ledger - API Server
// REST surface over the ledger operations, behind the `server` feature.
// Identity arrives in `x-actor-id` / `x-actor-role` headers (set by the
// platform gateway); role checks themselves live in the library.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;

use payout_ledger::{
    entries_for_seller, get_payout_methods, get_seller, get_withdrawals_for_seller, insert_seller,
    open, Actor, BalanceLedger, FinalizeDecision, FlatRateTaxCalculator, LedgerConfig,
    LedgerError, NoopNotificationSink, Outbox, PayoutDetails, PayoutMethodRegistry, PayoutSlot,
    Seller, TaxCategory, VerificationWorkflow, WithdrawalProcessor,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    config: LedgerConfig,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Map a ledger error onto an HTTP status. Business-rule conflicts are 409,
/// malformed input is 400, missing entities 404, role failures 403.
fn error_status(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::Validation(_)
        | LedgerError::InvalidAmount(_)
        | LedgerError::IncompleteDetails(_) => StatusCode::BAD_REQUEST,
        LedgerError::Unauthorized(_) => StatusCode::FORBIDDEN,
        LedgerError::NotFound(_) | LedgerError::MissingPaymentDetails(_) => StatusCode::NOT_FOUND,
        LedgerError::InsufficientFunds { .. }
        | LedgerError::InvalidStateTransition(_)
        | LedgerError::DuplicateAccount(_)
        | LedgerError::AccountAlreadyInUse { .. }
        | LedgerError::NameMismatch { .. }
        | LedgerError::PayoutNotVerified(_)
        | LedgerError::AlreadyFinalized { .. } => StatusCode::CONFLICT,
        LedgerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond<T: Serialize>(result: payout_ledger::Result<T>) -> Response {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::ok(data))).into_response(),
        Err(e) => {
            if !e.is_business_error() {
                tracing::error!("request failed: {}", e);
            }
            (error_status(&e), Json(ApiResponse::<()>::err(e.to_string()))).into_response()
        }
    }
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::err(message.to_string())),
    )
        .into_response()
}

/// Who is calling. Role defaults to `seller` so admin-only operations fail
/// closed when the gateway forgot to set headers.
fn actor_from_headers(headers: &HeaderMap) -> Actor {
    let id = headers
        .get("x-actor-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("api");
    match headers.get("x-actor-role").and_then(|v| v.to_str().ok()) {
        Some("admin") => Actor::admin(id),
        Some("system") => Actor::system(),
        _ => Actor::seller(id),
    }
}

// ============================================================================
// Request Bodies
// ============================================================================

#[derive(Deserialize)]
struct CreateSellerRequest {
    name: String,
    shop_name: String,
    email: String,
    tax_category: Option<String>,
}

#[derive(Deserialize)]
struct AmountRequest {
    amount: i64,
    reason: Option<String>,
}

#[derive(Deserialize)]
struct UnlockRequest {
    amount: Option<i64>,
}

#[derive(Deserialize)]
struct ResetRequest {
    balance: i64,
    reason: Option<String>,
}

#[derive(Deserialize)]
struct RejectRequest {
    reason: String,
}

#[derive(Deserialize)]
struct CreateWithdrawalRequest {
    amount: i64,
    slot: Option<String>,
}

#[derive(Deserialize)]
struct FinalizeRequest {
    decision: String,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/sellers - Onboard a seller
async fn create_seller(
    State(state): State<AppState>,
    Json(req): Json<CreateSellerRequest>,
) -> Response {
    let tax_category = match req.tax_category.as_deref() {
        None => TaxCategory::Standard,
        Some(raw) => match TaxCategory::parse(raw) {
            Some(category) => category,
            None => return bad_request("unknown tax category"),
        },
    };
    let seller = Seller::new(&req.name, &req.shop_name, &req.email, tax_category);
    let conn = state.db.lock().unwrap();
    respond(insert_seller(&conn, &seller).map(|_| seller))
}

/// GET /api/sellers/:id - Seller record
async fn get_seller_handler(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let conn = state.db.lock().unwrap();
    respond(get_seller(&conn, &id))
}

/// GET /api/sellers/:id/balance - Balance breakdown (withdrawable derived)
async fn get_balance(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let conn = state.db.lock().unwrap();
    respond(BalanceLedger::balance_breakdown(&conn, &id))
}

/// POST /api/sellers/:id/credit - Credit settled order revenue
async fn credit_sale(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AmountRequest>,
) -> Response {
    let mut conn = state.db.lock().unwrap();
    respond(BalanceLedger::credit_sale(
        &mut conn,
        &id,
        req.amount,
        req.reason.as_deref().unwrap_or("order settlement"),
    ))
}

/// POST /api/sellers/:id/lock - Admin lock against withdrawable funds
async fn lock_funds(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<AmountRequest>,
) -> Response {
    let actor = actor_from_headers(&headers);
    let reason = match req.reason.as_deref() {
        Some(r) => r.to_string(),
        None => return bad_request("lock requires a reason"),
    };
    let mut conn = state.db.lock().unwrap();
    respond(BalanceLedger::lock_funds(&mut conn, &id, req.amount, &reason, &actor))
}

/// POST /api/sellers/:id/unlock - Release a lock (full by default)
async fn unlock_funds(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<UnlockRequest>,
) -> Response {
    let actor = actor_from_headers(&headers);
    let mut conn = state.db.lock().unwrap();
    respond(BalanceLedger::unlock_funds(&mut conn, &id, req.amount, &actor))
}

/// POST /api/sellers/:id/reset - Support tool: force buckets to a known state
async fn reset_balance(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<ResetRequest>,
) -> Response {
    let actor = actor_from_headers(&headers);
    let mut conn = state.db.lock().unwrap();
    respond(BalanceLedger::reset_balance(
        &mut conn,
        &id,
        req.balance,
        &actor,
        req.reason.as_deref(),
    ))
}

/// GET /api/sellers/:id/payout-methods - Both slots, any status
async fn list_payout_methods(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let conn = state.db.lock().unwrap();
    respond(get_payout_methods(&conn, &id))
}

/// POST /api/sellers/:id/payout-methods - Register a destination
async fn create_payout_method(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(details): Json<PayoutDetails>,
) -> Response {
    let actor = actor_from_headers(&headers);
    let registry = PayoutMethodRegistry::new(state.config.clone());
    let mut conn = state.db.lock().unwrap();
    respond(registry.create(&mut conn, &id, details, &actor))
}

/// PUT /api/sellers/:id/payout-methods/:slot - Edit a destination
async fn update_payout_method(
    State(state): State<AppState>,
    Path((id, slot)): Path<(String, String)>,
    headers: HeaderMap,
    Json(details): Json<PayoutDetails>,
) -> Response {
    let Some(slot) = PayoutSlot::parse(&slot) else {
        return bad_request("slot must be 'bank' or 'mobile'");
    };
    let actor = actor_from_headers(&headers);
    let registry = PayoutMethodRegistry::new(state.config.clone());
    let mut conn = state.db.lock().unwrap();
    respond(registry.update_details(&mut conn, &id, slot, details, &actor))
}

/// DELETE /api/sellers/:id/payout-methods/:slot
async fn delete_payout_method(
    State(state): State<AppState>,
    Path((id, slot)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let Some(slot) = PayoutSlot::parse(&slot) else {
        return bad_request("slot must be 'bank' or 'mobile'");
    };
    let actor = actor_from_headers(&headers);
    let registry = PayoutMethodRegistry::new(state.config.clone());
    let mut conn = state.db.lock().unwrap();
    respond(registry.delete(&mut conn, &id, slot, &actor))
}

/// POST /api/sellers/:id/payout-methods/:slot/submit - Queue for review
async fn submit_payout_method(
    State(state): State<AppState>,
    Path((id, slot)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let Some(slot) = PayoutSlot::parse(&slot) else {
        return bad_request("slot must be 'bank' or 'mobile'");
    };
    let actor = actor_from_headers(&headers);
    let registry = PayoutMethodRegistry::new(state.config.clone());
    let mut conn = state.db.lock().unwrap();
    respond(registry.submit_for_verification(&mut conn, &id, slot, &actor))
}

/// POST /api/sellers/:id/payout-methods/:slot/approve - Admin verification
async fn approve_payout_method(
    State(state): State<AppState>,
    Path((id, slot)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let Some(slot) = PayoutSlot::parse(&slot) else {
        return bad_request("slot must be 'bank' or 'mobile'");
    };
    let actor = actor_from_headers(&headers);
    let mut conn = state.db.lock().unwrap();
    respond(VerificationWorkflow::approve(&mut conn, &id, slot, &actor))
}

/// POST /api/sellers/:id/payout-methods/:slot/reject - Admin rejection
async fn reject_payout_method(
    State(state): State<AppState>,
    Path((id, slot)): Path<(String, String)>,
    headers: HeaderMap,
    Json(req): Json<RejectRequest>,
) -> Response {
    let Some(slot) = PayoutSlot::parse(&slot) else {
        return bad_request("slot must be 'bank' or 'mobile'");
    };
    let actor = actor_from_headers(&headers);
    let mut conn = state.db.lock().unwrap();
    respond(VerificationWorkflow::reject(&mut conn, &id, slot, &req.reason, &actor))
}

/// POST /api/sellers/:id/withdrawals - Reserve funds for payout
async fn create_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CreateWithdrawalRequest>,
) -> Response {
    let slot = match req.slot.as_deref() {
        None => None,
        Some(raw) => match PayoutSlot::parse(raw) {
            Some(slot) => Some(slot),
            None => return bad_request("slot must be 'bank' or 'mobile'"),
        },
    };
    let processor = WithdrawalProcessor::new(
        state.config.clone(),
        FlatRateTaxCalculator {
            standard_rate_bp: state.config.standard_rate_bp,
        },
    );
    let mut conn = state.db.lock().unwrap();
    respond(processor.create(&mut conn, &id, req.amount, slot))
}

/// GET /api/sellers/:id/withdrawals - Request history, newest first
async fn list_withdrawals(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let conn = state.db.lock().unwrap();
    respond(get_withdrawals_for_seller(&conn, &id))
}

/// POST /api/withdrawals/:id/finalize - Admin pays out or rejects
async fn finalize_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<FinalizeRequest>,
) -> Response {
    let decision = match req.decision.as_str() {
        "approve" => FinalizeDecision::Approve,
        "reject" => FinalizeDecision::Reject,
        _ => return bad_request("decision must be 'approve' or 'reject'"),
    };
    let actor = actor_from_headers(&headers);
    let processor = WithdrawalProcessor::new(
        state.config.clone(),
        FlatRateTaxCalculator {
            standard_rate_bp: state.config.standard_rate_bp,
        },
    );
    let mut conn = state.db.lock().unwrap();
    respond(processor.finalize(&mut conn, &id, decision, &actor))
}

/// GET /api/sellers/:id/audit - Audit trail for support investigations
async fn get_audit_trail(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let conn = state.db.lock().unwrap();
    respond(entries_for_seller(&conn, &id))
}

/// POST /api/outbox/drain - Deliver queued notifications
async fn drain_outbox(State(state): State<AppState>) -> Response {
    let conn = state.db.lock().unwrap();
    respond(Outbox::drain(&conn, &NoopNotificationSink))
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("💸 Payout Ledger - API Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let db_path = std::env::var("LEDGER_DB").unwrap_or_else(|_| "payout-ledger.db".to_string());
    let conn = open(std::path::Path::new(&db_path)).expect("Failed to open database");
    println!("✓ Database opened: {}", db_path);

    let config = match std::env::var("LEDGER_CONFIG") {
        Ok(path) => LedgerConfig::load(std::path::Path::new(&path)).expect("Failed to load config"),
        Err(_) => LedgerConfig::default(),
    };

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        config,
    };

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/sellers", post(create_seller))
        .route("/sellers/:id", get(get_seller_handler))
        .route("/sellers/:id/balance", get(get_balance))
        .route("/sellers/:id/credit", post(credit_sale))
        .route("/sellers/:id/lock", post(lock_funds))
        .route("/sellers/:id/unlock", post(unlock_funds))
        .route("/sellers/:id/reset", post(reset_balance))
        .route(
            "/sellers/:id/payout-methods",
            get(list_payout_methods).post(create_payout_method),
        )
        .route(
            "/sellers/:id/payout-methods/:slot",
            put(update_payout_method).delete(delete_payout_method),
        )
        .route("/sellers/:id/payout-methods/:slot/submit", post(submit_payout_method))
        .route("/sellers/:id/payout-methods/:slot/approve", post(approve_payout_method))
        .route("/sellers/:id/payout-methods/:slot/reject", post(reject_payout_method))
        .route(
            "/sellers/:id/withdrawals",
            get(list_withdrawals).post(create_withdrawal),
        )
        .route("/withdrawals/:id/finalize", post(finalize_withdrawal))
        .route("/sellers/:id/audit", get(get_audit_trail))
        .route("/outbox/drain", post(drain_outbox))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    let addr = std::env::var("LEDGER_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    println!("\n🚀 Server running on http://{}", addr);
    println!("   Health: http://{}/api/health", addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
