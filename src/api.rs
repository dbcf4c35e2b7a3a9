// 🌐 HTTP API - Axum router over the planner
//
// Every response uses the `ApiResponse { success, data, error }` envelope.
// Each signed-in user has a `Planner` in shared state; mutations update it
// synchronously and hand their backend writes to the sync queue, which a
// background task drains (see `spawn_sync_worker`).

use crate::calendar::AcademicCalendar;
use crate::catalog::Catalog;
use crate::payments::{self, CheckoutProvider, CheckoutRequest, PaymentError};
use crate::planner::{AuthEvent, Planner, UserSession};
use crate::sync::{self, ProgressBackend, RetryPolicy, SyncOp, SyncQueue, SyncReport, SyncStatus, SyncStep};
use crate::transcript::{self, TextExtractor, TranscriptAnalyzer, TranscriptError};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

const DEFAULT_UPCOMING: usize = 5;
const MAX_UPCOMING: usize = 50;

// ============================================================================
// STATE
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    catalog: Arc<Catalog>,
    calendar: Arc<AcademicCalendar>,
    backend: Arc<dyn ProgressBackend>,
    planners: Arc<Mutex<HashMap<String, Planner>>>,
    sync: Arc<Mutex<SyncQueue>>,
    sync_notify: Arc<Notify>,
    current_term: String,
    webhook_secret: Option<String>,
    webhook_tolerance_secs: Option<i64>,
    checkout: Option<Arc<dyn CheckoutProvider>>,
    transcript: Option<TranscriptTools>,
}

/// Collaborators for transcript uploads
#[derive(Clone)]
struct TranscriptTools {
    extractor: Arc<dyn TextExtractor>,
    analyzer: Arc<dyn TranscriptAnalyzer>,
}

impl AppState {
    pub fn new(
        catalog: Catalog,
        calendar: AcademicCalendar,
        backend: Arc<dyn ProgressBackend>,
        current_term: &str,
        policy: RetryPolicy,
    ) -> Self {
        AppState {
            catalog: Arc::new(catalog),
            calendar: Arc::new(calendar),
            backend,
            planners: Arc::new(Mutex::new(HashMap::new())),
            sync: Arc::new(Mutex::new(SyncQueue::new(policy))),
            sync_notify: Arc::new(Notify::new()),
            current_term: current_term.to_string(),
            webhook_secret: None,
            webhook_tolerance_secs: Some(payments::DEFAULT_TOLERANCE_SECS),
            checkout: None,
            transcript: None,
        }
    }

    pub fn with_webhook_secret(mut self, secret: Option<String>, tolerance_secs: Option<i64>) -> Self {
        self.webhook_secret = secret;
        self.webhook_tolerance_secs = tolerance_secs;
        self
    }

    pub fn with_checkout_provider(mut self, provider: Arc<dyn CheckoutProvider>) -> Self {
        self.checkout = Some(provider);
        self
    }

    pub fn with_transcript_analyzer(
        mut self,
        extractor: Arc<dyn TextExtractor>,
        analyzer: Arc<dyn TranscriptAnalyzer>,
    ) -> Self {
        self.transcript = Some(TranscriptTools { extractor, analyzer });
        self
    }

    pub fn sync_status(&self) -> SyncStatus {
        lock(&self.sync).status()
    }

    /// Drain the sync queue on the calling thread (shutdown, tests)
    pub fn flush_sync(&self) -> SyncReport {
        sync::flush_shared(&self.sync, self.backend.as_ref())
    }

    fn enqueue(&self, ops: Vec<SyncOp>) {
        if ops.is_empty() {
            return;
        }
        lock(&self.sync).enqueue(ops);
        self.sync_notify.notify_one();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// RESPONSES
// ============================================================================

/// API Response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: (),
            error: Some(message.into()),
        }
    }
}

fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::ok(data))).into_response()
}

fn fail(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::err(message))).into_response()
}

fn not_signed_in(user_id: &str) -> Response {
    fail(StatusCode::UNAUTHORIZED, format!("User {} is not signed in", user_id))
}

// ============================================================================
// REQUEST BODIES
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct SignInRequest {
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AddCourseRequest {
    code: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptRequest {
    /// Raw analyzer output
    response: String,
}

#[derive(Debug, Deserialize)]
struct UpcomingQuery {
    count: Option<usize>,
}

#[derive(Debug, Serialize)]
struct CheckoutResponse {
    id: String,
}

#[derive(Debug, Serialize)]
struct WebhookAck {
    received: bool,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/catalog - Degree requirements
async fn get_catalog(State(state): State<AppState>) -> Response {
    ok(state.catalog.as_ref())
}

/// POST /api/users/:user_id/session - Sign in and load stored progress
async fn sign_in(State(state): State<AppState>, Path(user_id): Path<String>, body: Bytes) -> Response {
    let request: SignInRequest = if body.is_empty() {
        SignInRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(e) => return fail(StatusCode::BAD_REQUEST, format!("Invalid body: {}", e)),
        }
    };

    // Already signed in: keep local state (it may hold writes not yet synced)
    if let Some(planner) = lock(&state.planners).get(&user_id) {
        return ok(planner.report());
    }

    let session = UserSession {
        user_id: user_id.clone(),
        email: request.email,
    };
    let catalog = state.catalog.clone();
    let backend = state.backend.clone();
    let term = state.current_term.clone();

    let loaded = tokio::task::spawn_blocking(move || {
        let mut planner = Planner::new(catalog, &term);
        let reloaded = planner.handle_auth_event(AuthEvent::SignedIn(session), backend.as_ref());
        (planner, reloaded)
    })
    .await;

    match loaded {
        Ok((planner, reloaded)) => {
            // Local state now matches the backend, so earlier abandoned writes no longer diverge
            if reloaded {
                lock(&state.sync).clear_failed_for(&user_id);
            }
            let report = planner.report();
            lock(&state.planners).entry(user_id).or_insert(planner);
            ok(report)
        }
        Err(e) => {
            error!("sign-in task failed: {}", e);
            fail(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load progress")
        }
    }
}

/// DELETE /api/users/:user_id/session - Sign out and drop local state
async fn sign_out(State(state): State<AppState>, Path(user_id): Path<String>) -> Response {
    match lock(&state.planners).remove(&user_id) {
        Some(mut planner) => {
            planner.handle_auth_event(AuthEvent::SignedOut, state.backend.as_ref());
            ok("signed out")
        }
        None => not_signed_in(&user_id),
    }
}

/// GET /api/users/:user_id/progress - Progress report
async fn get_progress(State(state): State<AppState>, Path(user_id): Path<String>) -> Response {
    match lock(&state.planners).get(&user_id) {
        Some(planner) => ok(planner.report()),
        None => not_signed_in(&user_id),
    }
}

/// POST /api/users/:user_id/courses - Mark a course complete
async fn add_course(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<AddCourseRequest>,
) -> Response {
    let (outcome, ops) = {
        let mut planners = lock(&state.planners);
        let Some(planner) = planners.get_mut(&user_id) else {
            return not_signed_in(&user_id);
        };
        let outcome = planner.add_completed_course(request.code.trim());
        (outcome, planner.drain_outbox())
    };

    state.enqueue(ops);
    ok(outcome)
}

/// DELETE /api/users/:user_id/courses/:code - Unmark a course
async fn remove_course(
    State(state): State<AppState>,
    Path((user_id, code)): Path<(String, String)>,
) -> Response {
    let (outcome, ops) = {
        let mut planners = lock(&state.planners);
        let Some(planner) = planners.get_mut(&user_id) else {
            return not_signed_in(&user_id);
        };
        let outcome = planner.remove_completed_course(&code);
        (outcome, planner.drain_outbox())
    };

    state.enqueue(ops);
    ok(outcome)
}

/// POST /api/users/:user_id/transcript - Apply courses identified by the analyzer
async fn apply_transcript(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<TranscriptRequest>,
) -> Response {
    let records = match transcript::parse_identified_courses(&request.response) {
        Ok(records) => records,
        Err(e @ TranscriptError::MalformedResponse(_)) => {
            return fail(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        }
        Err(e) => return fail(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let (outcome, ops) = {
        let mut planners = lock(&state.planners);
        let Some(planner) = planners.get_mut(&user_id) else {
            return not_signed_in(&user_id);
        };
        let outcome = planner.apply_identified_courses(records);
        (outcome, planner.drain_outbox())
    };

    state.enqueue(ops);
    ok(outcome)
}

/// POST /api/users/:user_id/transcript/upload - Analyze an uploaded transcript
///
/// The body is the raw file; `Content-Type` selects PDF or plain text. The
/// upload is validated before any extractor or analyzer is called.
async fn upload_transcript(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mime = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let completed = match lock(&state.planners).get(&user_id) {
        Some(planner) => planner.store().codes(),
        None => return not_signed_in(&user_id),
    };

    if let Err(e) = transcript::validate_upload(&mime, body.len()) {
        return fail(StatusCode::BAD_REQUEST, e.to_string());
    }

    let Some(tools) = state.transcript.clone() else {
        return fail(StatusCode::SERVICE_UNAVAILABLE, "Transcript analysis is not configured");
    };

    let catalog = state.catalog.clone();
    let analyzed = tokio::task::spawn_blocking(move || {
        transcript::analyze_upload(
            &mime,
            &body,
            &catalog,
            completed,
            tools.extractor.as_ref(),
            tools.analyzer.as_ref(),
        )
    })
    .await;

    let records = match analyzed {
        Ok(Ok(records)) => records,
        Ok(Err(e @ TranscriptError::Upload(_))) => return fail(StatusCode::BAD_REQUEST, e.to_string()),
        Ok(Err(e @ TranscriptError::MalformedResponse(_))) => {
            return fail(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        }
        Ok(Err(e)) => {
            warn!(user = %user_id, "transcript analysis failed: {}", e);
            return fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
        Err(e) => {
            error!("transcript task failed: {}", e);
            return fail(StatusCode::INTERNAL_SERVER_ERROR, "Failed to analyze transcript");
        }
    };

    let (outcome, ops) = {
        let mut planners = lock(&state.planners);
        let Some(planner) = planners.get_mut(&user_id) else {
            return not_signed_in(&user_id);
        };
        let outcome = planner.apply_identified_courses(records);
        (outcome, planner.drain_outbox())
    };

    state.enqueue(ops);
    ok(outcome)
}

/// GET /api/sync - Sync queue status
async fn get_sync_status(State(state): State<AppState>) -> Response {
    ok(state.sync_status())
}

/// GET /api/calendar/upcoming?count=N - Upcoming academic dates
async fn upcoming_events(State(state): State<AppState>, Query(query): Query<UpcomingQuery>) -> Response {
    let count = query.count.unwrap_or(DEFAULT_UPCOMING).min(MAX_UPCOMING);
    let today = chrono::Local::now().date_naive();
    ok(state.calendar.upcoming_events(today, count))
}

/// POST /api/create-checkout-session - Start a donation checkout
async fn create_checkout_session(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Response {
    if let Err(e) = request.validate() {
        return fail(StatusCode::BAD_REQUEST, e.to_string());
    }

    let Some(provider) = state.checkout.clone() else {
        return fail(StatusCode::SERVICE_UNAVAILABLE, PaymentError::NotConfigured.to_string());
    };

    let created = tokio::task::spawn_blocking(move || {
        payments::create_checkout(&request, Some(provider.as_ref()))
    })
    .await;

    match created {
        Ok(Ok(id)) => ok(CheckoutResponse { id }),
        Ok(Err(e)) => {
            warn!("checkout failed: {}", e);
            fail(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create payment session")
        }
        Err(e) => {
            error!("checkout task failed: {}", e);
            fail(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create payment session")
        }
    }
}

/// POST /api/webhook - Payment processor callbacks
async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let Some(secret) = state.webhook_secret.as_deref() else {
        return fail(StatusCode::SERVICE_UNAVAILABLE, PaymentError::NotConfigured.to_string());
    };

    let Some(signature) = headers.get("stripe-signature").and_then(|v| v.to_str().ok()) else {
        return fail(StatusCode::BAD_REQUEST, "Webhook Error: missing signature");
    };

    let now = chrono::Utc::now().timestamp();
    match payments::parse_webhook(&body, signature, secret, state.webhook_tolerance_secs, now) {
        Ok(event) => {
            payments::handle_webhook_event(&event);
            ok(WebhookAck { received: true })
        }
        Err(e) => fail(StatusCode::BAD_REQUEST, format!("Webhook Error: {}", e)),
    }
}

// ============================================================================
// ROUTER & SYNC WORKER
// ============================================================================

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/catalog", get(get_catalog))
        .route("/users/:user_id/session", post(sign_in).delete(sign_out))
        .route("/users/:user_id/progress", get(get_progress))
        .route("/users/:user_id/courses", post(add_course))
        .route("/users/:user_id/courses/:code", delete(remove_course))
        .route("/users/:user_id/transcript", post(apply_transcript))
        .route(
            "/users/:user_id/transcript/upload",
            // Slightly above the upload limit so oversize files get a validation error
            post(upload_transcript).layer(DefaultBodyLimit::max(transcript::MAX_UPLOAD_BYTES + 1)),
        )
        .route("/sync", get(get_sync_status))
        .route("/calendar/upcoming", get(upcoming_events))
        .route("/create-checkout-session", post(create_checkout_session))
        .route("/webhook", post(webhook))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Drain the sync queue in the background.
///
/// Sleeps on the notifier while idle and for the policy delay after a failure.
/// The queue lock is released while a write is in flight, so handlers can keep
/// enqueueing and reading status.
pub fn spawn_sync_worker(state: AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("sync worker started");
        loop {
            let queue = state.sync.clone();
            let backend = state.backend.clone();
            let step =
                tokio::task::spawn_blocking(move || sync::attempt_shared(&queue, backend.as_ref())).await;

            match step {
                Ok(SyncStep::Idle) => {
                    if lock(&state.sync).pending_len() == 0 {
                        state.sync_notify.notified().await;
                    }
                }
                Ok(SyncStep::Retry { delay, .. }) => tokio::time::sleep(delay).await,
                Ok(SyncStep::Applied(_)) | Ok(SyncStep::Abandoned(_)) => {}
                Err(e) => {
                    error!("sync task failed: {}", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    })
}
