// 🌐 HTTP API - axum router over the chat engine, accounts, history and tips
// Database and CPU work runs on the blocking pool; the mutex is never held across an await.

use crate::auth::{self, AuthError, Credentials, NewUser};
use crate::chat::{ChatEngine, ChatError, ChatRequest};
use crate::config::AuthConfig;
use crate::db::{StoreError, User};
use crate::knowledge::KnowledgeBase;
use crate::wellness::{tip_for, WellnessTip};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, Request, State,
    },
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Datelike;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::Instrument;
use uuid::Uuid;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub knowledge: Arc<KnowledgeBase>,
    pub engine: Arc<ChatEngine>,
    pub auth: AuthConfig,
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
    pub code: &'static str,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Invalid credentials")]
    Unauthorized,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, detail) = match self {
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "Invalid credentials".to_string(),
            ),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail),
            ApiError::Conflict(detail) => (StatusCode::CONFLICT, "CONFLICT", detail),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { detail, code })).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ApiError::NotFound(format!("{} not found", what)),
            StoreError::Duplicate(what) => ApiError::Conflict(format!("{} already exists", what)),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidInput(detail) => ApiError::BadRequest(detail),
            AuthError::UsernameTaken | AuthError::EmailTaken => ApiError::Conflict(err.to_string()),
            AuthError::InvalidCredentials => ApiError::Unauthorized,
            AuthError::Store(e) => e.into(),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::MessageTooLong { .. } => ApiError::BadRequest(err.to_string()),
            ChatError::LockPoisoned => ApiError::Internal(err.to_string()),
            ChatError::Store(e) => e.into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

fn lock_db(db: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, ApiError> {
    db.lock()
        .map_err(|_| ApiError::Internal("database lock poisoned".to_string()))
}

/// Run blocking work on the blocking pool inside the current request span
async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let span = tracing::Span::current();
    tokio::task::spawn_blocking(move || span.in_scope(work))
        .await
        .map_err(|e| ApiError::Internal(format!("worker task failed: {}", e)))?
}

// ============================================================================
// RESPONSES
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub knowledge_entries: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryItem {
    pub sender: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub username: String,
    pub language: String,
    pub history: Vec<HistoryItem>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /api/health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        knowledge_entries: state.knowledge.len(),
    })
}

/// POST /chat and POST /api/chat
async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload?;
    let reply = run_blocking(move || {
        state
            .engine
            .handle(&state.db, &state.knowledge, &request)
            .map_err(ApiError::from)
    })
    .await?;

    tracing::info!(
        kind = ?reply.kind,
        score = reply.score,
        persisted = reply.persisted,
        "chat reply sent"
    );
    Ok(Json(ChatResponse {
        response: reply.response,
    }))
}

/// GET /api/history/:username?limit=N
async fn history(
    State(state): State<AppState>,
    Path(username): Path<String>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let Query(query) = query?;
    let history = run_blocking(move || {
        let conn = lock_db(&state.db)?;
        state
            .engine
            .history(&conn, &username, query.limit)
            .map_err(ApiError::from)
    })
    .await?;

    Ok(Json(HistoryResponse {
        username: history.user.username,
        language: history.user.language,
        history: history
            .turns
            .into_iter()
            .map(|turn| HistoryItem {
                sender: turn.sender.as_str().to_string(),
                message: turn.message,
            })
            .collect(),
    }))
}

/// POST /api/register
async fn register(
    State(state): State<AppState>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let Json(new_user) = payload?;
    let user = run_blocking(move || {
        let conn = lock_db(&state.db)?;
        auth::register(&conn, &state.auth, &new_user).map_err(ApiError::from)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/login
async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(credentials) = payload?;
    let user = run_blocking(move || {
        let conn = lock_db(&state.db)?;
        auth::authenticate(&conn, &credentials).map_err(ApiError::from)
    })
    .await?;

    Ok(Json(LoginResponse {
        message: "Login successful",
        user,
    }))
}

/// POST /api/reset-password
async fn reset_password(
    State(state): State<AppState>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = payload?;
    run_blocking(move || {
        let conn = lock_db(&state.db)?;
        auth::reset_password(&conn, &state.auth, &request.email, &request.new_password)
            .map_err(ApiError::from)
    })
    .await?;

    Ok(Json(MessageResponse {
        message: "Password updated successfully".to_string(),
    }))
}

/// GET /api/tips/:category
async fn wellness_tip(Path(category): Path<String>) -> Json<WellnessTip> {
    let rotation = chrono::Utc::now().ordinal0() as usize;
    Json(tip_for(&category, rotation))
}

/// Tag every request with an id so its log lines can be correlated
async fn trace_request(request: Request, next: Next) -> Response {
    let span = tracing::info_span!(
        "request",
        request_id = %Uuid::new_v4(),
        method = %request.method(),
        path = %request.uri().path(),
    );

    async move {
        let response = next.run(request).await;
        tracing::debug!(status = response.status().as_u16(), "request finished");
        response
    }
    .instrument(span)
    .await
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/chat", post(chat))
        .route("/api/chat", post(chat))
        .route("/api/history/:username", get(history))
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/reset-password", post(reset_password))
        .route("/api/tips/:category", get(wellness_tip))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(trace_request))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db::{setup_database, KnowledgeEntry};
    use crate::translation::DisabledTranslator;
    use axum::body::{to_bytes, Body};
    use axum::http::Request as HttpRequest;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let config = AppConfig::default();
        let engine = ChatEngine::new(&config, Arc::new(DisabledTranslator)).unwrap();
        let knowledge = KnowledgeBase::from_entries(vec![
            KnowledgeEntry {
                id: 1,
                question: "what is diabetes".to_string(),
                answer: "Diabetes is high blood sugar.".to_string(),
            },
            KnowledgeEntry {
                id: 2,
                question: "how much water should i drink".to_string(),
                answer: "About eight glasses a day.".to_string(),
            },
        ]);

        AppState {
            db: Arc::new(Mutex::new(conn)),
            knowledge: Arc::new(knowledge),
            engine: Arc::new(engine),
            auth: AuthConfig {
                pbkdf2_iterations: 1_000,
            },
        }
    }

    fn post_json(uri: &str, body: Value) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> HttpRequest<Body> {
        HttpRequest::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn register_alice(app: &Router) {
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/register",
                json!({
                    "username": "alice",
                    "email": "alice@example.com",
                    "password": "s3cret-pass",
                    "language": "en"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn health_reports_knowledge_size() {
        let app = router(test_state());
        let response = app.oneshot(get_request("/api/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["knowledge_entries"], 2);
    }

    #[tokio::test]
    async fn guest_chat_gets_answer() {
        let app = router(test_state());
        let response = app
            .oneshot(post_json("/chat", json!({ "message": "What is Diabetes?" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["response"], "Diabetes is high blood sugar.");
    }

    #[tokio::test]
    async fn blank_message_gets_fallback_reply() {
        let app = router(test_state());
        let response = app
            .oneshot(post_json("/api/chat", json!({ "message": "  " })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await["response"],
            crate::composer::NO_MATCH_REPLY
        );
    }

    #[tokio::test]
    async fn oversized_message_is_bad_request() {
        let app = router(test_state());
        let message = "a".repeat(2_001);
        let response = app
            .oneshot(post_json("/chat", json!({ "message": message })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "BAD_REQUEST");
        assert!(body["detail"].as_str().unwrap().contains("2000"));
    }

    #[tokio::test]
    async fn malformed_chat_body_uses_error_shape() {
        let app = router(test_state());
        let response = app
            .oneshot(post_json("/chat", json!({ "user": "alice" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "BAD_REQUEST");
        assert!(body["detail"].as_str().unwrap().contains("message"));
    }

    #[tokio::test]
    async fn bad_history_limit_uses_error_shape() {
        let app = router(test_state());
        register_alice(&app).await;

        let response = app
            .oneshot(get_request("/api/history/alice?limit=abc"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn registered_chat_shows_up_in_history() {
        let app = router(test_state());
        register_alice(&app).await;

        for message in ["What is Diabetes?", "how much water should I drink"] {
            let response = app
                .clone()
                .oneshot(post_json("/chat", json!({ "user": "alice", "message": message })))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .clone()
            .oneshot(get_request("/api/history/alice?limit=10"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let history = body["history"].as_array().unwrap();
        assert_eq!(body["username"], "alice");
        assert_eq!(history.len(), 4);
        assert_eq!(history[0]["sender"], "user");
        assert_eq!(history[0]["message"], "What is Diabetes?");
        assert_eq!(history[3]["sender"], "bot");
        assert_eq!(history[3]["message"], "About eight glasses a day.");

        let limited = app
            .oneshot(get_request("/api/history/alice?limit=1"))
            .await
            .unwrap();
        let body = body_json(limited).await;
        assert_eq!(body["history"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_user_history_is_404() {
        let app = router(test_state());
        let response = app.oneshot(get_request("/api/history/ghost")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["code"], "NOT_FOUND");
        assert!(body["detail"].as_str().unwrap().contains("ghost"));
    }

    #[tokio::test]
    async fn duplicate_registration_is_conflict() {
        let app = router(test_state());
        register_alice(&app).await;

        let response = app
            .oneshot(post_json(
                "/api/register",
                json!({
                    "username": "alice",
                    "email": "other@example.com",
                    "password": "s3cret-pass"
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn login_and_password_reset() {
        let app = router(test_state());
        register_alice(&app).await;

        let ok = app
            .clone()
            .oneshot(post_json(
                "/api/login",
                json!({ "email": "alice@example.com", "password": "s3cret-pass" }),
            ))
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
        let body = body_json(ok).await;
        assert_eq!(body["user"]["username"], "alice");
        assert!(body["user"].get("password_hash").is_none());

        let reset = app
            .clone()
            .oneshot(post_json(
                "/api/reset-password",
                json!({ "email": "alice@example.com", "new_password": "fresh-pass-1" }),
            ))
            .await
            .unwrap();
        assert_eq!(reset.status(), StatusCode::OK);

        let stale = app
            .oneshot(post_json(
                "/api/login",
                json!({ "username": "alice", "password": "s3cret-pass" }),
            ))
            .await
            .unwrap();
        assert_eq!(stale.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(stale).await["code"], "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn tips_endpoint_includes_safety_note() {
        let app = router(test_state());
        let response = app.oneshot(get_request("/api/tips/hydration")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["category"], "hydration");
        assert!(!body["citations"].as_array().unwrap().is_empty());
        assert_eq!(body["safety_note"], crate::wellness::SAFETY_NOTE);
    }
}
