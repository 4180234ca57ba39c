//! HTTP API: account management, the search endpoint and history listing

use crate::auth::{self, AuthUser};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use engine::{run_search, SearchError, SearchResponse};
use persistence::repository::{HistoryRepository, SessionRepository, UserRepository};
use persistence::{Database, DbError};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
}

type ApiError = (StatusCode, Json<Value>);

/// All `/api` routes
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api_health))
        .route("/register", post(api_register))
        .route("/login", post(api_login))
        .route("/logout", post(api_logout))
        .route("/search", post(api_search))
        .route("/history", get(api_history))
        .with_state(state)
}

fn store_error(err: DbError) -> ApiError {
    error!("store failure: {err}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Database error" })),
    )
}

fn username_taken() -> ApiError {
    (
        StatusCode::CONFLICT,
        Json(json!({ "error": "Username already exists" })),
    )
}

fn internal_error() -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error" })),
    )
}

/// GET /api/health
async fn api_health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "drugsearch",
        "version": APP_VERSION,
    }))
}

// ============================================================================
// Accounts
// ============================================================================

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RegisterRequest {
    username: String,
    password: String,
}

/// POST /api/register
async fn api_register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let username = request.username.trim().to_string();
    if username.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Username is required" })),
        ));
    }
    if request.password.len() < MIN_PASSWORD_LENGTH {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Password must be at least 6 characters" })),
        ));
    }

    let users = UserRepository::new(state.db.pool());
    if users
        .find_by_username(&username)
        .await
        .map_err(store_error)?
        .is_some()
    {
        return Err(username_taken());
    }

    // Hashing is CPU-bound; keep it off the async workers
    let password = request.password;
    let password_hash = tokio::task::spawn_blocking(move || auth::hash_password(&password))
        .await
        .map_err(|_| internal_error())?;

    // The pre-check above races with concurrent registrations; the UNIQUE
    // constraint on username is the authority, so its violation is still 409.
    let user_id = users
        .create(&username, &password_hash)
        .await
        .map_err(|e| {
            if e.is_unique_violation() {
                username_taken()
            } else {
                store_error(e)
            }
        })?;
    info!(user_id, username = %username, "account registered");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Registered successfully" })),
    ))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct LoginRequest {
    username: String,
    password: String,
}

/// POST /api/login — issues a bearer token on success
async fn api_login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let invalid = || {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Invalid username or password" })),
        )
    };

    let user = UserRepository::new(state.db.pool())
        .find_by_username(request.username.trim())
        .await
        .map_err(store_error)?
        .ok_or_else(invalid)?;

    let password = request.password;
    let stored = user.password_hash.clone();
    let verified = tokio::task::spawn_blocking(move || auth::verify_password(&password, &stored))
        .await
        .map_err(|_| internal_error())?;
    if !verified {
        return Err(invalid());
    }

    let token = auth::generate_token();
    SessionRepository::new(state.db.pool())
        .create(&token, user.id)
        .await
        .map_err(store_error)?;
    info!(user_id = user.id, "login");

    Ok(Json(json!({
        "token": token,
        "username": user.username,
    })))
}

/// POST /api/logout — invalidates the presented token
async fn api_logout(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Value>, ApiError> {
    SessionRepository::new(state.db.pool())
        .delete(&user.token)
        .await
        .map_err(store_error)?;

    Ok(Json(json!({ "message": "Logged out" })))
}

// ============================================================================
// Search & history
// ============================================================================

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchRequest {
    sickness: String,
}

fn search_error_response(err: SearchError) -> ApiError {
    match err {
        SearchError::EmptyQuery => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Please enter a condition" })),
        ),
        SearchError::NoMatches => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "No drugs found for this condition" })),
        ),
        SearchError::Store(e) => {
            error!("search store failure: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Database error" })),
            )
        }
        SearchError::Serialize(e) => {
            error!("search serialization failure: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Database error" })),
            )
        }
    }
}

/// POST /api/search — the core aggregation endpoint
async fn api_search(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    run_search(state.db.pool(), user.id, &request.sickness)
        .await
        .map(Json)
        .map_err(search_error_response)
}

/// GET /api/history — the caller's past searches, newest first
async fn api_history(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Value>, ApiError> {
    let entries = HistoryRepository::new(state.db.pool())
        .list_for_user(user.id)
        .await
        .map_err(store_error)?;

    let history: Vec<Value> = entries
        .iter()
        .map(|e| {
            let results: Value =
                serde_json::from_str(&e.results_json).unwrap_or(Value::Array(Vec::new()));
            json!({
                "id": e.id,
                "sickness": e.sickness,
                "results": results,
                "timestamp": e.timestamp,
            })
        })
        .collect();

    Ok(Json(json!({ "history": history })))
}
