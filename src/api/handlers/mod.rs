use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};

use crate::db::Database;
use crate::models::*;

const LEADERBOARD_SIZE: u32 = 10;

// ============================================================
// Error Handling
// ============================================================

/// Log an error and return a sanitized response to the client.
///
/// Validation failures raised by the database layer are exposed as-is with a
/// 4xx status. Everything else becomes an opaque 500.
fn internal_error(e: impl std::fmt::Display) -> (StatusCode, String) {
    let msg = e.to_string();

    if msg.contains("already exists") {
        tracing::warn!("Conflict: {}", msg);
        return (StatusCode::CONFLICT, msg);
    }
    if msg.contains("unknown") || msg.contains("required") {
        tracing::warn!("Validation error: {}", msg);
        return (StatusCode::BAD_REQUEST, msg);
    }

    tracing::error!("Internal error: {}", msg);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Labs
// ============================================================

pub async fn list_labs(
    State(db): State<Database>,
) -> Result<Json<Vec<LabInfo>>, (StatusCode, String)> {
    db.get_labs().map(Json).map_err(internal_error)
}

pub async fn get_lab(
    State(db): State<Database>,
    Path(id): Path<u32>,
) -> Result<Json<LabInfo>, (StatusCode, String)> {
    db.get_lab(id)
        .map_err(internal_error)?
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Lab not found".to_string()))
}

pub async fn leaderboard(
    State(db): State<Database>,
) -> Result<Json<Vec<LeaderboardEntry>>, (StatusCode, String)> {
    db.leaderboard(LEADERBOARD_SIZE)
        .map(Json)
        .map_err(internal_error)
}

// ============================================================
// Auth
// ============================================================

pub async fn signup(
    State(db): State<Database>,
    Json(input): Json<SignupInput>,
) -> Result<(StatusCode, Json<AuthResponse>), (StatusCode, String)> {
    let user = db.create_user(input).map_err(internal_error)?;
    let token = db.create_token(user.id).map_err(internal_error)?;
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

pub async fn login(
    State(db): State<Database>,
    Json(input): Json<LoginInput>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let user = db
        .verify_login(&input)
        .map_err(internal_error)?
        .ok_or_else(|| {
            tracing::warn!(username = %input.username, "failed login");
            (
                StatusCode::UNAUTHORIZED,
                "Invalid username or password".to_string(),
            )
        })?;
    let token = db.create_token(user.id).map_err(internal_error)?;
    Ok(Json(AuthResponse { token, user }))
}

pub async fn me(Extension(user): Extension<User>) -> Json<MeResponse> {
    Json(MeResponse { user })
}

// ============================================================
// Progress
// ============================================================

pub async fn get_progress(
    State(db): State<Database>,
    Extension(user): Extension<User>,
) -> Result<Json<ProgressSnapshot>, (StatusCode, String)> {
    db.get_progress(user.id).map(Json).map_err(internal_error)
}

pub async fn record_step(
    State(db): State<Database>,
    Extension(user): Extension<User>,
    Json(input): Json<RecordStepInput>,
) -> Result<Json<RecordStepResponse>, (StatusCode, String)> {
    db.record_step(user.id, input)
        .map(Json)
        .map_err(internal_error)
}
