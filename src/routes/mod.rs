//! API route handlers.

pub mod access;
pub mod auth;
pub mod purchase;

use crate::auth::middleware::{api_rate_limit, AppState};
use crate::auth::verify::canonical_address;
use crate::error::AppError;
use axum::{routing::get, routing::post, Json, Router};

/// Maximum length of a course id.
const MAX_COURSE_ID_LEN: usize = 64;

/// Return the trimmed value of a required text field.
pub fn require_field<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, AppError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::BadRequest(format!("{} is required", name))),
    }
}

/// Validate a wallet address and return its canonical form.
pub fn parse_wallet_address(value: &str) -> Result<String, AppError> {
    canonical_address(value)
        .ok_or_else(|| AppError::BadRequest("Invalid wallet address".to_string()))
}

/// Validate that a course id is 1-64 alphanumerics, hyphens or underscores.
pub fn validate_course_id(id: &str) -> Result<(), AppError> {
    if id.is_empty()
        || id.len() > MAX_COURSE_ID_LEN
        || !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AppError::BadRequest("Invalid courseId format".to_string()));
    }
    Ok(())
}

/// Validate a transaction hash and return it in lower case.
pub fn parse_tx_hash(value: &str) -> Result<String, AppError> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .ok_or_else(|| AppError::BadRequest("Invalid txHash format".to_string()))?;

    if digits.len() != 64 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AppError::BadRequest("Invalid txHash format".to_string()));
    }
    Ok(format!("0x{}", digits.to_ascii_lowercase()))
}

/// Validate a login nonce: 64 hex digits, as issued by the challenge endpoint.
pub fn parse_nonce(value: &str) -> Result<String, AppError> {
    if value.len() != 64 || !value.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AppError::BadRequest("Invalid nonce format".to_string()));
    }
    Ok(value.to_ascii_lowercase())
}

/// GET /api/health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Build the API router with all endpoints.
///
/// Every route sits behind the per-IP API rate limit, which needs the peer
/// address: serve with `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health))
        // Auth endpoints
        .route("/api/auth/challenge", post(auth::request_challenge))
        .route("/api/auth/login/wallet", post(auth::login_wallet))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        // Purchase ledger
        .route(
            "/api/purchases",
            get(purchase::list_purchases).post(purchase::record_purchase),
        )
        .route("/api/courses/{course_id}/access", get(access::course_access))
        .layer(axum::middleware::from_fn_with_state(state, api_rate_limit))
}
