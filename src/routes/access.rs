//! Course access endpoint.

use crate::access::has_access;
use crate::auth::middleware::{AppState, AuthSession};
use crate::error::AppError;
use crate::models::AccessResponse;
use crate::routes::validate_course_id;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};

/// GET /api/courses/{course_id}/access — Whether the caller owns a course
pub async fn course_access(
    session: AuthSession,
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    validate_course_id(&course_id)?;

    let mut con = state.redis_connection().await?;
    let has_access = has_access(&mut con, &session.user_id, &course_id).await?;

    Ok(Json(AccessResponse {
        course_id,
        has_access,
    }))
}
