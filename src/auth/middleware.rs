//! Axum extractors for authentication and rate limiting.

use crate::auth::cookie;
use crate::auth::session::SessionManager;
use crate::config::Config;
use crate::error::AppError;
use crate::payment::TransferVerifier;
use crate::storage;
use axum::{
    extract::{ConnectInfo, FromRequestParts, OptionalFromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use redis::AsyncCommands;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub redis: redis::Client,
    pub config: Arc<Config>,
    pub sessions: Arc<SessionManager>,
    /// `None` when on-chain payment verification is disabled
    pub payments: Option<Arc<dyn TransferVerifier>>,
}

impl AppState {
    pub async fn redis_connection(
        &self,
    ) -> Result<redis::aio::MultiplexedConnection, AppError> {
        self.redis
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Internal(format!("Redis connection error: {}", e)))
    }
}

/// Authenticated session extractor.
///
/// Reads the session token from the `token` cookie (or `Authorization: Bearer`),
/// validates its signature and expiry, and when logout revocation is enabled
/// checks it against the denylist. Rejects with 401 otherwise; the handler is
/// never invoked.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: String,
    pub wallet_address: String,
    pub token_id: String,
    /// Unix timestamp (seconds) at which the token stops being accepted
    pub expires_at: i64,
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = cookie::session_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthenticated("Unauthorized".to_string()))?;

        let claims = state.sessions.validate(&token)?;

        if state.config.revoke_on_logout {
            let mut con = state.redis_connection().await?;
            if storage::session::is_session_revoked(&mut con, &claims.jti).await? {
                return Err(AppError::Unauthenticated(
                    "Invalid or expired session".to_string(),
                ));
            }
        }

        Ok(AuthSession {
            user_id: claims.sub,
            wallet_address: claims.wallet,
            token_id: claims.jti,
            expires_at: claims.exp,
        })
    }
}

/// Optional authenticated session extractor.
///
/// Yields `Some(AuthSession)` for a valid session and `None` otherwise; a
/// missing or invalid session does not fail the request.
impl OptionalFromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        match <AuthSession as FromRequestParts<AppState>>::from_request_parts(parts, state).await {
            Ok(session) => Ok(Some(session)),
            Err(AppError::Unauthenticated(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Check rate limit using Redis INCR with TTL.
///
/// # Arguments
/// * `con` - Redis connection
/// * `key` - Rate limit key (e.g., "ratelimit:auth:127.0.0.1")
/// * `max` - Maximum requests allowed in window
/// * `window_secs` - Time window in seconds
///
/// # Returns
/// * `Ok(true)` if under limit
/// * `Ok(false)` if limit exceeded
pub async fn check_rate_limit<C>(
    con: &mut C,
    key: &str,
    max: u32,
    window_secs: u64,
) -> Result<bool, redis::RedisError>
where
    C: AsyncCommands,
{
    let count: u32 = con.incr(key, 1).await?;

    // Set TTL on first request
    if count == 1 {
        con.expire::<_, ()>(key, window_secs as i64).await?;
    }

    Ok(count <= max)
}

/// Enforce a per-IP limit for one bucket, logging a hashed IP when exceeded.
pub async fn enforce_rate_limit(
    state: &AppState,
    bucket: &str,
    ip: IpAddr,
    max_per_min: u32,
) -> Result<(), AppError> {
    let mut con = state.redis_connection().await?;

    let key = format!("ratelimit:{}:{}", bucket, ip);
    let allowed = check_rate_limit(&mut con, &key, max_per_min, 60)
        .await
        .map_err(|e| AppError::Internal(format!("Rate limit check failed: {}", e)))?;

    if !allowed {
        tracing::warn!(action = "rate_limited", bucket = %bucket, ip_hash = %hash_ip(ip), "Rate limit exceeded");
        return Err(AppError::RateLimited);
    }
    Ok(())
}

/// Middleware applying the general API rate limit to every request.
pub async fn api_rate_limit(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    enforce_rate_limit(&state, "api", addr.ip(), state.config.rate_limit_api_per_min).await?;
    Ok(next.run(request).await)
}

/// Non-reversible tag for an IP address, for logs.
fn hash_ip(ip: IpAddr) -> String {
    let mut hasher = std::hash::DefaultHasher::new();
    ip.hash(&mut hasher);
    format!("{:x}", hasher.finish())
}
