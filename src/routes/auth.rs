//! Auth API endpoints.

use crate::auth::cookie::{clear_session_cookie, session_cookie};
use crate::auth::middleware::{enforce_rate_limit, AppState, AuthSession};
use crate::auth::session::{challenge_message, generate_challenge_nonce, LOGIN_MESSAGE};
use crate::auth::verify::verify_wallet_signature;
use crate::error::AppError;
use crate::models::{
    ChallengeRequest, ChallengeResponse, CurrentUserResponse, LoginResponse, StoredChallenge,
    WalletLoginRequest,
};
use crate::routes::{parse_nonce, parse_wallet_address, require_field};
use crate::storage;
use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use std::net::SocketAddr;

/// POST /api/auth/challenge — Request a single-use login message
pub async fn request_challenge(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Result<Json<ChallengeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    enforce_rate_limit(&state, "auth", addr.ip(), state.config.rate_limit_auth_per_min).await?;

    let Json(req) = body?;
    let address = parse_wallet_address(require_field(&req.wallet_address, "walletAddress")?)?;

    let nonce = generate_challenge_nonce();
    let challenge = StoredChallenge {
        nonce: nonce.clone(),
        wallet_address: address.clone(),
        created_at: unix_now(),
    };

    let mut con = state.redis_connection().await?;
    storage::session::store_challenge(&mut con, &challenge, state.config.challenge_ttl_secs)
        .await?;

    tracing::info!(action = "challenge_issued", wallet = %address, "Login challenge issued");

    Ok(Json(ChallengeResponse {
        message: challenge_message(&address, &nonce),
        nonce,
        expires_in: state.config.challenge_ttl_secs,
    }))
}

/// POST /api/auth/login/wallet — Verify a wallet signature and start a session
pub async fn login_wallet(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Result<Json<WalletLoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    enforce_rate_limit(&state, "auth", addr.ip(), state.config.rate_limit_auth_per_min).await?;

    let Json(req) = body?;
    let claimed = require_field(&req.wallet_address, "walletAddress")?;
    let signature = require_field(&req.signature, "signature")?;
    let address = parse_wallet_address(claimed)?;

    let nonce = req.nonce.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let nonce = nonce.map(parse_nonce).transpose()?;

    let mut con = state.redis_connection().await?;

    // Consumed before verification so a nonce can never be tried twice
    let message = match nonce {
        Some(nonce) => {
            let Some(challenge) = storage::session::take_challenge(&mut con, &nonce).await? else {
                tracing::warn!(action = "auth_failed", wallet = %address, reason = "no_challenge", "Login with an unknown or expired nonce");
                return Err(challenge_not_found());
            };
            let age_secs = unix_now().saturating_sub(challenge.created_at);
            if challenge.wallet_address != address {
                tracing::warn!(action = "auth_failed", wallet = %address, issued_to = %challenge.wallet_address, age_secs, reason = "challenge_mismatch", "Nonce was issued to another wallet");
                return Err(challenge_not_found());
            }
            tracing::debug!(wallet = %address, age_secs, "Login challenge taken");
            challenge_message(&address, &challenge.nonce)
        }
        None if !state.config.require_login_challenge => LOGIN_MESSAGE.to_string(),
        None => {
            tracing::warn!(action = "auth_failed", wallet = %address, reason = "no_challenge", "Login without a challenge nonce");
            return Err(challenge_not_found());
        }
    };

    match verify_wallet_signature(&address, &message, signature) {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(action = "auth_failed", wallet = %address, reason = "signer_mismatch", "Invalid signature");
            return Err(AppError::Unauthenticated("Invalid signature".to_string()));
        }
        Err(e) => {
            tracing::warn!(action = "auth_failed", wallet = %address, reason = "malformed_signature", error = %e, "Invalid signature");
            return Err(AppError::Unauthenticated("Invalid signature".to_string()));
        }
    }

    let resolved = storage::user::find_or_create_user(&mut con, &address)
        .await?
        .ok_or_else(|| {
            AppError::Internal(format!("Wallet {} is claimed by a missing user", address))
        })?;
    let user = resolved.user;

    if resolved.created {
        tracing::info!(action = "user_created", user_id = %user.id, wallet = %user.wallet_address, "New user created on first login");
    }

    let session = state.sessions.issue(&user.id, &user.wallet_address)?;
    let cookie = session_cookie(
        &session.token,
        state.sessions.ttl_secs(),
        state.config.cookie_secure,
    );

    tracing::info!(action = "auth_success", user_id = %user.id, wallet = %user.wallet_address, "User authenticated");

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            user: user.summary(),
        }),
    ))
}

fn challenge_not_found() -> AppError {
    AppError::Unauthenticated("Challenge not found or expired".to_string())
}

fn unix_now() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

/// POST /api/auth/logout — Clear the session cookie
///
/// Always succeeds. With logout revocation enabled, a valid session's token
/// id is also denylisted for the rest of its lifetime.
pub async fn logout(
    State(state): State<AppState>,
    session: Option<AuthSession>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(session) = &session {
        if state.config.revoke_on_logout {
            let remaining = session.expires_at.saturating_sub(Utc::now().timestamp());
            let mut con = state.redis_connection().await?;
            storage::session::revoke_session(
                &mut con,
                &session.token_id,
                u64::try_from(remaining).unwrap_or(0),
            )
            .await?;
        }
        tracing::info!(action = "logout", user_id = %session.user_id, "User logged out");
    }

    Ok((
        [(
            header::SET_COOKIE,
            clear_session_cookie(state.config.cookie_secure),
        )],
        Json(serde_json::json!({ "message": "Logged out" })),
    ))
}

/// GET /api/auth/me — The authenticated user
pub async fn me(
    session: AuthSession,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let mut con = state.redis_connection().await?;

    let user = storage::user::get_user(&mut con, &session.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(CurrentUserResponse { user }))
}
