//! Session credentials and login challenges.
//!
//! Sessions are self-contained HS256 JWTs. Nothing is stored server-side
//! unless logout revocation is enabled, in which case only the token id of a
//! logged-out session is kept until the token would have expired anyway.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Fixed text every login message starts with.
pub const LOGIN_MESSAGE: &str = "Login to AI Educate Portal";

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    /// Canonical wallet address of the user
    pub wallet: String,
    /// Token id, used for logout revocation
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly minted session.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub claims: Claims,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Missing session token")]
    Missing,

    #[error("Invalid session token")]
    Invalid,

    #[error("Session expired")]
    Expired,

    #[error("Failed to sign session token: {0}")]
    Signing(String),
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Signing(msg) => AppError::Internal(msg),
            SessionError::Missing => AppError::Unauthenticated("Unauthorized".to_string()),
            SessionError::Invalid | SessionError::Expired => {
                AppError::Unauthenticated("Invalid or expired session".to_string())
            }
        }
    }
}

/// Issues and validates session tokens with a process-wide secret.
pub struct SessionManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: i64,
}

impl SessionManager {
    pub fn new(secret: &[u8], ttl_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
        }
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// Mint a session for `user_id` valid from now.
    pub fn issue(&self, user_id: &str, wallet: &str) -> Result<IssuedSession, SessionError> {
        self.issue_at(user_id, wallet, Utc::now())
    }

    /// Mint a session as if the current time were `now`.
    pub fn issue_at(
        &self,
        user_id: &str,
        wallet: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedSession, SessionError> {
        let iat = now.timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            wallet: wallet.to_string(),
            jti: nanoid::nanoid!(21),
            iat,
            exp: iat.saturating_add(self.ttl_secs),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| SessionError::Signing(e.to_string()))?;

        Ok(IssuedSession { token, claims })
    }

    /// Validate a token against the current time.
    pub fn validate(&self, token: &str) -> Result<Claims, SessionError> {
        self.validate_at(token, Utc::now())
    }

    /// Validate a token as if the current time were `now`.
    ///
    /// A token is accepted iff its signature verifies and `now < exp`. There
    /// is no leeway.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, SessionError> {
        if token.is_empty() {
            return Err(SessionError::Missing);
        }

        // Expiry is checked below against the supplied clock
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|_| SessionError::Invalid)?;

        if now.timestamp() >= data.claims.exp {
            return Err(SessionError::Expired);
        }

        Ok(data.claims)
    }
}

/// Generate a cryptographically random challenge nonce.
///
/// Returns 64 lower-case hex characters (32 random bytes).
pub fn generate_challenge_nonce() -> String {
    let mut rng = rand::rng();
    let mut bytes = [0u8; 32];
    rng.fill(&mut bytes);
    hex::encode(bytes)
}

/// Build the exact text a wallet signs to log in with a challenge nonce.
pub fn challenge_message(address: &str, nonce: &str) -> String {
    format!("{}\n\nWallet: {}\nNonce: {}", LOGIN_MESSAGE, address, nonce)
}
