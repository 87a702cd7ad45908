//! Request and response models for the API.
//!
//! All models use serde with camelCase field names on the wire.
//! Storage models represent Redis data structures and are also returned
//! directly where the API exposes the stored record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Auth Models
// ============================================================================

/// Request for a login challenge.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRequest {
    pub wallet_address: Option<String>,
}

/// Message the wallet must sign to log in.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResponse {
    pub message: String,
    pub nonce: String,
    pub expires_in: u64,
}

/// Wallet login request.
///
/// Fields are optional so that missing input surfaces as a 400 with the
/// standard error body instead of a deserialization rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletLoginRequest {
    pub wallet_address: Option<String>,
    pub signature: Option<String>, // hex, 65 bytes
    /// Nonce from `/api/auth/challenge`; absent only for legacy logins
    pub nonce: Option<String>,
}

/// Public view of a user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub wallet_address: String,
}

/// Response after successful login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserSummary,
}

/// Response for the current-user lookup.
#[derive(Debug, Serialize)]
pub struct CurrentUserResponse {
    pub user: StoredUser,
}

// ============================================================================
// Purchase Models
// ============================================================================

/// Request to record a course purchase.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPurchaseRequest {
    pub course_id: Option<String>,
    pub tx_hash: Option<String>,
    pub amount: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    pub purchase: StoredPurchase,
}

#[derive(Debug, Serialize)]
pub struct PurchaseListResponse {
    pub purchases: Vec<StoredPurchase>,
}

/// Access decision for one course.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessResponse {
    pub course_id: String,
    pub has_access: bool,
}

// ============================================================================
// Storage Models
// ============================================================================

/// User data as stored in Redis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredUser {
    pub id: String,
    /// Canonical (lower-case) wallet address
    pub wallet_address: String,
    pub created_at: DateTime<Utc>,
}

impl StoredUser {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            wallet_address: self.wallet_address.clone(),
        }
    }
}

/// Purchase record as stored in Redis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPurchase {
    pub id: String,
    pub user_id: String,
    pub course_id: String,
    /// Lower-case transaction hash
    pub tx_hash: String,
    pub amount: String,
    pub created_at: DateTime<Utc>,
}

/// Challenge data as stored in Redis, keyed by its nonce.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredChallenge {
    pub nonce: String, // hex
    /// Canonical address the challenge was issued to
    pub wallet_address: String,
    pub created_at: u64,
}
