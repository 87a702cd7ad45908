//! Purchase ledger endpoints.

use crate::auth::middleware::{AppState, AuthSession};
use crate::error::AppError;
use crate::models::{PurchaseListResponse, PurchaseResponse, RecordPurchaseRequest};
use crate::payment::ExpectedTransfer;
use crate::routes::{parse_tx_hash, require_field, validate_course_id};
use crate::storage;
use crate::storage::purchase::RecordOutcome;
use axum::{extract::rejection::JsonRejection, extract::State, response::IntoResponse, Json};
use rust_decimal::Decimal;
use std::str::FromStr;

/// GET /api/purchases — The caller's purchases, newest first
pub async fn list_purchases(
    session: AuthSession,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let mut con = state.redis_connection().await?;
    let purchases = storage::purchase::list_purchases(&mut con, &session.user_id).await?;

    Ok(Json(PurchaseListResponse { purchases }))
}

/// POST /api/purchases — Record a paid course purchase
pub async fn record_purchase(
    session: AuthSession,
    State(state): State<AppState>,
    body: Result<Json<RecordPurchaseRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = body?;

    let course_id = require_field(&req.course_id, "courseId")?;
    validate_course_id(course_id)?;
    let tx_hash = parse_tx_hash(require_field(&req.tx_hash, "txHash")?)?;
    let amount = parse_amount(require_field(&req.amount, "amount")?, state.config.course_price)?;

    let mut con = state.redis_connection().await?;

    // Cheap rejection before asking the chain; the atomic record below is
    // still what guarantees uniqueness.
    if storage::purchase::has_purchase(&mut con, &session.user_id, course_id).await? {
        return Err(rejected(&session, course_id, &tx_hash, ALREADY_PURCHASED));
    }

    let verified = match &state.payments {
        Some(verifier) => {
            let expected = ExpectedTransfer {
                tx_hash: tx_hash.clone(),
                payer: session.wallet_address.clone(),
                amount,
            };
            match verifier.verify(&expected).await {
                Ok(transfer) => Some(transfer),
                Err(e) => {
                    tracing::warn!(action = "purchase_rejected", user_id = %session.user_id, course_id = %course_id, tx_hash = %tx_hash, reason = %e, "Payment verification failed");
                    return Err(e.into());
                }
            }
        }
        None => None,
    };

    let outcome = storage::purchase::record_purchase(
        &mut con,
        &session.user_id,
        course_id,
        &tx_hash,
        &amount.to_string(),
    )
    .await?;

    match outcome {
        RecordOutcome::Recorded(purchase) => {
            match &verified {
                Some(transfer) => {
                    tracing::info!(action = "purchase_recorded", user_id = %session.user_id, course_id = %course_id, tx_hash = %tx_hash, amount = %purchase.amount, onchain_value = %transfer.value, block_number = transfer.block_number, confirmations = transfer.confirmations, "Purchase recorded");
                }
                None => {
                    tracing::info!(action = "purchase_recorded", user_id = %session.user_id, course_id = %course_id, tx_hash = %tx_hash, amount = %purchase.amount, verified = false, "Purchase recorded");
                }
            }
            Ok(Json(PurchaseResponse { purchase }))
        }
        RecordOutcome::AlreadyPurchased => {
            Err(rejected(&session, course_id, &tx_hash, ALREADY_PURCHASED))
        }
        RecordOutcome::TransactionReused => {
            Err(rejected(&session, course_id, &tx_hash, TRANSACTION_REUSED))
        }
    }
}

/// (log reason, client message) for ledger conflicts
const ALREADY_PURCHASED: (&str, &str) = ("already_purchased", "Course already purchased");
const TRANSACTION_REUSED: (&str, &str) = (
    "transaction_reused",
    "Transaction already used for a purchase",
);

/// Log a ledger conflict and build the matching error.
fn rejected(
    session: &AuthSession,
    course_id: &str,
    tx_hash: &str,
    (reason, message): (&str, &str),
) -> AppError {
    tracing::warn!(action = "purchase_rejected", user_id = %session.user_id, course_id = %course_id, tx_hash = %tx_hash, reason = %reason, "Purchase rejected");
    AppError::Conflict(message.to_string())
}

/// Parse a purchase amount: a positive decimal no lower than the course price.
///
/// The result is normalized, so `"2.00"` and `"2"` record the same amount.
fn parse_amount(value: &str, price: Decimal) -> Result<Decimal, AppError> {
    let amount = Decimal::from_str(value)
        .map_err(|_| AppError::BadRequest("amount must be a decimal number".to_string()))?;

    if amount <= Decimal::ZERO {
        return Err(AppError::BadRequest("amount must be positive".to_string()));
    }
    if amount < price {
        return Err(AppError::BadRequest(format!(
            "amount must be at least {}",
            price
        )));
    }

    Ok(amount.normalize())
}
