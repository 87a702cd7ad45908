//! On-chain payment verification.
//!
//! A purchase names the transaction that paid for it. Before the purchase is
//! recorded, a [`TransferVerifier`] checks that the transaction is mined,
//! succeeded, has enough confirmations, and contains an ERC-20 `Transfer` of
//! the payment token from the buyer's wallet to the treasury for at least the
//! stated amount.

pub mod rpc;

pub use rpc::RpcTransferVerifier;

use crate::error::AppError;
use alloy_primitives::U256;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;

/// keccak256("Transfer(address,address,uint256)")
pub const TRANSFER_TOPIC: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

/// What the buyer claims to have paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedTransfer {
    /// Lower-case transaction hash
    pub tx_hash: String,
    /// Canonical address of the paying wallet
    pub payer: String,
    /// Amount in whole tokens (e.g. `2` for 2 USDC)
    pub amount: Decimal,
}

/// A transfer that satisfied an [`ExpectedTransfer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedTransfer {
    pub block_number: u64,
    pub confirmations: u64,
    /// Transferred value in the token's smallest unit
    pub value: U256,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PaymentError {
    #[error("Transaction not found or still pending")]
    NotFound,

    #[error("Transaction has {confirmations} confirmations, {required} required")]
    Unconfirmed { confirmations: u64, required: u64 },

    #[error("Transaction failed on chain")]
    Reverted,

    #[error("Transaction does not transfer the payment token from this wallet to the treasury")]
    NoMatchingTransfer,

    #[error("Transferred amount is below the purchase amount")]
    Insufficient,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Chain RPC error: {0}")]
    Rpc(String),
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Rpc(msg) => AppError::Internal(format!("Chain RPC error: {}", msg)),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

/// Checks claimed payments against chain data.
#[async_trait]
pub trait TransferVerifier: Send + Sync {
    async fn verify(&self, expected: &ExpectedTransfer) -> Result<VerifiedTransfer, PaymentError>;
}

/// A log entry of a transaction receipt.
#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptLog {
    pub address: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: String,
}

/// Convert a whole-token amount into the token's smallest unit.
///
/// Fails for non-positive amounts and for amounts with more decimal places
/// than the token supports.
pub fn to_token_units(amount: Decimal, decimals: u32) -> Result<U256, PaymentError> {
    if amount <= Decimal::ZERO {
        return Err(PaymentError::InvalidAmount(format!(
            "{} is not positive",
            amount
        )));
    }

    let amount = amount.normalize();
    let scale = amount.scale();
    if scale > decimals {
        return Err(PaymentError::InvalidAmount(format!(
            "{} has more than {} decimal places",
            amount, decimals
        )));
    }

    let mantissa = u128::try_from(amount.mantissa())
        .map_err(|_| PaymentError::InvalidAmount(amount.to_string()))?;
    let factor = U256::from(10u8).pow(U256::from(decimals - scale));

    Ok(U256::from(mantissa) * factor)
}

/// Find a `Transfer` of `token` from `payer` to `treasury` worth at least
/// `min_value`, returning its value.
///
/// All addresses are compared in lower case.
pub fn match_transfer(
    logs: &[ReceiptLog],
    token: &str,
    payer: &str,
    treasury: &str,
    min_value: U256,
) -> Result<U256, PaymentError> {
    let mut found_smaller = false;

    for log in logs {
        if !log.address.eq_ignore_ascii_case(token) || log.topics.len() != 3 {
            continue;
        }
        if !log.topics[0].eq_ignore_ascii_case(TRANSFER_TOPIC) {
            continue;
        }

        let (Some(from), Some(to)) = (topic_address(&log.topics[1]), topic_address(&log.topics[2]))
        else {
            continue;
        };
        if from != payer.to_ascii_lowercase() || to != treasury.to_ascii_lowercase() {
            continue;
        }

        let Some(value) = word_value(&log.data) else {
            continue;
        };
        if value >= min_value {
            return Ok(value);
        }
        found_smaller = true;
    }

    if found_smaller {
        Err(PaymentError::Insufficient)
    } else {
        Err(PaymentError::NoMatchingTransfer)
    }
}

/// Address held in the low 20 bytes of an indexed topic.
fn topic_address(topic: &str) -> Option<String> {
    let hex = topic.strip_prefix("0x")?;
    if hex.len() != 64 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("0x{}", hex[24..].to_ascii_lowercase()))
}

/// Unsigned 256-bit value of a single-word data field.
fn word_value(data: &str) -> Option<U256> {
    let hex = data.strip_prefix("0x")?;
    if hex.len() != 64 {
        return None;
    }
    U256::from_str_radix(hex, 16).ok()
}
