//! Transfer verification against an Ethereum-compatible JSON-RPC node.

use super::{
    match_transfer, to_token_units, ExpectedTransfer, PaymentError, ReceiptLog, TransferVerifier,
    VerifiedTransfer,
};
use crate::config::PaymentConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Verifies transfers with `eth_getTransactionReceipt` and `eth_blockNumber`.
pub struct RpcTransferVerifier {
    client: reqwest::Client,
    config: PaymentConfig,
}

#[derive(Serialize)]
struct JsonRpcRequest<T> {
    jsonrpc: &'static str,
    method: &'static str,
    params: T,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionReceipt {
    /// `None` while the transaction is pending on some nodes
    block_number: Option<String>,
    status: Option<String>,
    #[serde(default)]
    logs: Vec<ReceiptLog>,
}

impl RpcTransferVerifier {
    pub fn new(config: PaymentConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PaymentError::Rpc(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Make a JSON-RPC call. A `null` result is returned as `None`.
    async fn rpc_call<T, R>(&self, method: &'static str, params: T) -> Result<Option<R>, PaymentError>
    where
        T: Serialize,
        R: for<'de> Deserialize<'de>,
    {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: 1,
        };

        let response = self
            .client
            .post(&self.config.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| PaymentError::Rpc(format!("{} request failed: {}", method, e)))?;

        let rpc_response: JsonRpcResponse<R> = response
            .json()
            .await
            .map_err(|e| PaymentError::Rpc(format!("Failed to parse {} response: {}", method, e)))?;

        if let Some(error) = rpc_response.error {
            return Err(PaymentError::Rpc(format!(
                "{} error {}: {}",
                method, error.code, error.message
            )));
        }

        Ok(rpc_response.result)
    }

    async fn latest_block(&self) -> Result<u64, PaymentError> {
        let result: String = self
            .rpc_call("eth_blockNumber", Vec::<String>::new())
            .await?
            .ok_or_else(|| PaymentError::Rpc("No result for eth_blockNumber".to_string()))?;
        parse_quantity(&result)
    }
}

#[async_trait]
impl TransferVerifier for RpcTransferVerifier {
    async fn verify(&self, expected: &ExpectedTransfer) -> Result<VerifiedTransfer, PaymentError> {
        let min_value = to_token_units(expected.amount, self.config.token_decimals)?;

        let receipt: TransactionReceipt = self
            .rpc_call("eth_getTransactionReceipt", [expected.tx_hash.as_str()])
            .await?
            .ok_or(PaymentError::NotFound)?;

        let block_number = match receipt.block_number.as_deref() {
            Some(number) => parse_quantity(number)?,
            None => return Err(PaymentError::NotFound),
        };

        if receipt.status.as_deref() != Some("0x1") {
            return Err(PaymentError::Reverted);
        }

        let head = self.latest_block().await?;
        let confirmations = head.checked_sub(block_number).map_or(0, |d| d + 1);
        if confirmations < self.config.min_confirmations {
            return Err(PaymentError::Unconfirmed {
                confirmations,
                required: self.config.min_confirmations,
            });
        }

        let value = match_transfer(
            &receipt.logs,
            &self.config.token_address,
            &expected.payer,
            &self.config.treasury_address,
            min_value,
        )?;

        Ok(VerifiedTransfer {
            block_number,
            confirmations,
            value,
        })
    }
}

/// Parse a hex-encoded JSON-RPC quantity.
fn parse_quantity(value: &str) -> Result<u64, PaymentError> {
    u64::from_str_radix(value.trim_start_matches("0x"), 16)
        .map_err(|e| PaymentError::Rpc(format!("Invalid quantity {:?}: {}", value, e)))
}
