use async_trait::async_trait;
use datamarket_types::{Address, SignedTransaction, TxHash, TxReceipt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::abi::{parse_data, parse_quantity, to_quantity};
use crate::LedgerError;

/// Read-only call or gas estimation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Option<Address>,
    pub to: Address,
    pub value: u128,
    pub data: Vec<u8>,
}

impl CallRequest {
    pub fn new(to: Address, data: Vec<u8>) -> Self {
        Self {
            from: None,
            to,
            value: 0,
            data,
        }
    }

    pub fn with_from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_value(mut self, value: u128) -> Self {
        self.value = value;
        self
    }

    fn to_json(&self) -> Value {
        let mut object = json!({
            "to": self.to.to_string(),
            "data": format!("0x{}", hex::encode(&self.data)),
        });
        if let Some(from) = &self.from {
            object["from"] = Value::String(from.to_string());
        }
        if self.value > 0 {
            object["value"] = Value::String(to_quantity(self.value));
        }
        object
    }
}

/// Ledger node capability
///
/// Everything the pipeline needs from the chain: contract reads, gas
/// estimation, nonces, raw broadcast and receipts.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Execute a read-only contract call and return the raw result bytes
    async fn call(&self, request: &CallRequest) -> Result<Vec<u8>, LedgerError>;

    /// Estimate gas units for a transaction
    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, LedgerError>;

    /// Next nonce for `address`, counting pending transactions
    async fn get_transaction_count(&self, address: &Address) -> Result<u64, LedgerError>;

    /// Broadcast a signed transaction
    async fn send_raw_transaction(&self, tx: &SignedTransaction) -> Result<TxHash, LedgerError>;

    /// Receipt for a mined transaction; `None` while still pending
    async fn get_transaction_receipt(&self, hash: &TxHash)
        -> Result<Option<TxReceipt>, LedgerError>;
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Value,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: Option<String>,
    status: Option<String>,
    block_number: Option<String>,
    gas_used: Option<String>,
}

/// Ethereum JSON-RPC 2.0 ledger client
pub struct JsonRpcLedgerClient {
    http: reqwest::Client,
    rpc_url: String,
    next_id: AtomicU64,
    max_retries: u32,
    retry_delay: Duration,
}

impl JsonRpcLedgerClient {
    pub fn new(
        rpc_url: impl Into<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, LedgerError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::ConnectionFailed(format!("Failed to create client: {}", e)))?;

        Ok(Self {
            http,
            rpc_url: rpc_url.into(),
            next_id: AtomicU64::new(1),
            max_retries,
            retry_delay: Duration::from_millis(250),
        })
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        tracing::trace!(method, id, "JSON-RPC request");

        let response = self.http.post(&self.rpc_url).json(&body).send().await?;
        let status = response.status();
        if status.is_server_error() {
            return Err(LedgerError::ConnectionFailed(format!(
                "{} returned HTTP {}",
                method, status
            )));
        }
        if !status.is_success() {
            return Err(LedgerError::InvalidResponse(format!(
                "{} returned HTTP {}",
                method, status
            )));
        }

        let envelope: RpcEnvelope = response.json().await?;
        if let Some(error) = envelope.error {
            return Err(LedgerError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(envelope.result)
    }

    /// Retry read calls whose failure only concerns reaching the node
    async fn with_retry<F, T, Fut>(&self, method: &str, operation: F) -> Result<T, LedgerError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, LedgerError>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        method,
                        attempt,
                        error = %e,
                        "Ledger read failed, retrying"
                    );
                    tokio::time::sleep(self.retry_delay * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn expect_str<'a>(method: &str, value: &'a Value) -> Result<&'a str, LedgerError> {
    value.as_str().ok_or_else(|| {
        LedgerError::InvalidResponse(format!("{} returned non-string result: {}", method, value))
    })
}

fn parse_receipt(hash: &TxHash, value: Value) -> Result<Option<TxReceipt>, LedgerError> {
    if value.is_null() {
        return Ok(None);
    }

    let raw: RpcReceipt =
        serde_json::from_value(value).map_err(|e| LedgerError::Decode(e.to_string()))?;
    let status = raw
        .status
        .as_deref()
        .ok_or_else(|| LedgerError::Decode(format!("receipt for {} has no status", hash)))?;

    Ok(Some(TxReceipt {
        hash: raw
            .transaction_hash
            .map(|h| TxHash::new(&h))
            .unwrap_or_else(|| hash.clone()),
        status: parse_quantity(status)? != 0,
        block_number: raw.block_number.as_deref().map(parse_quantity).transpose()?,
        gas_used: raw.gas_used.as_deref().map(parse_quantity).transpose()?,
    }))
}

#[async_trait]
impl LedgerClient for JsonRpcLedgerClient {
    async fn call(&self, request: &CallRequest) -> Result<Vec<u8>, LedgerError> {
        let params = json!([request.to_json(), "latest"]);
        let result = self
            .with_retry("eth_call", || self.request("eth_call", params.clone()))
            .await?;
        parse_data(expect_str("eth_call", &result)?)
    }

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, LedgerError> {
        let params = json!([request.to_json()]);
        let result = self
            .with_retry("eth_estimateGas", || {
                self.request("eth_estimateGas", params.clone())
            })
            .await?;
        parse_quantity(expect_str("eth_estimateGas", &result)?)
    }

    async fn get_transaction_count(&self, address: &Address) -> Result<u64, LedgerError> {
        let params = json!([address.to_string(), "pending"]);
        let result = self
            .with_retry("eth_getTransactionCount", || {
                self.request("eth_getTransactionCount", params.clone())
            })
            .await?;
        parse_quantity(expect_str("eth_getTransactionCount", &result)?)
    }

    async fn send_raw_transaction(&self, tx: &SignedTransaction) -> Result<TxHash, LedgerError> {
        // A broadcast that timed out may still have landed; never resend.
        let result = self
            .request("eth_sendRawTransaction", json!([tx.to_hex()]))
            .await?;
        let hash = TxHash::new(expect_str("eth_sendRawTransaction", &result)?);
        tracing::debug!(tx_hash = %hash, "Broadcast raw transaction");
        Ok(hash)
    }

    async fn get_transaction_receipt(
        &self,
        hash: &TxHash,
    ) -> Result<Option<TxReceipt>, LedgerError> {
        let params = json!([hash.as_str()]);
        let result = self
            .with_retry("eth_getTransactionReceipt", || {
                self.request("eth_getTransactionReceipt", params.clone())
            })
            .await?;
        parse_receipt(hash, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash() -> TxHash {
        TxHash::new("0xabc")
    }

    #[test]
    fn test_call_request_json() {
        let to: Address = "0x0000000000000000000000000000000000000aaa".parse().unwrap();
        let from: Address = "0x0000000000000000000000000000000000000bbb".parse().unwrap();
        let json = CallRequest::new(to, vec![0x70, 0xa0])
            .with_from(from)
            .to_json();

        assert_eq!(json["to"], "0x0000000000000000000000000000000000000aaa");
        assert_eq!(json["from"], "0x0000000000000000000000000000000000000bbb");
        assert_eq!(json["data"], "0x70a0");
        assert!(json.get("value").is_none());
    }

    #[test]
    fn test_pending_receipt_is_none() {
        assert_eq!(parse_receipt(&hash(), Value::Null).unwrap(), None);
    }

    #[test]
    fn test_receipt_status() {
        let ok = parse_receipt(
            &hash(),
            json!({"transactionHash": "0xABC", "status": "0x1", "blockNumber": "0x10"}),
        )
        .unwrap()
        .unwrap();
        assert!(ok.status);
        assert_eq!(ok.block_number, Some(16));
        assert_eq!(ok.hash, hash());

        let reverted = parse_receipt(&hash(), json!({"status": "0x0"}))
            .unwrap()
            .unwrap();
        assert!(!reverted.status);
    }

    #[test]
    fn test_receipt_without_status_is_decode_error() {
        let err = parse_receipt(&hash(), json!({"blockNumber": "0x1"})).unwrap_err();
        assert!(matches!(err, LedgerError::Decode(_)));
    }

    #[tokio::test]
    #[ignore] // Requires a running JSON-RPC node
    async fn test_real_node_connection() {
        let client = JsonRpcLedgerClient::new(
            "http://localhost:8545",
            Duration::from_secs(5),
            1,
        )
        .unwrap();

        let nonce = client.get_transaction_count(&Address::ZERO).await;
        assert!(nonce.is_ok());
    }
}
