//! JSON-RPC client against an in-process fake node

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use datamarket_ledger::{CallRequest, JsonRpcLedgerClient, LedgerClient, LedgerError};
use datamarket_types::{Address, SignedTransaction, TxHash};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct FakeNode {
    /// Respond 503 to this many requests before answering
    unavailable: AtomicU32,
    requests: AtomicU32,
}

async fn rpc(State(node): State<Arc<FakeNode>>, Json(body): Json<Value>) -> Response {
    node.requests.fetch_add(1, Ordering::SeqCst);
    if node
        .unavailable
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
    {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let id = body["id"].clone();
    let result = match body["method"].as_str().unwrap_or_default() {
        "eth_getTransactionCount" => json!({"jsonrpc": "2.0", "id": id, "result": "0x2a"}),
        "eth_estimateGas" => json!({"jsonrpc": "2.0", "id": id, "result": "0x5208"}),
        "eth_call" => json!({"jsonrpc": "2.0", "id": id, "result": format!("0x{}", "00".repeat(31) + "07")}),
        "eth_sendRawTransaction" => json!({"jsonrpc": "2.0", "id": id, "result": "0xBEEF"}),
        "eth_getTransactionReceipt" => {
            if body["params"][0] == "0x01" {
                json!({"jsonrpc": "2.0", "id": id, "result": {"status": "0x1", "blockNumber": "0x3"}})
            } else {
                json!({"jsonrpc": "2.0", "id": id, "result": null})
            }
        }
        _ => json!({"jsonrpc": "2.0", "id": id, "error": {"code": -32601, "message": "method not found"}}),
    };
    Json(result).into_response()
}

async fn spawn_node(node: Arc<FakeNode>) -> String {
    let app = Router::new().route("/", post(rpc)).with_state(node);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/", addr)
}

fn client(url: &str, retries: u32) -> JsonRpcLedgerClient {
    JsonRpcLedgerClient::new(url, Duration::from_secs(5), retries)
        .unwrap()
        .with_retry_delay(Duration::from_millis(1))
}

#[tokio::test]
async fn test_reads_decode_quantities() {
    let url = spawn_node(Arc::new(FakeNode::default())).await;
    let client = client(&url, 0);
    let to = Address::ZERO;

    assert_eq!(client.get_transaction_count(&to).await.unwrap(), 42);
    assert_eq!(
        client
            .estimate_gas(&CallRequest::new(to, vec![1, 2, 3]))
            .await
            .unwrap(),
        21_000
    );

    let raw = client.call(&CallRequest::new(to, vec![])).await.unwrap();
    assert_eq!(raw.len(), 32);
    assert_eq!(raw[31], 7);
}

#[tokio::test]
async fn test_reads_retry_when_node_unavailable() {
    let node = Arc::new(FakeNode::default());
    node.unavailable.store(2, Ordering::SeqCst);
    let url = spawn_node(node.clone()).await;

    let nonce = client(&url, 3)
        .get_transaction_count(&Address::ZERO)
        .await
        .unwrap();

    assert_eq!(nonce, 42);
    assert_eq!(node.requests.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_broadcast_is_never_retried() {
    let node = Arc::new(FakeNode::default());
    node.unavailable.store(1, Ordering::SeqCst);
    let url = spawn_node(node.clone()).await;

    let tx = SignedTransaction::from_hex("0xdeadbeef").unwrap();
    let err = client(&url, 3).send_raw_transaction(&tx).await.unwrap_err();

    assert!(matches!(err, LedgerError::ConnectionFailed(_)));
    assert_eq!(node.requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_broadcast_returns_normalised_hash() {
    let url = spawn_node(Arc::new(FakeNode::default())).await;
    let tx = SignedTransaction::from_hex("deadbeef").unwrap();

    let hash = client(&url, 0).send_raw_transaction(&tx).await.unwrap();
    assert_eq!(hash.as_str(), "0xbeef");
}

#[tokio::test]
async fn test_receipt_pending_and_mined() {
    let url = spawn_node(Arc::new(FakeNode::default())).await;
    let client = client(&url, 0);

    let pending = client
        .get_transaction_receipt(&TxHash::new("0x02"))
        .await
        .unwrap();
    assert!(pending.is_none());

    let mined = client
        .get_transaction_receipt(&TxHash::new("0x01"))
        .await
        .unwrap()
        .unwrap();
    assert!(mined.status);
    assert_eq!(mined.block_number, Some(3));
}
