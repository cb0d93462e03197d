//! JSON-RPC node client against a local HTTP endpoint.

mod common;

use base64::Engine;
use common::*;
use serde_json::{json, Value};
use std::time::Duration;

use ledger_txclient::blockchain::rpc::{HttpNodeRpc, NodeRpc};
use ledger_txclient::blockchain::types::{AbciQueryOptions, BroadcastMode, TxError};
use ledger_txclient::ClientConfig;

fn b64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn rpc_for(addr: std::net::SocketAddr) -> HttpNodeRpc {
    HttpNodeRpc::new(&ClientConfig {
        node_uri: format!("http://{}", addr),
        timeout_secs: 2,
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_abci_query_round_trip() {
    let addr = start_json_rpc(|method, params| {
        assert_eq!(method, "abci_query");
        assert_eq!(params["path"], "/store/bank/key");
        assert_eq!(params["data"], hex::encode(b"balances"));
        assert_eq!(params["height"], "42");
        assert_eq!(params["prove"], true);
        Ok(json!({
            "response": {
                "code": 0,
                "log": "",
                "key": b64(b"balances"),
                "value": b64(b"100uirita"),
                "height": "42",
                "proofOps": { "ops": [] }
            }
        }))
    })
    .await;

    let resp = rpc_for(addr)
        .abci_query(
            "/store/bank/key",
            b"balances",
            AbciQueryOptions {
                height: 42,
                prove: true,
            },
        )
        .await
        .unwrap();
    assert!(resp.is_ok());
    assert_eq!(resp.key, b"balances");
    assert_eq!(resp.value, b"100uirita");
    assert_eq!(resp.height, 42);
    assert!(resp.proof_ops.is_some());
}

#[tokio::test]
async fn test_broadcast_sync_reports_rejection_as_result() {
    let addr = start_json_rpc(|method, params| {
        assert_eq!(method, "broadcast_tx_sync");
        assert_eq!(params["tx"], b64(b"signed-tx"));
        Ok(json!({
            "code": 32,
            "codespace": "sdk",
            "log": "account sequence mismatch, expected 4, got 3",
            "hash": "ABCDEF"
        }))
    })
    .await;

    let res = rpc_for(addr)
        .broadcast_tx(b"signed-tx", BroadcastMode::Sync)
        .await
        .unwrap();
    assert!(!res.is_ok());
    assert_eq!(res.code, 32);
    assert_eq!(res.hash, "ABCDEF");
    assert!(matches!(
        TxError::from_rejection(&res, 9),
        TxError::StaleSequence { code: 32, .. }
    ));
}

#[tokio::test]
async fn test_broadcast_commit() {
    let addr = start_json_rpc(|method, _params| {
        assert_eq!(method, "broadcast_tx_commit");
        Ok(json!({
            "check_tx": { "code": 0, "gas_wanted": "200000" },
            "deliver_tx": { "code": 0, "gas_wanted": "200000", "gas_used": "51234" },
            "hash": "C0FFEE",
            "height": "981"
        }))
    })
    .await;

    let res = rpc_for(addr)
        .broadcast_tx(b"tx", BroadcastMode::Commit)
        .await
        .unwrap();
    assert!(res.is_ok());
    assert_eq!(res.height, 981);
    assert_eq!(res.gas_used, 51_234);
}

#[tokio::test]
async fn test_rpc_error_surfaces() {
    let addr = start_json_rpc(|_method, _params| {
        Err(json!({ "code": -32603, "message": "Internal error", "data": "tx already exists in cache" }))
    })
    .await;

    let err = rpc_for(addr)
        .broadcast_tx(b"tx", BroadcastMode::Async)
        .await
        .unwrap_err();
    assert!(matches!(err, TxError::Rpc(ref msg) if msg.contains("tx already exists")));
}

#[tokio::test]
async fn test_unreachable_node() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        rpc_for(addr).abci_query("custom/auth/account", b"{}", AbciQueryOptions::default()),
    )
    .await
    .unwrap()
    .unwrap_err();
    assert!(matches!(err, TxError::Rpc(_) | TxError::Timeout(_)));
}

#[tokio::test]
async fn test_client_over_http() {
    let addr = start_json_rpc(|method, params| {
        assert_eq!(method, "abci_query");
        let data = hex::decode(params["data"].as_str().unwrap()).unwrap();
        let request: Value = serde_json::from_slice(&data).unwrap();
        assert_eq!(request["address"], "iaa1alice");
        Ok(json!({
            "response": {
                "code": 0,
                "value": b64(br#"{"account_number":"3","sequence":"19"}"#),
                "height": "77"
            }
        }))
    })
    .await;

    let client = ledger_txclient::BaseClient::builder(ClientConfig {
        node_uri: format!("http://{}", addr),
        ..test_config()
    })
    .with_params(ScriptedParams::new([]))
    .build()
    .unwrap();

    let state = client.query_account("iaa1alice").await.unwrap();
    assert_eq!(state.account_number, 3);
    assert_eq!(state.sequence, 19);
}
