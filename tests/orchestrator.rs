//! Single-transaction send path: sequence recovery, retry ceiling, locking.

mod common;

use common::*;
use std::sync::Arc;
use std::time::Duration;

use ledger_txclient::blockchain::types::ErrorCode;
use ledger_txclient::{BaseTx, Msg, TxError};

fn alice() -> BaseTx {
    BaseTx::new("alice", "pw")
}

#[tokio::test]
async fn test_send_uses_node_sequence_then_cache() {
    let node = MockNode::new(5);
    let client = client(node.clone(), ScriptedParams::new([]));

    let first = client.build_and_send(&[bank_msg(1)], &alice()).await.unwrap();
    assert_eq!(first.hash, "TX0005");
    let second = client.build_and_send(&[bank_msg(2)], &alice()).await.unwrap();
    assert_eq!(second.hash, "TX0006");

    // second build was served from the cache
    assert_eq!(node.account_queries(), 1);
    assert_eq!(node.sequence(), 7);
}

#[tokio::test]
async fn test_stale_cached_sequence_recovers() {
    let node = MockNode::new(5);
    let client = client(node.clone(), ScriptedParams::new([]));
    client.build_and_send(&[bank_msg(1)], &alice()).await.unwrap();

    // another process spends sequence 6
    node.bump_sequence();

    let result = client.build_and_send(&[bank_msg(2)], &alice()).await.unwrap();
    assert_eq!(result.hash, "TX0007");
    // cached attempt + refreshed attempt
    assert_eq!(node.broadcast_calls(), 3);
    assert_eq!(node.account_queries(), 2);
}

#[tokio::test]
async fn test_retries_stop_after_three_attempts() {
    let node = MockNode::new(0);
    node.always_reject_sequence();
    let client = client(node.clone(), ScriptedParams::new([]));

    let err = client.build_and_send(&[bank_msg(1)], &alice()).await.unwrap_err();
    match &err {
        TxError::RetriesExhausted {
            address, attempts, ..
        } => {
            assert_eq!(address, "iaa1alice");
            assert_eq!(*attempts, 3);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.code(), ErrorCode::StaleSequence);
    assert!(matches!(err.root(), TxError::StaleSequence { code: 32, .. }));
    assert_eq!(node.broadcast_calls(), 3);
    // every retry re-queries the account
    assert_eq!(node.account_queries(), 3);
}

#[tokio::test]
async fn test_configured_attempt_ceiling() {
    let node = MockNode::new(0);
    node.always_reject_sequence();
    let mut config = test_config();
    config.retry.max_attempts = 1;
    let client = client_with(config, node.clone(), ScriptedParams::new([]));

    let err = client.build_and_send(&[bank_msg(1)], &alice()).await.unwrap_err();
    assert!(matches!(err, TxError::RetriesExhausted { attempts: 1, .. }));
    assert_eq!(node.broadcast_calls(), 1);
}

#[tokio::test]
async fn test_other_rejections_are_not_retried() {
    let node = MockNode::new(0);
    node.set_max_msgs(1);
    let client = client(node.clone(), ScriptedParams::new([]));

    // too-large is only shrinkable in batch mode
    let err = client
        .build_and_send(&[bank_msg(1), bank_msg(2)], &alice())
        .await
        .unwrap_err();
    assert!(matches!(err, TxError::TxTooLarge { limit: None, .. }));
    assert_eq!(node.broadcast_calls(), 1);
}

#[tokio::test]
async fn test_address_resolution_failure() {
    let node = MockNode::new(0);
    let client = client(node.clone(), ScriptedParams::new([]));

    let err = client
        .build_and_send(&[bank_msg(1)], &BaseTx::new("alice", "wrong"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::AddressResolution);
    assert_eq!(node.network_calls(), 0);
}

#[tokio::test]
async fn test_build_and_sign_does_not_broadcast() {
    let node = MockNode::new(3);
    let client = client(node.clone(), ScriptedParams::new([]));

    let bytes = client
        .build_and_sign(&[bank_msg(1)], &alice().with_memo("note"))
        .await
        .unwrap();
    let doc: ledger_txclient::blockchain::factory::SignDoc = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(doc.sequence, 3);
    assert_eq!(doc.memo, "note");
    assert_eq!(node.broadcast_calls(), 0);
}

#[tokio::test]
async fn test_same_sender_is_serialized() {
    let node = MockNode::new(0);
    let client = Arc::new(client(node.clone(), ScriptedParams::new([])));

    let mut handles = Vec::new();
    for i in 0..10 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            let msgs: Vec<Box<dyn Msg>> = vec![bank_msg(i)];
            client.build_and_send(&msgs, &BaseTx::new("alice", "pw")).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // no sequence was ever signed twice, so nothing was rejected
    assert_eq!(node.sequence(), 10);
    assert_eq!(node.broadcast_calls(), 10);
    assert_eq!(node.account_queries(), 1);
}

#[tokio::test]
async fn test_queries() {
    let node = MockNode::new(12);
    let client = client(node.clone(), ScriptedParams::new([]));

    let state = client.query_account("iaa1alice").await.unwrap();
    assert_eq!(state.account_number, 7);
    assert_eq!(state.sequence, 12);

    let err = client.query("custom/bank/balance", None).await.unwrap_err();
    assert!(matches!(err, TxError::Query(ref log) if log.contains("unknown query path")));

    let err = client
        .query_store(b"key", "bank", 0, false)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Query);

    tokio::time::timeout(Duration::from_secs(1), client.query_account("iaa1bob"))
        .await
        .unwrap()
        .unwrap();
}
