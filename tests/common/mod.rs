//! Shared mocks for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use ledger_txclient::accounts::query::ACCOUNT_QUERY_PATH;
use ledger_txclient::blockchain::factory::SignDoc;
use ledger_txclient::blockchain::msg::{JsonMsg, Msg, SERVICE_ROUTE};
use ledger_txclient::blockchain::rpc::NodeRpc;
use ledger_txclient::blockchain::types::{
    AbciQueryOptions, AbciQueryResponse, BroadcastMode, ResultTx, TxError, TxResult,
};
use ledger_txclient::blockchain::wallet::KeyManager;
use ledger_txclient::config::RetryConfig;
use ledger_txclient::net::ParamsQuery;
use ledger_txclient::{BaseClient, ClientConfig};

/// In-process ledger node.
///
/// Expects the transaction bytes to be the JSON sign document (see
/// [`EchoKeys`]). Checks the signed sequence against its own and advances it
/// on every accepted transaction.
pub struct MockNode {
    pub account_number: u64,
    sequence: AtomicU64,
    account_queries: AtomicUsize,
    broadcast_calls: AtomicUsize,
    accepted: Mutex<Vec<usize>>,
    offered: Mutex<Vec<usize>>,
    reject_sequence: AtomicBool,
    /// Node-side size limit expressed as a message count; 0 means none.
    max_msgs: AtomicUsize,
    /// Reject everything once this many transactions were accepted.
    fail_after: AtomicUsize,
}

impl MockNode {
    pub fn new(sequence: u64) -> Arc<Self> {
        Arc::new(Self {
            account_number: 7,
            sequence: AtomicU64::new(sequence),
            account_queries: AtomicUsize::new(0),
            broadcast_calls: AtomicUsize::new(0),
            accepted: Mutex::new(Vec::new()),
            offered: Mutex::new(Vec::new()),
            reject_sequence: AtomicBool::new(false),
            max_msgs: AtomicUsize::new(0),
            fail_after: AtomicUsize::new(usize::MAX),
        })
    }

    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Simulate a transaction sent by someone else with the same key.
    pub fn bump_sequence(&self) {
        self.sequence.fetch_add(1, Ordering::SeqCst);
    }

    pub fn always_reject_sequence(&self) {
        self.reject_sequence.store(true, Ordering::SeqCst);
    }

    pub fn set_max_msgs(&self, max: usize) {
        self.max_msgs.store(max, Ordering::SeqCst);
    }

    pub fn fail_after(&self, accepted: usize) {
        self.fail_after.store(accepted, Ordering::SeqCst);
    }

    pub fn account_queries(&self) -> usize {
        self.account_queries.load(Ordering::SeqCst)
    }

    pub fn broadcast_calls(&self) -> usize {
        self.broadcast_calls.load(Ordering::SeqCst)
    }

    pub fn network_calls(&self) -> usize {
        self.account_queries() + self.broadcast_calls()
    }

    /// Message count of every accepted transaction, in order.
    pub fn accepted(&self) -> Vec<usize> {
        self.accepted.lock().unwrap().clone()
    }

    /// Message count of every broadcast transaction, accepted or not.
    pub fn offered(&self) -> Vec<usize> {
        self.offered.lock().unwrap().clone()
    }

    fn reject(codespace: &str, code: u32, log: String) -> ResultTx {
        ResultTx {
            hash: String::new(),
            code,
            codespace: codespace.into(),
            log,
            ..Default::default()
        }
    }
}

#[async_trait]
impl NodeRpc for MockNode {
    async fn abci_query(
        &self,
        path: &str,
        _data: &[u8],
        _opts: AbciQueryOptions,
    ) -> TxResult<AbciQueryResponse> {
        if path != ACCOUNT_QUERY_PATH {
            return Ok(AbciQueryResponse {
                code: 6,
                log: format!("unknown query path {}", path),
                ..Default::default()
            });
        }
        self.account_queries.fetch_add(1, Ordering::SeqCst);
        let value = json!({
            "account_number": self.account_number.to_string(),
            "sequence": self.sequence().to_string(),
        });
        Ok(AbciQueryResponse {
            value: serde_json::to_vec(&value).unwrap(),
            ..Default::default()
        })
    }

    async fn broadcast_tx(&self, tx: &[u8], _mode: BroadcastMode) -> TxResult<ResultTx> {
        self.broadcast_calls.fetch_add(1, Ordering::SeqCst);
        let doc: SignDoc = serde_json::from_slice(tx)
            .map_err(|e| TxError::Codec(format!("mock node cannot decode tx: {}", e)))?;
        self.offered.lock().unwrap().push(doc.msgs.len());

        let expected = self.sequence();
        if self.reject_sequence.load(Ordering::SeqCst) || doc.sequence != expected {
            return Ok(Self::reject(
                "sdk",
                32,
                format!(
                    "account sequence mismatch, expected {}, got {}: incorrect account sequence",
                    expected, doc.sequence
                ),
            ));
        }
        let max = self.max_msgs.load(Ordering::SeqCst);
        if max > 0 && doc.msgs.len() > max {
            return Ok(Self::reject("sdk", 21, "tx too large".into()));
        }
        if self.accepted.lock().unwrap().len() >= self.fail_after.load(Ordering::SeqCst) {
            return Ok(Self::reject("bank", 5, "insufficient funds".into()));
        }

        self.sequence.fetch_add(1, Ordering::SeqCst);
        self.accepted.lock().unwrap().push(doc.msgs.len());
        Ok(ResultTx {
            hash: format!("TX{:04}", expected),
            height: 100 + expected as i64,
            ..Default::default()
        })
    }
}

/// Key manager whose signature is the sign document itself.
pub struct EchoKeys;

#[async_trait]
impl KeyManager for EchoKeys {
    async fn resolve_address(&self, name: &str, password: &str) -> TxResult<String> {
        if password != "pw" {
            return Err(TxError::AddressResolution(format!("wrong password for {}", name)));
        }
        Ok(format!("iaa1{}", name))
    }

    async fn sign(&self, _name: &str, sign_bytes: &[u8], _password: &str) -> TxResult<Vec<u8>> {
        Ok(sign_bytes.to_vec())
    }
}

/// Size limit service answering from a script, then `u64::MAX`.
#[derive(Default)]
pub struct ScriptedParams {
    limits: Mutex<VecDeque<u64>>,
    calls: AtomicUsize,
}

impl ScriptedParams {
    pub fn new(limits: impl IntoIterator<Item = u64>) -> Arc<Self> {
        Arc::new(Self {
            limits: Mutex::new(limits.into_iter().collect()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ParamsQuery for ScriptedParams {
    async fn tx_size_limit(&self) -> TxResult<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.limits.lock().unwrap().pop_front().unwrap_or(u64::MAX))
    }
}

pub fn test_config() -> ClientConfig {
    ClientConfig {
        chain_id: "irita-test".into(),
        retry: RetryConfig {
            max_attempts: 3,
            base_delay_ms: 0,
            max_delay_ms: 0,
        },
        ..Default::default()
    }
}

pub fn client(node: Arc<MockNode>, params: Arc<ScriptedParams>) -> BaseClient {
    client_with(test_config(), node, params)
}

pub fn client_with(
    config: ClientConfig,
    node: Arc<MockNode>,
    params: Arc<ScriptedParams>,
) -> BaseClient {
    BaseClient::builder(config)
        .with_rpc(node)
        .with_params(params)
        .with_key_manager(Arc::new(EchoKeys))
        .build()
        .unwrap()
}

pub fn bank_msg(n: usize) -> Box<dyn Msg> {
    Box::new(JsonMsg::new(
        "bank",
        "/cosmos.bank.v1beta1.MsgSend",
        json!({"to": "iaa1bob", "amount": n.to_string()}),
    ))
}

pub fn service_msg(n: usize) -> Box<dyn Msg> {
    Box::new(JsonMsg::new(
        SERVICE_ROUTE,
        "/irismod.service.MsgCallService",
        json!({"service_name": "oracle", "input": n.to_string()}),
    ))
}

/// Minimal Tendermint JSON-RPC endpoint. Each request is answered by
/// `handler(method, params)`; the returned value is placed under `result`,
/// or under `error` when the handler returns `Err`.
pub async fn start_json_rpc<F>(handler: F) -> SocketAddr
where
    F: Fn(&str, &Value) -> Result<Value, Value> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request_body(&mut socket).await else {
                            return;
                        };
                        let method = request["method"].as_str().unwrap_or_default().to_string();
                        let body = match handler(&method, &request["params"]) {
                            Ok(result) => json!({"jsonrpc": "2.0", "id": request["id"], "result": result}),
                            Err(error) => json!({"jsonrpc": "2.0", "id": request["id"], "error": error}),
                        }
                        .to_string();
                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn read_request_body(socket: &mut tokio::net::TcpStream) -> Option<Value> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);

        let Some(header_end) = find(&buf, b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
        let length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        let body_start = header_end + 4;
        if buf.len() >= body_start + length {
            return serde_json::from_slice(&buf[body_start..body_start + length]).ok();
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
