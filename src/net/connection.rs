//! Lazily established, process-wide auxiliary channel.
//!
//! # Responsibilities
//! - Create the authenticated channel on first use, exactly once
//! - Let concurrent first callers wait on the same initialization
//! - Leave a failed initialization unset so the next caller retries it
//! - Drop the held channel on `reset` so the next caller reconnects

use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::OnceCell;
use tonic::service::interceptor::InterceptedService;
use tonic::transport::{Channel, Endpoint};

use crate::blockchain::types::{ClientConfig, TxError, TxResult};
use crate::net::credentials::ProjectCredentials;
use crate::observability::metrics;

/// Channel whose every call carries the project credentials.
pub type AuthChannel = InterceptedService<Channel, ProjectCredentials>;

/// Produces a ready channel. Called at most once per successful init.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Channel: Clone + Send + Sync + 'static;

    async fn connect(&self) -> TxResult<Self::Channel>;
}

/// Plaintext gRPC connector with per-call project credentials.
#[derive(Debug, Clone)]
pub struct GrpcConnector {
    endpoint: Endpoint,
    credentials: ProjectCredentials,
}

impl GrpcConnector {
    pub fn new(config: &ClientConfig) -> TxResult<Self> {
        let endpoint = Endpoint::from_shared(config.grpc_addr.clone())
            .map_err(|e| {
                TxError::ConnectionInit(format!("invalid grpc address {}: {}", config.grpc_addr, e))
            })?
            .timeout(config.timeout())
            .connect_timeout(config.timeout());
        let credentials = ProjectCredentials::new(&config.project)?;
        Ok(Self {
            endpoint,
            credentials,
        })
    }
}

#[async_trait]
impl Connector for GrpcConnector {
    type Channel = AuthChannel;

    async fn connect(&self) -> TxResult<AuthChannel> {
        let channel = self.endpoint.connect().await.map_err(|e| {
            TxError::ConnectionInit(format!("dial {}: {}", self.endpoint.uri(), e))
        })?;
        Ok(InterceptedService::new(channel, self.credentials.clone()))
    }
}

static SHARED: OnceLock<Arc<ConnectionManager<GrpcConnector>>> = OnceLock::new();

/// Holds at most one live channel produced by `C`.
pub struct ConnectionManager<C: Connector> {
    connector: C,
    cell: ArcSwap<OnceCell<C::Channel>>,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            cell: ArcSwap::from_pointee(OnceCell::new()),
        }
    }

    /// The shared channel, connecting on first use.
    pub async fn get_connection(&self) -> TxResult<C::Channel> {
        let cell = self.cell.load_full();
        let channel = cell
            .get_or_try_init(|| async {
                let result = self.connector.connect().await;
                metrics::record_connection_init(result.is_ok());
                match &result {
                    Ok(_) => tracing::info!("Auxiliary channel established"),
                    Err(e) => tracing::error!(error = %e, "Auxiliary channel initialization failed"),
                }
                result
            })
            .await?;
        Ok(channel.clone())
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.load().initialized()
    }

    /// Forget the held channel. Calls already holding a clone keep it.
    pub fn reset(&self) {
        self.cell.store(Arc::new(OnceCell::new()));
        tracing::debug!("Auxiliary channel reset");
    }
}

impl ConnectionManager<GrpcConnector> {
    /// The process-wide manager. Only the first call's configuration is used.
    pub fn shared(config: &ClientConfig) -> TxResult<Arc<Self>> {
        if let Some(manager) = SHARED.get() {
            return Ok(manager.clone());
        }
        let manager = Arc::new(Self::new(GrpcConnector::new(config)?));
        Ok(SHARED.get_or_init(|| manager).clone())
    }
}

impl<C: Connector> std::fmt::Debug for ConnectionManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
