//! Server-side transaction size limit, read over the auxiliary channel.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::Code;

use crate::blockchain::types::{TxError, TxResult};
use crate::net::connection::{ConnectionManager, GrpcConnector};

/// Unary method returning the service module parameters.
pub const SERVICE_PARAMS_PATH: &str = "/irismod.service.Query/Params";

/// Source of the maximum accepted transaction size.
#[async_trait]
pub trait ParamsQuery: Send + Sync {
    async fn tx_size_limit(&self) -> TxResult<u64>;
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct QueryParamsRequest {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct QueryParamsResponse {
    #[prost(message, optional, tag = "1")]
    pub params: Option<ServiceParams>,
}

/// Only the field this client reads; prost skips the rest.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ServiceParams {
    #[prost(uint64, tag = "8")]
    pub tx_size_limit: u64,
}

/// [`ParamsQuery`] over the shared gRPC channel.
#[derive(Debug, Clone)]
pub struct GrpcParamsClient {
    connections: Arc<ConnectionManager<GrpcConnector>>,
    timeout_duration: Duration,
}

impl GrpcParamsClient {
    pub fn new(connections: Arc<ConnectionManager<GrpcConnector>>, timeout: Duration) -> Self {
        Self {
            connections,
            timeout_duration: timeout,
        }
    }

    async fn fetch(&self) -> TxResult<QueryParamsResponse> {
        let channel = self.connections.get_connection().await?;
        let mut grpc = tonic::client::Grpc::new(channel);
        grpc.ready()
            .await
            .map_err(|e| TxError::Rpc(format!("params service not ready: {}", e)))?;

        let response = grpc
            .unary(
                tonic::Request::new(QueryParamsRequest {}),
                PathAndQuery::from_static(SERVICE_PARAMS_PATH),
                ProstCodec::<QueryParamsRequest, QueryParamsResponse>::default(),
            )
            .await
            .map_err(map_status)?;
        Ok(response.into_inner())
    }
}

#[async_trait]
impl ParamsQuery for GrpcParamsClient {
    async fn tx_size_limit(&self) -> TxResult<u64> {
        let response = tokio::time::timeout(self.timeout_duration, self.fetch())
            .await
            .map_err(|_| TxError::Timeout(self.timeout_duration.as_secs()))??;

        let limit = response
            .params
            .map(|p| p.tx_size_limit)
            .ok_or_else(|| TxError::Query("service params missing from response".to_string()))?;
        tracing::debug!(limit = limit, "Fetched transaction size limit");
        Ok(limit)
    }
}

fn map_status(status: tonic::Status) -> TxError {
    match status.code() {
        Code::Unavailable | Code::Unknown => TxError::Rpc(status.message().to_string()),
        code => TxError::Query(format!("{:?}: {}", code, status.message())),
    }
}
