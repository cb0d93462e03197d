//! Per-call project credentials for the auxiliary channel.
//!
//! Authentication travels entirely in request metadata; the channel itself
//! is plaintext.

use tonic::metadata::{Ascii, MetadataValue};
use tonic::service::Interceptor;
use tonic::{Request, Status};

use crate::blockchain::types::{TxError, TxResult};
use crate::config::schema::ProjectConfig;

/// gRPC metadata keys are lowercase on the wire.
pub const PROJECT_ID_HEADER: &str = "projectid";
pub const PROJECT_KEY_HEADER: &str = "projectkey";
pub const CHAIN_ACCOUNT_ADDRESS_HEADER: &str = "chainaccountaddress";

/// Attaches project id, project key and chain account address to every call.
#[derive(Clone)]
pub struct ProjectCredentials {
    project_id: MetadataValue<Ascii>,
    project_key: MetadataValue<Ascii>,
    chain_account_address: MetadataValue<Ascii>,
}

impl ProjectCredentials {
    /// Values are validated once here so interception cannot fail.
    pub fn new(project: &ProjectConfig) -> TxResult<Self> {
        let value = |field: &str, raw: &str| {
            MetadataValue::<Ascii>::try_from(raw).map_err(|e| {
                TxError::ConnectionInit(format!("project {} is not valid metadata: {}", field, e))
            })
        };
        Ok(Self {
            project_id: value("id", &project.project_id)?,
            project_key: value("key", &project.project_key)?,
            chain_account_address: value(
                "chain account address",
                &project.chain_account_address,
            )?,
        })
    }

    /// Metadata attached to each request.
    pub fn request_metadata(&self) -> [(&'static str, &MetadataValue<Ascii>); 3] {
        [
            (PROJECT_ID_HEADER, &self.project_id),
            (PROJECT_KEY_HEADER, &self.project_key),
            (CHAIN_ACCOUNT_ADDRESS_HEADER, &self.chain_account_address),
        ]
    }
}

impl Interceptor for ProjectCredentials {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let metadata = request.metadata_mut();
        for (key, value) in self.request_metadata() {
            metadata.insert(key, value.clone());
        }
        Ok(request)
    }
}

impl std::fmt::Debug for ProjectCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectCredentials")
            .field("project_id", &self.project_id)
            .field("project_key", &"<redacted>")
            .field("chain_account_address", &self.chain_account_address)
            .finish()
    }
}
