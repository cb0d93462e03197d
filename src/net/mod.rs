//! Auxiliary gRPC channel subsystem.
//!
//! # Data Flow
//! ```text
//! Size check on a service batch
//!     → params.rs (unary Query/Params call)
//!     → connection.rs (shared channel, created on first use)
//!     → credentials.rs (project metadata on every call)
//!     → Node gRPC endpoint (plaintext)
//! ```
//!
//! # Design Decisions
//! - One channel per process, established lazily and replaceable via `reset`
//! - A failed dial is not remembered; the next caller dials again
//! - Credentials ride in metadata, so the transport needs no TLS

pub mod connection;
pub mod credentials;
pub mod params;

pub use connection::{AuthChannel, ConnectionManager, Connector, GrpcConnector};
pub use credentials::ProjectCredentials;
pub use params::{GrpcParamsClient, ParamsQuery};
