//! gRPC server lifecycle and service discovery.
//!
//! ## Quick Start
//!
//! ```ignore
//! use grpc_runtime::server::{GrpcServer, ServerConfig, ServiceCandidate, ServiceRegistry};
//! use core_config::FromEnv;
//! use rpc::tasks::tasks_service_server::TasksServiceServer;
//!
//! let config = ServerConfig::from_env()?;
//! let services = ServiceRegistry::discover(vec![
//!     ServiceCandidate::new(TasksServiceServer::new(my_impl)),
//! ])?;
//!
//! let server = GrpcServer::build(config, services, |builder| builder)?;
//! let mut handle = server.start().await?;
//! handle.wait().await;
//! ```
//!
//! Shutdown from another task via [`ServerHandle::shutdown`]: graceful drain
//! up to the configured deadline, then forced termination. The standard
//! health service (`grpc.health.v1.Health`) is always bound and tracks the
//! lifecycle.

mod config;
mod lifecycle;
mod registry;

pub use config::{ServerConfig, ServerTlsMaterial};
pub use lifecycle::{GrpcServer, ServerHandle, ServerState};
pub use registry::{
    BindableService, ServiceCandidate, ServiceDescriptor, ServiceRegistry, ServiceSource,
};
