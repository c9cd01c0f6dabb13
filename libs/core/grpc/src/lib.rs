//! # gRPC Runtime
//!
//! Server lifecycle management and client channel construction for the gRPC
//! services in this workspace.
//!
//! ## Server side
//!
//! Discovery validates that everything tagged for export actually exposes a
//! service binding, then the lifecycle manager owns the rest: bind, serve,
//! graceful drain, forced termination.
//!
//! ```ignore
//! use grpc_runtime::{GrpcServer, ServerConfig, ServiceCandidate, ServiceRegistry};
//! use core_config::FromEnv;
//!
//! let services = ServiceRegistry::discover(vec![
//!     ServiceCandidate::new(TasksServiceServer::new(my_impl)),
//! ])?;
//! let server = GrpcServer::build(ServerConfig::from_env()?, services, |b| b)?;
//! let mut handle = server.start().await?;
//! handle.wait().await;
//! ```
//!
//! ## Client side
//!
//! The channel factory resolves `address://host:port,...` targets into a
//! balanced transport, applies the configured tuning, and wraps every
//! channel in the merged (registry + per-call, deduplicated) interceptor
//! chain.
//!
//! ```ignore
//! use grpc_runtime::{AuthInterceptor, ChannelConfig, ChannelFactory, InterceptorRegistry};
//!
//! let mut interceptors = InterceptorRegistry::new();
//! interceptors.register(AuthInterceptor::bearer("my-token"));
//!
//! let factory = ChannelFactory::with_interceptors(ChannelConfig::from_env()?, interceptors)?;
//! let channel = factory.create_channel("address://[::1]:50051,[::1]:50052").await?;
//! let client = TasksServiceClient::new(channel.service());
//! ```

pub mod channel;
pub mod client;
pub mod error;
pub mod interceptors;
pub mod resolver;
pub mod server;

// Re-export main types for convenience
pub use channel::{ChannelConfig, ChannelFactory, ChannelHandle, ClientTlsMaterial, NegotiationType};
pub use client::{ConfigurableClient, with_compression, with_limits};
pub use error::{GrpcError, GrpcResult};
pub use interceptors::{
    AuthInterceptor, InterceptorRegistry, InterceptorStack, RequestIdInterceptor,
    SharedInterceptor, shared,
};
pub use resolver::{
    ADDRESS_SCHEME, AddressResolver, AddressSet, BackendAddr, NameResolver, ResolverRegistry,
};
pub use server::{
    BindableService, GrpcServer, ServerConfig, ServerHandle, ServerState, ServerTlsMaterial,
    ServiceCandidate, ServiceDescriptor, ServiceRegistry, ServiceSource,
};
