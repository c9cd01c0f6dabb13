//! Interceptors applied around outbound calls.
//!
//! The [`InterceptorRegistry`] holds the interceptors every channel gets;
//! per-call extras are merged in at channel creation through
//! [`InterceptorStack::merge`], deduplicated by instance identity so no
//! interceptor runs twice on one call.

mod auth;
mod registry;
mod request_id;
mod stack;

pub use auth::AuthInterceptor;
pub use registry::{InterceptorRegistry, SharedInterceptor, shared};
pub use request_id::RequestIdInterceptor;
pub use stack::InterceptorStack;

/// Re-export tonic's Interceptor trait for convenience
pub use tonic::service::Interceptor;
