//! Service discovery: validating candidate implementations and collecting
//! the set bound to the server.
//!
//! Candidates come from an explicit [`ServiceSource`] rather than any
//! container scanning; anything tagged for export that does not expose the
//! binding capability fails discovery, with every offender named in one
//! error.

use std::convert::Infallible;
use std::fmt;

use http::{Request, Response};
use tonic::body::Body;
use tonic::codegen::Service;
use tonic::server::NamedService;
use tonic::service::RoutesBuilder;

use crate::error::{GrpcError, GrpcResult};

/// The service-binding capability: anything that can attach a server-side
/// service definition to the router being assembled.
///
/// Blanket-implemented for every tonic-generated server wrapper, so concrete
/// service types are bindable as-is.
pub trait BindableService: Send + 'static {
    /// Fully-qualified gRPC service name.
    fn service_name(&self) -> &'static str;

    /// Attach the service to the router.
    fn register(self: Box<Self>, routes: &mut RoutesBuilder);
}

impl<S> BindableService for S
where
    S: Service<Request<Body>, Response = Response<Body>, Error = Infallible>
        + NamedService
        + Clone
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
{
    fn service_name(&self) -> &'static str {
        S::NAME
    }

    fn register(self: Box<Self>, routes: &mut RoutesBuilder) {
        routes.add_service(*self);
    }
}

/// One entry handed to discovery: something tagged for export, which may or
/// may not actually expose a service binding.
pub struct ServiceCandidate {
    name: String,
    binding: Option<Box<dyn BindableService>>,
}

impl ServiceCandidate {
    /// A candidate exposing its binding; the name comes from the service
    /// definition itself.
    pub fn new<S: BindableService>(service: S) -> Self {
        Self {
            name: service.service_name().to_string(),
            binding: Some(Box::new(service)),
        }
    }

    /// A bindable candidate exported under an explicit name.
    pub fn named<S: BindableService>(name: impl Into<String>, service: S) -> Self {
        Self {
            name: name.into(),
            binding: Some(Box::new(service)),
        }
    }

    /// A candidate tagged for export that exposes no binding. Discovery
    /// reports these as errors.
    pub fn unbound(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            binding: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ServiceCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceCandidate")
            .field("name", &self.name)
            .field("bound", &self.binding.is_some())
            .finish()
    }
}

/// Opaque provider of discovery candidates.
pub trait ServiceSource {
    fn candidates(self) -> Vec<ServiceCandidate>;
}

impl ServiceSource for Vec<ServiceCandidate> {
    fn candidates(self) -> Vec<ServiceCandidate> {
        self
    }
}

/// One discovered, validated RPC implementation.
pub struct ServiceDescriptor {
    name: String,
    binding: Box<dyn BindableService>,
}

impl ServiceDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_parts(self) -> (String, Box<dyn BindableService>) {
        (self.name, self.binding)
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("name", &self.name)
            .finish()
    }
}

/// Validates candidates and produces the bound service set.
pub struct ServiceRegistry;

impl ServiceRegistry {
    /// Check every candidate for the service-binding capability.
    ///
    /// Validation is batched for operator diagnosis: all candidates without
    /// a binding are reported in one error, as are all duplicated names. An
    /// empty result is legal; an idle server with zero services is fine.
    pub fn discover(source: impl ServiceSource) -> GrpcResult<Vec<ServiceDescriptor>> {
        let candidates = source.candidates();

        let unbindable: Vec<String> = candidates
            .iter()
            .filter(|candidate| candidate.binding.is_none())
            .map(|candidate| candidate.name.clone())
            .collect();
        if !unbindable.is_empty() {
            return Err(GrpcError::UnbindableServices(unbindable));
        }

        let mut discovered: Vec<ServiceDescriptor> = Vec::with_capacity(candidates.len());
        let mut duplicates: Vec<String> = Vec::new();
        for candidate in candidates {
            if discovered.iter().any(|d| d.name == candidate.name) {
                if !duplicates.contains(&candidate.name) {
                    duplicates.push(candidate.name.clone());
                }
                continue;
            }
            if let Some(binding) = candidate.binding {
                discovered.push(ServiceDescriptor {
                    name: candidate.name,
                    binding,
                });
            }
        }
        if !duplicates.is_empty() {
            return Err(GrpcError::DuplicateServices(duplicates));
        }

        Ok(discovered)
    }
}
