use std::fmt;
use std::sync::{Arc, Mutex};

use tonic::service::Interceptor;

/// An interceptor shareable between the registry, per-call lists, and any
/// number of channels. The `Arc` allocation is the instance identity that
/// deduplication compares.
pub type SharedInterceptor = Arc<Mutex<dyn Interceptor + Send>>;

/// Wrap an interceptor for registration or per-call use.
pub fn shared<I>(interceptor: I) -> SharedInterceptor
where
    I: Interceptor + Send + 'static,
{
    Arc::new(Mutex::new(interceptor))
}

/// Collection of interceptors applied to every channel a factory builds,
/// independent of target.
///
/// Registration does not deduplicate; dedup happens when a channel merges
/// this registry with its per-call interceptors. Register everything during
/// initialization, before channels are built; concurrent registration and
/// channel creation needs external synchronization.
#[derive(Clone, Default)]
pub struct InterceptorRegistry {
    interceptors: Vec<SharedInterceptor>,
}

impl InterceptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an interceptor, returning the shared handle so the same
    /// instance can also be supplied per-call.
    pub fn register<I>(&mut self, interceptor: I) -> SharedInterceptor
    where
        I: Interceptor + Send + 'static,
    {
        let interceptor = shared(interceptor);
        self.register_shared(interceptor.clone());
        interceptor
    }

    /// Register an already-shared interceptor instance.
    pub fn register_shared(&mut self, interceptor: SharedInterceptor) {
        self.interceptors.push(interceptor);
    }

    /// Registered interceptors, in registration order.
    pub fn list(&self) -> &[SharedInterceptor] {
        &self.interceptors
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }
}

impl fmt::Debug for InterceptorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorRegistry")
            .field("len", &self.interceptors.len())
            .finish()
    }
}
