use std::fmt;
use std::sync::{Arc, PoisonError};

use tonic::service::Interceptor;
use tonic::{Request, Status};

use super::registry::SharedInterceptor;

/// The effective interceptor chain of one channel.
///
/// Built by [`merge`](Self::merge): global interceptors first, then the
/// per-call extras, deduplicated by instance identity keeping the first
/// occurrence. An instance appearing in both lists runs once per call.
#[derive(Clone, Default)]
pub struct InterceptorStack {
    interceptors: Vec<SharedInterceptor>,
}

impl InterceptorStack {
    pub fn merge(global: &[SharedInterceptor], extra: &[SharedInterceptor]) -> Self {
        let mut interceptors: Vec<SharedInterceptor> =
            Vec::with_capacity(global.len() + extra.len());
        for candidate in global.iter().chain(extra) {
            if !interceptors.iter().any(|kept| same_instance(kept, candidate)) {
                interceptors.push(candidate.clone());
            }
        }
        Self { interceptors }
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }
}

/// Identity comparison: same `Arc` allocation, not structural equality.
fn same_instance(a: &SharedInterceptor, b: &SharedInterceptor) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl Interceptor for InterceptorStack {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        for interceptor in &self.interceptors {
            let mut guard = interceptor.lock().unwrap_or_else(PoisonError::into_inner);
            request = guard.call(request)?;
        }
        Ok(request)
    }
}

impl fmt::Debug for InterceptorStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorStack")
            .field("len", &self.interceptors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptors::shared;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Default)]
    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    impl Interceptor for Counting {
        fn call(&mut self, request: Request<()>) -> Result<Request<()>, Status> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(request)
        }
    }

    #[test]
    fn test_merge_dedups_by_identity_keeping_order() {
        let a = shared(Counting::default());
        let b = shared(Counting::default());
        let c = shared(Counting::default());

        // Global {a, b}, per-call {b, c} => effective [a, b, c].
        let stack = InterceptorStack::merge(&[a.clone(), b.clone()], &[b.clone(), c.clone()]);
        assert_eq!(stack.len(), 3);
        assert!(same_instance(&stack.interceptors[0], &a));
        assert!(same_instance(&stack.interceptors[1], &b));
        assert!(same_instance(&stack.interceptors[2], &c));
    }

    #[test]
    fn test_merge_keeps_distinct_instances_of_one_type() {
        let first = shared(Counting::default());
        let second = shared(Counting::default());

        let stack = InterceptorStack::merge(&[first], &[second]);
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn test_duplicated_instance_runs_once_per_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let interceptor = shared(Counting {
            calls: calls.clone(),
        });

        let mut stack = InterceptorStack::merge(
            std::slice::from_ref(&interceptor),
            std::slice::from_ref(&interceptor),
        );
        stack.call(Request::new(())).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_merge() {
        let stack = InterceptorStack::merge(&[], &[]);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_call_runs_interceptors_in_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let first = shared(Counting {
            calls: calls.clone(),
        });
        let second = shared(Counting {
            calls: calls.clone(),
        });

        let mut stack = InterceptorStack::merge(&[first], &[second]);
        stack.call(Request::new(())).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
