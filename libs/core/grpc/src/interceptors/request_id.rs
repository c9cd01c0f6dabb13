//! Request correlation interceptor.

use tonic::{Request, Status};

/// Injects correlation headers into every outgoing request:
///
/// - `x-request-id`: fresh UUID per call
/// - `traceparent`: W3C Trace Context (`version-trace_id-span_id-flags`)
/// - `x-source-service`: originating service name, when configured
#[derive(Clone, Debug, Default)]
pub struct RequestIdInterceptor {
    service_name: Option<String>,
}

impl RequestIdInterceptor {
    pub fn new() -> Self {
        Self { service_name: None }
    }

    /// Tag outgoing requests with the originating service's name.
    pub fn with_service_name(service_name: impl Into<String>) -> Self {
        Self {
            service_name: Some(service_name.into()),
        }
    }

    fn traceparent() -> String {
        let trace_id = uuid::Uuid::new_v4().as_simple().to_string();
        let span_id = &uuid::Uuid::new_v4().as_simple().to_string()[..16];
        format!("00-{trace_id}-{span_id}-01")
    }
}

impl tonic::service::Interceptor for RequestIdInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        if let Some(name) = &self.service_name {
            if let Ok(value) = name.parse() {
                request.metadata_mut().insert("x-source-service", value);
            }
        }

        let request_id = uuid::Uuid::new_v4().to_string();
        request.metadata_mut().insert(
            "x-request-id",
            request_id
                .parse()
                .map_err(|_| Status::internal("Failed to create request ID"))?,
        );
        request.metadata_mut().insert(
            "traceparent",
            Self::traceparent()
                .parse()
                .map_err(|_| Status::internal("Failed to create traceparent header"))?,
        );

        tracing::trace!(
            target: "grpc_runtime",
            request_id = %request_id,
            "Outgoing gRPC request"
        );
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::service::Interceptor;

    #[test]
    fn test_injects_request_id() {
        let mut interceptor = RequestIdInterceptor::new();
        let request = interceptor.call(Request::new(())).unwrap();

        let id = request.metadata().get("x-request-id").unwrap();
        assert!(uuid::Uuid::parse_str(id.to_str().unwrap()).is_ok());
    }

    #[test]
    fn test_traceparent_format() {
        let traceparent = RequestIdInterceptor::traceparent();
        let parts: Vec<&str> = traceparent.split('-').collect();

        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "00");
        assert_eq!(parts[1].len(), 32);
        assert_eq!(parts[2].len(), 16);
        assert_eq!(parts[3], "01");
    }

    #[test]
    fn test_source_service_header() {
        let mut interceptor = RequestIdInterceptor::with_service_name("billing");
        let request = interceptor.call(Request::new(())).unwrap();

        let source = request.metadata().get("x-source-service").unwrap();
        assert_eq!(source.to_str().unwrap(), "billing");
    }
}
