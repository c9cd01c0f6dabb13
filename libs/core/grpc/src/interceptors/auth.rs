use tonic::{Request, Status};

/// Interceptor injecting an `authorization` header into every call.
///
/// # Example
/// ```ignore
/// use grpc_runtime::{AuthInterceptor, InterceptorRegistry};
///
/// let mut registry = InterceptorRegistry::new();
/// registry.register(AuthInterceptor::bearer("my-jwt-token"));
/// ```
#[derive(Clone, Debug)]
pub struct AuthInterceptor {
    header_value: String,
}

impl AuthInterceptor {
    /// Bearer token (OAuth 2.0 / JWT) authorization.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            header_value: format!("Bearer {}", token.into()),
        }
    }

    /// A verbatim authorization header value, e.g. `Basic dXNlcjpwYXNz`.
    pub fn custom(value: impl Into<String>) -> Self {
        Self {
            header_value: value.into(),
        }
    }
}

impl tonic::service::Interceptor for AuthInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        request.metadata_mut().insert(
            "authorization",
            self.header_value
                .parse()
                .map_err(|_| Status::internal("Invalid auth header"))?,
        );
        Ok(request)
    }
}
