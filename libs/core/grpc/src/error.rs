use thiserror::Error;

pub type GrpcResult<T> = Result<T, GrpcError>;

/// Errors that can occur while discovering services, managing the server
/// lifecycle, or building client channels
#[derive(Error, Debug)]
pub enum GrpcError {
  /// Channel target is empty or not a `scheme://entries` string
  #[error("Invalid target: {0}")]
  InvalidTarget(String),

  /// No registered resolver claims the target's scheme
  #[error("No resolver available for scheme '{0}'")]
  UnsupportedScheme(String),

  /// A backend entry could not be parsed as `host:port`
  #[error("Invalid backend address '{0}'")]
  InvalidAddress(String),

  /// Invalid configuration
  #[error("Invalid configuration: {0}")]
  InvalidConfig(String),

  /// Candidates tagged for export that expose no service binding.
  /// Batched: every offender is named, not just the first.
  #[error("The following services are tagged for export but expose no gRPC binding: {}", .0.join(", "))]
  UnbindableServices(Vec<String>),

  /// The same service name was discovered more than once
  #[error("Duplicate service registrations: {}", .0.join(", "))]
  DuplicateServices(Vec<String>),

  /// Failed to bind the server listener
  #[error("Failed to bind server listener: {0}")]
  Bind(#[from] std::io::Error),

  /// Transport-level failure from tonic
  #[error("Transport error: {0}")]
  Transport(#[from] tonic::transport::Error),

  /// The balanced channel's discovery queue is gone
  #[error("Load balancer rejected the address update")]
  BalancerClosed,
}

// Implement conversion to tonic::Status for use in interceptors
impl From<GrpcError> for tonic::Status {
  fn from(err: GrpcError) -> Self {
    match err {
      GrpcError::InvalidTarget(_)
      | GrpcError::UnsupportedScheme(_)
      | GrpcError::InvalidAddress(_)
      | GrpcError::InvalidConfig(_) => tonic::Status::invalid_argument(err.to_string()),
      GrpcError::UnbindableServices(_) | GrpcError::DuplicateServices(_) => {
        tonic::Status::failed_precondition(err.to_string())
      }
      GrpcError::Bind(_) | GrpcError::Transport(_) | GrpcError::BalancerClosed => {
        tonic::Status::unavailable(err.to_string())
      }
    }
  }
}
