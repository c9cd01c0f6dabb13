//! Server configuration loaded from environment variables.

use std::net::{AddrParseError, SocketAddr};
use std::time::Duration;

use core_config::{ConfigError, FromEnv, env_or_default, env_parsed};

use crate::error::GrpcResult;

/// TLS material for the server listener: PEM file paths supplied through
/// configuration. Honored only when built with the `tls` feature.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServerTlsMaterial {
    pub cert_path: String,
    pub key_path: String,
    /// CA bundle for verifying client certificates; set to require mTLS
    pub client_ca_path: Option<String>,
}

/// Configuration for the gRPC server lifecycle.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind to (default: [::1] for IPv6 localhost)
    pub host: String,
    /// Port to listen on (default: 50051); 0 picks an ephemeral port
    pub port: u16,
    /// Graceful-drain deadline before in-flight work is force-terminated
    pub shutdown_delay_millis: u64,
    pub tls: Option<ServerTlsMaterial>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "[::1]".to_string(),
            port: 50051,
            shutdown_delay_millis: 3_000,
            tls: None,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the graceful-drain deadline in milliseconds.
    pub fn with_shutdown_delay(mut self, millis: u64) -> Self {
        self.shutdown_delay_millis = millis;
        self
    }

    pub fn with_tls(mut self, tls: ServerTlsMaterial) -> Self {
        self.tls = Some(tls);
        self
    }

    /// The drain deadline as a duration.
    pub fn drain_deadline(&self) -> Duration {
        Duration::from_millis(self.shutdown_delay_millis)
    }

    /// Get the socket address to bind to.
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    /// Get the address string (for logging).
    pub fn addr_string(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub(crate) fn validate(&self) -> GrpcResult<()> {
        #[cfg(not(feature = "tls"))]
        if self.tls.is_some() {
            return Err(crate::error::GrpcError::InvalidConfig(
                "TLS material configured but built without the 'tls' feature".to_string(),
            ));
        }
        Ok(())
    }
}

impl FromEnv for ServerConfig {
    /// Reads:
    /// - `GRPC_HOST` (default: [::1])
    /// - `GRPC_PORT` (default: 50051)
    /// - `GRPC_SHUTDOWN_DELAY_MS` (default: 3000)
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env_or_default("GRPC_HOST", "[::1]"),
            port: env_parsed("GRPC_PORT", 50051)?,
            shutdown_delay_millis: env_parsed("GRPC_SHUTDOWN_DELAY_MS", 3_000)?,
            tls: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "[::1]");
        assert_eq!(config.port, 50051);
        assert_eq!(config.drain_deadline(), Duration::from_millis(3_000));
        assert!(config.tls.is_none());
    }

    #[test]
    fn test_builder_pattern() {
        let config = ServerConfig::new()
            .with_host("0.0.0.0")
            .with_port(9090)
            .with_shutdown_delay(500);

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9090);
        assert_eq!(config.drain_deadline(), Duration::from_millis(500));
    }

    #[test]
    fn test_socket_addr() {
        let config = ServerConfig::new().with_host("127.0.0.1").with_port(9090);
        let addr = config.socket_addr().unwrap();
        assert_eq!(addr.port(), 9090);

        let config = ServerConfig::new().with_host("not a host");
        assert!(config.socket_addr().is_err());
    }

    #[test]
    fn test_from_env() {
        temp_env::with_vars(
            [
                ("GRPC_HOST", Some("0.0.0.0")),
                ("GRPC_PORT", Some("9090")),
                ("GRPC_SHUTDOWN_DELAY_MS", Some("750")),
            ],
            || {
                let config = ServerConfig::from_env().unwrap();
                assert_eq!(config.host, "0.0.0.0");
                assert_eq!(config.port, 9090);
                assert_eq!(config.shutdown_delay_millis, 750);
            },
        );
    }

    #[test]
    fn test_from_env_defaults() {
        temp_env::with_vars(
            [
                ("GRPC_HOST", None::<&str>),
                ("GRPC_PORT", None),
                ("GRPC_SHUTDOWN_DELAY_MS", None),
            ],
            || {
                let config = ServerConfig::from_env().unwrap();
                assert_eq!(config.host, "[::1]");
                assert_eq!(config.port, 50051);
                assert_eq!(config.shutdown_delay_millis, 3_000);
            },
        );
    }

    #[test]
    fn test_from_env_invalid_port_names_key() {
        temp_env::with_var("GRPC_PORT", Some("not_a_port"), || {
            let err = ServerConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("GRPC_PORT"));
        });
    }
}
