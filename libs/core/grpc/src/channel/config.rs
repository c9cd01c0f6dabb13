use std::time::Duration;

use core_config::{ConfigError, FromEnv, env_flag, env_or_default, env_parsed};
use tonic::codec::CompressionEncoding;
use tonic::transport::Endpoint;

use crate::error::{GrpcError, GrpcResult};

/// Transport negotiation for outbound channels
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NegotiationType {
  #[default]
  Plaintext,
  Tls,
}

impl NegotiationType {
  pub(crate) fn uri_scheme(&self) -> &'static str {
    match self {
      NegotiationType::Plaintext => "http",
      NegotiationType::Tls => "https",
    }
  }

  fn parse(raw: &str) -> Result<Self, ConfigError> {
    if raw.eq_ignore_ascii_case("plaintext") {
      Ok(NegotiationType::Plaintext)
    } else if raw.eq_ignore_ascii_case("tls") {
      Ok(NegotiationType::Tls)
    } else {
      Err(ConfigError::ParseError {
        key: "GRPC_NEGOTIATION".to_string(),
        details: format!("expected PLAINTEXT or TLS, got '{raw}'"),
      })
    }
  }
}

/// TLS material for outbound channels: PEM file paths supplied through
/// configuration. Honored only when built with the `tls` feature.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientTlsMaterial {
  /// CA certificate used to verify the server
  pub ca_cert_path: Option<String>,
  /// Expected server domain name, when it differs from the target host
  pub domain_name: Option<String>,
}

/// Configuration for channels built by [`ChannelFactory`](super::ChannelFactory)
///
/// Options follow a leave-defaults-alone rule: disabled keep-alive means no
/// keep-alive calls on the endpoint at all, and a zero message-size cap
/// keeps the transport default rather than capping at zero.
#[derive(Clone, Debug)]
pub struct ChannelConfig {
  pub negotiation: NegotiationType,

  // Keep-alive; probing is off unless enabled AND the interval is non-zero
  pub enable_keep_alive: bool,
  pub keep_alive_time: Duration,
  pub keep_alive_timeout: Duration,
  pub keep_alive_while_idle: bool,

  /// Upper bound on a single inbound message, bytes; 0 = transport default
  pub max_inbound_message_size: usize,
  /// Advertise acceptance of compressed response streams
  pub full_stream_decompression: bool,

  // Connection settings
  pub connect_timeout: Duration,
  pub request_timeout: Duration,
  pub tcp_nodelay: bool,
  pub http2_adaptive_window: bool,

  /// Backend `host:port` entries forming the default target
  pub addresses: Vec<String>,

  pub tls: Option<ClientTlsMaterial>,
}

impl Default for ChannelConfig {
  fn default() -> Self {
    Self {
      negotiation: NegotiationType::Plaintext,
      enable_keep_alive: false,
      keep_alive_time: Duration::from_secs(60),
      keep_alive_timeout: Duration::from_secs(20),
      keep_alive_while_idle: true,
      max_inbound_message_size: 0,
      full_stream_decompression: false,
      connect_timeout: Duration::from_secs(5),
      request_timeout: Duration::from_secs(30),
      tcp_nodelay: true,
      http2_adaptive_window: true,
      addresses: Vec::new(),
      tls: None,
    }
  }
}

impl ChannelConfig {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_negotiation(mut self, negotiation: NegotiationType) -> Self {
    self.negotiation = negotiation;
    self
  }

  /// Enable keep-alive probing with the given interval and timeout
  pub fn with_keep_alive(mut self, time: Duration, timeout: Duration) -> Self {
    self.enable_keep_alive = true;
    self.keep_alive_time = time;
    self.keep_alive_timeout = timeout;
    self
  }

  pub fn without_keep_alive(mut self) -> Self {
    self.enable_keep_alive = false;
    self
  }

  pub fn with_max_inbound_message_size(mut self, bytes: usize) -> Self {
    self.max_inbound_message_size = bytes;
    self
  }

  pub fn with_full_stream_decompression(mut self) -> Self {
    self.full_stream_decompression = true;
    self
  }

  pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
    self.connect_timeout = timeout;
    self
  }

  pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
    self.request_timeout = timeout;
    self
  }

  pub fn with_addresses(mut self, addresses: impl IntoIterator<Item = impl Into<String>>) -> Self {
    self.addresses = addresses.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_tls(mut self, tls: ClientTlsMaterial) -> Self {
    self.tls = Some(tls);
    self
  }

  /// Keep-alive parameters to apply, or `None` to keep transport defaults.
  /// Disabled or zero-interval keep-alive yields `None`, never a
  /// zero-duration probe.
  pub fn keep_alive_params(&self) -> Option<(Duration, Duration)> {
    if self.enable_keep_alive && !self.keep_alive_time.is_zero() {
      Some((self.keep_alive_time, self.keep_alive_timeout))
    } else {
      None
    }
  }

  /// Message-size cap to apply on clients, or `None` for transport default
  pub fn max_inbound_size(&self) -> Option<usize> {
    (self.max_inbound_message_size > 0).then_some(self.max_inbound_message_size)
  }

  /// Compression the client advertises it accepts, when whole-stream
  /// decompression is enabled
  pub fn accept_encoding(&self) -> Option<CompressionEncoding> {
    self
      .full_stream_decompression
      .then_some(CompressionEncoding::Zstd)
  }

  /// Default target assembled from the configured backend addresses
  pub fn default_target(&self) -> GrpcResult<String> {
    if self.addresses.is_empty() {
      return Err(GrpcError::InvalidConfig(
        "no backend addresses configured".to_string(),
      ));
    }
    Ok(format!(
      "{}://{}",
      crate::resolver::ADDRESS_SCHEME,
      self.addresses.join(",")
    ))
  }

  pub(crate) fn validate(&self) -> GrpcResult<()> {
    #[cfg(not(feature = "tls"))]
    if self.negotiation == NegotiationType::Tls {
      return Err(GrpcError::InvalidConfig(
        "TLS negotiation requested but built without the 'tls' feature".to_string(),
      ));
    }
    Ok(())
  }

  /// Apply this configuration to a tonic Endpoint. Keep-alive is only
  /// touched when actually enabled, leaving tonic's defaults otherwise.
  pub(crate) fn apply_to_endpoint(&self, mut endpoint: Endpoint) -> Endpoint {
    if let Some((time, timeout)) = self.keep_alive_params() {
      endpoint = endpoint
        .http2_keep_alive_interval(time)
        .keep_alive_timeout(timeout)
        .keep_alive_while_idle(self.keep_alive_while_idle);
    }

    endpoint
      .connect_timeout(self.connect_timeout)
      .timeout(self.request_timeout)
      .tcp_nodelay(self.tcp_nodelay)
      .http2_adaptive_window(self.http2_adaptive_window)
  }
}

impl FromEnv for ChannelConfig {
  /// Reads:
  /// - `GRPC_NEGOTIATION` (default: PLAINTEXT)
  /// - `GRPC_KEEP_ALIVE` (default: false)
  /// - `GRPC_KEEP_ALIVE_TIME_SECS` / `GRPC_KEEP_ALIVE_TIMEOUT_SECS` (default: 60 / 20)
  /// - `GRPC_MAX_INBOUND_MESSAGE_SIZE` (default: 0, transport default)
  /// - `GRPC_FULL_STREAM_DECOMPRESSION` (default: false)
  /// - `GRPC_ADDRESSES` (comma-separated `host:port` entries)
  fn from_env() -> Result<Self, ConfigError> {
    let negotiation = NegotiationType::parse(&env_or_default("GRPC_NEGOTIATION", "PLAINTEXT"))?;
    let enable_keep_alive = env_flag("GRPC_KEEP_ALIVE", false);
    let keep_alive_time = Duration::from_secs(env_parsed("GRPC_KEEP_ALIVE_TIME_SECS", 60u64)?);
    let keep_alive_timeout =
      Duration::from_secs(env_parsed("GRPC_KEEP_ALIVE_TIMEOUT_SECS", 20u64)?);
    let max_inbound_message_size = env_parsed("GRPC_MAX_INBOUND_MESSAGE_SIZE", 0usize)?;
    let full_stream_decompression = env_flag("GRPC_FULL_STREAM_DECOMPRESSION", false);
    let addresses = env_or_default("GRPC_ADDRESSES", "")
      .split(',')
      .map(str::trim)
      .filter(|entry| !entry.is_empty())
      .map(String::from)
      .collect();

    Ok(Self {
      negotiation,
      enable_keep_alive,
      keep_alive_time,
      keep_alive_timeout,
      max_inbound_message_size,
      full_stream_decompression,
      addresses,
      ..Self::default()
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_config() {
    let config = ChannelConfig::default();
    assert_eq!(config.negotiation, NegotiationType::Plaintext);
    assert!(!config.enable_keep_alive);
    assert_eq!(config.max_inbound_message_size, 0);
    assert!(!config.full_stream_decompression);
    assert_eq!(config.connect_timeout, Duration::from_secs(5));
    assert!(config.tcp_nodelay);
  }

  #[test]
  fn test_builder_pattern() {
    let config = ChannelConfig::new()
      .with_keep_alive(Duration::from_secs(30), Duration::from_secs(10))
      .with_max_inbound_message_size(8 * 1024 * 1024)
      .with_full_stream_decompression()
      .with_request_timeout(Duration::from_secs(120));

    assert!(config.enable_keep_alive);
    assert_eq!(config.keep_alive_time, Duration::from_secs(30));
    assert_eq!(config.max_inbound_message_size, 8 * 1024 * 1024);
    assert!(config.full_stream_decompression);
    assert_eq!(config.request_timeout, Duration::from_secs(120));
  }

  #[test]
  fn test_keep_alive_disabled_keeps_transport_defaults() {
    let config = ChannelConfig::default();
    assert_eq!(config.keep_alive_params(), None);

    let config = ChannelConfig::new()
      .with_keep_alive(Duration::from_secs(30), Duration::from_secs(10))
      .without_keep_alive();
    assert_eq!(config.keep_alive_params(), None);
  }

  #[test]
  fn test_zero_keep_alive_interval_disables_probing() {
    let config = ChannelConfig::new().with_keep_alive(Duration::ZERO, Duration::from_secs(10));
    assert_eq!(config.keep_alive_params(), None);
  }

  #[test]
  fn test_enabled_keep_alive_params() {
    let config =
      ChannelConfig::new().with_keep_alive(Duration::from_secs(30), Duration::from_secs(10));
    assert_eq!(
      config.keep_alive_params(),
      Some((Duration::from_secs(30), Duration::from_secs(10)))
    );
  }

  #[test]
  fn test_zero_message_size_means_transport_default() {
    assert_eq!(ChannelConfig::default().max_inbound_size(), None);
    assert_eq!(
      ChannelConfig::new()
        .with_max_inbound_message_size(4096)
        .max_inbound_size(),
      Some(4096)
    );
  }

  #[test]
  fn test_accept_encoding() {
    assert_eq!(ChannelConfig::default().accept_encoding(), None);
    assert!(
      ChannelConfig::new()
        .with_full_stream_decompression()
        .accept_encoding()
        .is_some()
    );
  }

  #[test]
  fn test_default_target() {
    let config = ChannelConfig::new().with_addresses(["h1:1000", "h2:2000"]);
    assert_eq!(config.default_target().unwrap(), "address://h1:1000,h2:2000");

    assert!(ChannelConfig::default().default_target().is_err());
  }

  #[test]
  fn test_from_env() {
    temp_env::with_vars(
      [
        ("GRPC_NEGOTIATION", Some("plaintext")),
        ("GRPC_KEEP_ALIVE", Some("true")),
        ("GRPC_KEEP_ALIVE_TIME_SECS", Some("30")),
        ("GRPC_MAX_INBOUND_MESSAGE_SIZE", Some("1048576")),
        ("GRPC_ADDRESSES", Some("h1:1000, h2:2000")),
      ],
      || {
        let config = ChannelConfig::from_env().unwrap();
        assert_eq!(config.negotiation, NegotiationType::Plaintext);
        assert!(config.enable_keep_alive);
        assert_eq!(config.keep_alive_time, Duration::from_secs(30));
        assert_eq!(config.max_inbound_message_size, 1048576);
        assert_eq!(config.addresses, vec!["h1:1000", "h2:2000"]);
      },
    );
  }

  #[test]
  fn test_from_env_invalid_negotiation_names_key() {
    temp_env::with_var("GRPC_NEGOTIATION", Some("quic"), || {
      let err = ChannelConfig::from_env().unwrap_err();
      assert!(err.to_string().contains("GRPC_NEGOTIATION"));
    });
  }

  #[test]
  fn test_from_env_invalid_size_names_key() {
    temp_env::with_var("GRPC_MAX_INBOUND_MESSAGE_SIZE", Some("lots"), || {
      let err = ChannelConfig::from_env().unwrap_err();
      assert!(err.to_string().contains("GRPC_MAX_INBOUND_MESSAGE_SIZE"));
    });
  }
}
