pub mod config;

pub use config::{ChannelConfig, ClientTlsMaterial, NegotiationType};

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc::Sender;
use tonic::service::interceptor::InterceptedService;
use tonic::transport::channel::Change;
use tonic::transport::{Channel, Endpoint};

use crate::client::ConfigurableClient;
use crate::error::{GrpcError, GrpcResult};
use crate::interceptors::{InterceptorRegistry, InterceptorStack, SharedInterceptor};
use crate::resolver::{AddressSet, BackendAddr, NameResolver, ResolverRegistry};

/// Room in the balancer's discovery queue beyond the initial membership
const BALANCE_QUEUE_SLACK: usize = 16;

/// Builds outbound channels for named logical targets.
///
/// Each channel gets the factory's resolver set, tonic's balanced transport
/// as the load-balancing policy attachment point, the transport tuning from
/// [`ChannelConfig`], and the merged interceptor chain (registry first, then
/// per-call extras, deduplicated by instance identity).
///
/// ## Example
/// ```ignore
/// use grpc_runtime::{ChannelConfig, ChannelFactory};
///
/// let factory = ChannelFactory::new(ChannelConfig::default())?;
/// let channel = factory.create_channel("address://[::1]:50051").await?;
/// let client = TasksServiceClient::new(channel.service());
/// ```
pub struct ChannelFactory {
  config: ChannelConfig,
  interceptors: InterceptorRegistry,
  resolvers: ResolverRegistry,
}

impl ChannelFactory {
  pub fn new(config: ChannelConfig) -> GrpcResult<Self> {
    Self::with_interceptors(config, InterceptorRegistry::new())
  }

  /// A factory applying the given registry's interceptors to every channel
  /// it builds. Independent factories can carry independent registries.
  pub fn with_interceptors(
    config: ChannelConfig,
    interceptors: InterceptorRegistry,
  ) -> GrpcResult<Self> {
    config.validate()?;
    Ok(Self {
      config,
      interceptors,
      resolvers: ResolverRegistry::new(),
    })
  }

  /// Register a resolver for schemes beyond the default `address://`
  pub fn register_resolver(&mut self, resolver: Arc<dyn NameResolver>) {
    self.resolvers.register(resolver);
  }

  pub fn config(&self) -> &ChannelConfig {
    &self.config
  }

  pub fn interceptors(&self) -> &InterceptorRegistry {
    &self.interceptors
  }

  /// Channel to `target` with no per-call interceptors
  pub async fn create_channel(&self, target: &str) -> GrpcResult<ChannelHandle> {
    self.create_channel_with_interceptors(target, Vec::new()).await
  }

  /// Channel to the target assembled from the configured backend addresses
  pub async fn create_configured_channel(&self) -> GrpcResult<ChannelHandle> {
    let target = self.config.default_target()?;
    self.create_channel(&target).await
  }

  /// Build a fully configured channel: resolve the target, hand the address
  /// set to the balancer, apply transport tuning, and wrap the result in
  /// the effective interceptor chain.
  ///
  /// Handles are not cached; every call produces an independent one.
  pub async fn create_channel_with_interceptors(
    &self,
    target: &str,
    extra: Vec<SharedInterceptor>,
  ) -> GrpcResult<ChannelHandle> {
    let target = target.trim();
    if target.is_empty() {
      return Err(GrpcError::InvalidTarget("empty target name".to_string()));
    }

    let addresses = self.resolvers.resolve(target).inspect_err(|e| {
      tracing::error!(
        target: "grpc_runtime",
        channel_target = %target,
        error = %e,
        "Target resolution failed"
      );
    })?;

    let (channel, balance_tx) =
      Channel::balance_channel::<BackendAddr>(addresses.len() + BALANCE_QUEUE_SLACK);
    for addr in addresses.entries() {
      let endpoint = endpoint_for(&self.config, addr)?;
      balance_tx
        .send(Change::Insert(addr.clone(), endpoint))
        .await
        .map_err(|_| GrpcError::BalancerClosed)?;
    }

    let stack = InterceptorStack::merge(self.interceptors.list(), &extra);
    tracing::debug!(
      target: "grpc_runtime",
      channel_target = %target,
      backends = addresses.len(),
      interceptors = stack.len(),
      "Created gRPC channel"
    );

    Ok(ChannelHandle {
      service: InterceptedService::new(channel, stack),
      config: self.config.clone(),
      addresses,
      balance_tx,
    })
  }
}

impl fmt::Debug for ChannelFactory {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ChannelFactory")
      .field("config", &self.config)
      .field("interceptors", &self.interceptors)
      .field("resolvers", &self.resolvers)
      .finish()
  }
}

/// Endpoint for one backend under the factory's configuration
fn endpoint_for(config: &ChannelConfig, addr: &BackendAddr) -> GrpcResult<Endpoint> {
  let uri = addr.uri(config.negotiation.uri_scheme());
  let endpoint = Endpoint::from_shared(uri.clone()).map_err(|e| {
    tracing::error!(target: "grpc_runtime", addr = %uri, error = ?e, "Invalid backend URI");
    GrpcError::Transport(e)
  })?;
  let endpoint = config.apply_to_endpoint(endpoint);
  #[cfg(feature = "tls")]
  let endpoint = apply_client_tls(config, endpoint)?;
  Ok(endpoint)
}

#[cfg(feature = "tls")]
fn apply_client_tls(config: &ChannelConfig, endpoint: Endpoint) -> GrpcResult<Endpoint> {
  use tonic::transport::{Certificate, ClientTlsConfig};

  if config.negotiation != NegotiationType::Tls {
    return Ok(endpoint);
  }

  let mut tls = ClientTlsConfig::new();
  if let Some(material) = &config.tls {
    if let Some(path) = &material.ca_cert_path {
      let pem = std::fs::read_to_string(path)
        .map_err(|e| GrpcError::InvalidConfig(format!("CA certificate {path}: {e}")))?;
      tls = tls.ca_certificate(Certificate::from_pem(pem));
    }
    if let Some(domain) = &material.domain_name {
      tls = tls.domain_name(domain);
    }
  }
  endpoint.tls_config(tls).map_err(GrpcError::Transport)
}

/// A ready-to-use client channel: the balanced transport wrapped in the
/// channel's effective interceptor chain.
#[derive(Clone)]
pub struct ChannelHandle {
  service: InterceptedService<Channel, InterceptorStack>,
  config: ChannelConfig,
  addresses: AddressSet,
  balance_tx: Sender<Change<BackendAddr, Endpoint>>,
}

impl ChannelHandle {
  pub fn target(&self) -> &str {
    self.addresses.target()
  }

  /// Current backend membership
  pub fn addresses(&self) -> &AddressSet {
    &self.addresses
  }

  /// The intercepted transport; hand this to a generated client's `new`
  pub fn service(&self) -> InterceptedService<Channel, InterceptorStack> {
    self.service.clone()
  }

  /// Apply the codec-level channel options (inbound message cap, stream
  /// decompression) to a generated client. Tonic hangs these off the client
  /// wrapper rather than the transport, so they cannot be baked into the
  /// channel itself.
  pub fn configure<T>(&self, client: T) -> T
  where
    T: ConfigurableClient,
  {
    let mut client = client;
    if let Some(limit) = self.config.max_inbound_size() {
      client = client.max_decoding_message_size(limit);
    }
    if let Some(encoding) = self.config.accept_encoding() {
      client = client.accept_compressed(encoding);
    }
    client
  }

  /// Push a membership update to the load balancer without rebuilding the
  /// channel. `next` replaces the current set; only the delta is sent.
  pub async fn update_addresses(&mut self, next: AddressSet) -> GrpcResult<()> {
    let (added, removed) = self.addresses.diff(&next);

    for addr in removed {
      self
        .balance_tx
        .send(Change::Remove(addr))
        .await
        .map_err(|_| GrpcError::BalancerClosed)?;
    }
    for addr in &added {
      let endpoint = endpoint_for(&self.config, addr)?;
      self
        .balance_tx
        .send(Change::Insert(addr.clone(), endpoint))
        .await
        .map_err(|_| GrpcError::BalancerClosed)?;
    }

    tracing::debug!(
      target: "grpc_runtime",
      channel_target = %next.target(),
      backends = next.len(),
      "Updated channel backend membership"
    );
    self.addresses = next;
    Ok(())
  }
}

impl fmt::Debug for ChannelHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ChannelHandle")
      .field("target", &self.addresses.target())
      .field("backends", &self.addresses.len())
      .finish()
  }
}
