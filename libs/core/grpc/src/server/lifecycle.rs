//! Server lifecycle: build, start, drain, terminate.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::service::RoutesBuilder;
use tonic::transport::Server;
use tonic_health::server::HealthReporter;
use tracing::{debug, error, info, warn};

use super::config::ServerConfig;
use super::registry::ServiceDescriptor;
use crate::error::{GrpcError, GrpcResult};

/// Lifecycle states of a server. Transitions only move forward.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerState {
    Created,
    Starting,
    /// Transport is accepting connections on the bound address
    Running(SocketAddr),
    /// Graceful drain in progress: no new work, in-flight calls finishing
    Draining,
    Terminated,
}

impl ServerState {
    fn rank(&self) -> u8 {
        match self {
            ServerState::Created => 0,
            ServerState::Starting => 1,
            ServerState::Running(_) => 2,
            ServerState::Draining => 3,
            ServerState::Terminated => 4,
        }
    }
}

/// Advance the published state, ignoring anything that would move backwards.
fn advance(state: &watch::Sender<ServerState>, next: ServerState) {
    state.send_if_modified(|current| {
        if next.rank() > current.rank() {
            *current = next;
            true
        } else {
            false
        }
    });
}

type ConfigureHook = Box<dyn FnOnce(Server) -> Server + Send>;

/// A built-but-not-started gRPC server.
///
/// [`build`](Self::build) assembles the router from discovered services (plus
/// the standard health service) and validates configuration;
/// [`start`](Self::start) binds the listener and produces the running
/// [`ServerHandle`].
pub struct GrpcServer {
    config: ServerConfig,
    routes: RoutesBuilder,
    service_names: Vec<String>,
    configure: Option<ConfigureHook>,
    health: HealthReporter,
    state: watch::Sender<ServerState>,
}

impl GrpcServer {
    /// Construct a server on the configured port with every discovered
    /// service registered.
    ///
    /// `configure` may adjust the transport builder before it is finalized:
    /// the extension point for concurrency limits, timeouts, or anything
    /// else tonic's builder exposes.
    pub fn build(
        config: ServerConfig,
        services: Vec<ServiceDescriptor>,
        configure: impl FnOnce(Server) -> Server + Send + 'static,
    ) -> GrpcResult<Self> {
        config.validate()?;

        let (state, _) = watch::channel(ServerState::Created);

        let (health, health_service) = tonic_health::server::health_reporter();
        let mut routes = RoutesBuilder::default();
        routes.add_service(health_service);

        let mut service_names = Vec::with_capacity(services.len());
        for descriptor in services {
            let (name, binding) = descriptor.into_parts();
            binding.register(&mut routes);
            info!(service = %name, "Service registered");
            service_names.push(name);
        }

        advance(&state, ServerState::Starting);
        Ok(Self {
            config,
            routes,
            service_names,
            configure: Some(Box::new(configure)),
            health,
            state,
        })
    }

    /// Names of the services bound at build time.
    pub fn service_names(&self) -> &[String] {
        &self.service_names
    }

    /// Observe lifecycle transitions. `Running` carries the bound address
    /// and is published only once the transport accepts connections. This is
    /// the hook point for readiness reactions.
    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// Start the transport.
    ///
    /// Binds the configured address, spawns the serve task, marks every
    /// bound service as SERVING and publishes `Running`. Bind failures
    /// propagate and leave the state at `Starting`; callers must not
    /// assume the server runs without this returning `Ok`.
    pub async fn start(mut self) -> GrpcResult<ServerHandle> {
        let addr: SocketAddr = self.config.socket_addr().map_err(|e| {
            GrpcError::InvalidConfig(format!("{}: {e}", self.config.addr_string()))
        })?;

        info!(addr = %self.config.addr_string(), "Starting gRPC server");

        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        let mut builder = Server::builder();
        #[cfg(feature = "tls")]
        {
            builder = self.apply_tls(builder)?;
        }
        if let Some(configure) = self.configure.take() {
            builder = configure(builder);
        }
        let router = builder.add_routes(self.routes.routes());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let state = self.state.clone();
        let serve = tokio::spawn(async move {
            let result = router
                .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(ref e) = result {
                error!(error = %e, "gRPC server terminated unexpectedly");
            }
            advance(&state, ServerState::Terminated);
            result
        });

        for name in &self.service_names {
            self.health
                .set_service_status(name, tonic_health::ServingStatus::Serving)
                .await;
        }
        // Empty service name serves generic (e.g. k8s) health probes.
        self.health
            .set_service_status("", tonic_health::ServingStatus::Serving)
            .await;

        advance(&self.state, ServerState::Running(local_addr));
        info!(
            addr = %local_addr,
            services = ?self.service_names,
            "gRPC server started"
        );

        Ok(ServerHandle {
            local_addr,
            service_names: self.service_names,
            drain_deadline: self.config.drain_deadline(),
            health: self.health,
            state: self.state,
            shutdown: Some(shutdown_tx),
            serve: Some(serve),
        })
    }

    #[cfg(feature = "tls")]
    fn apply_tls(&self, builder: Server) -> GrpcResult<Server> {
        use tonic::transport::server::ServerTlsConfig;
        use tonic::transport::{Certificate, Identity};

        let Some(material) = &self.config.tls else {
            return Ok(builder);
        };

        let cert = std::fs::read_to_string(&material.cert_path).map_err(|e| {
            GrpcError::InvalidConfig(format!("certificate {}: {e}", material.cert_path))
        })?;
        let key = std::fs::read_to_string(&material.key_path).map_err(|e| {
            GrpcError::InvalidConfig(format!("private key {}: {e}", material.key_path))
        })?;
        let mut tls = ServerTlsConfig::new().identity(Identity::from_pem(cert, key));
        if let Some(ca_path) = &material.client_ca_path {
            let ca = std::fs::read_to_string(ca_path)
                .map_err(|e| GrpcError::InvalidConfig(format!("client CA {ca_path}: {e}")))?;
            tls = tls.client_ca_root(Certificate::from_pem(ca));
        }
        builder.tls_config(tls).map_err(GrpcError::Transport)
    }
}

impl fmt::Debug for GrpcServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrpcServer")
            .field("addr", &self.config.addr_string())
            .field("services", &self.service_names)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

/// A running server instance.
///
/// Owns the shutdown sequence. State transitions are monotonic and
/// [`shutdown`](Self::shutdown) is idempotent.
pub struct ServerHandle {
    local_addr: SocketAddr,
    service_names: Vec<String>,
    drain_deadline: Duration,
    health: HealthReporter,
    state: watch::Sender<ServerState>,
    shutdown: Option<oneshot::Sender<()>>,
    serve: Option<JoinHandle<Result<(), tonic::transport::Error>>>,
}

impl ServerHandle {
    /// The address the listener actually bound (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn service_names(&self) -> &[String] {
        &self.service_names
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServerState {
        self.state.borrow().clone()
    }

    /// Observe lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// Suspend until the server reaches `Terminated`.
    ///
    /// The serve task itself keeps the process alive while the server runs;
    /// this is the explicit wait for callers with nothing else to do.
    pub async fn wait(&self) {
        let mut states = self.state.subscribe();
        loop {
            if matches!(*states.borrow_and_update(), ServerState::Terminated) {
                return;
            }
            if states.changed().await.is_err() {
                return;
            }
        }
    }

    /// Graceful-then-forced shutdown.
    ///
    /// Stops accepting new work, lets in-flight calls finish within the
    /// drain deadline, then force-terminates whatever remains. Reaches
    /// `Terminated` on every path; drain errors are logged, never
    /// propagated. Calling this again after termination is a no-op.
    pub async fn shutdown(&mut self) {
        if matches!(self.state(), ServerState::Terminated) {
            debug!("Shutdown requested on a terminated server; ignoring");
            return;
        }

        advance(&self.state, ServerState::Draining);
        info!(deadline = ?self.drain_deadline, "Shutting down gRPC server");

        for name in &self.service_names {
            self.health
                .set_service_status(name, tonic_health::ServingStatus::NotServing)
                .await;
        }
        self.health
            .set_service_status("", tonic_health::ServingStatus::NotServing)
            .await;

        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        if let Some(mut serve) = self.serve.take() {
            match timeout(self.drain_deadline, &mut serve).await {
                Ok(Ok(Ok(()))) => debug!("In-flight calls drained"),
                Ok(Ok(Err(e))) => warn!(error = %e, "Transport error while draining"),
                Ok(Err(e)) => warn!(error = %e, "Serve task failed while draining"),
                Err(_) => {
                    warn!(
                        deadline = ?self.drain_deadline,
                        "Drain deadline exceeded, forcing termination"
                    );
                    serve.abort();
                    let _ = serve.await;
                }
            }
        }

        advance(&self.state, ServerState::Terminated);
        info!("gRPC server stopped");
    }

    /// Host-lifecycle alias for [`shutdown`](Self::shutdown); never fails.
    pub async fn destroy(&mut self) {
        self.shutdown().await;
    }
}

impl fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerHandle")
            .field("addr", &self.local_addr)
            .field("services", &self.service_names)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_rank_is_strictly_increasing() {
        let states = [
            ServerState::Created,
            ServerState::Starting,
            ServerState::Running("127.0.0.1:1".parse().unwrap()),
            ServerState::Draining,
            ServerState::Terminated,
        ];
        for pair in states.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
        }
    }

    #[test]
    fn test_advance_never_moves_backwards() {
        let (state, _) = watch::channel(ServerState::Created);

        advance(&state, ServerState::Draining);
        assert_eq!(*state.borrow(), ServerState::Draining);

        // Attempting to regress to an earlier state is ignored.
        advance(&state, ServerState::Starting);
        assert_eq!(*state.borrow(), ServerState::Draining);

        advance(&state, ServerState::Terminated);
        assert_eq!(*state.borrow(), ServerState::Terminated);

        advance(&state, ServerState::Draining);
        assert_eq!(*state.borrow(), ServerState::Terminated);
    }
}
