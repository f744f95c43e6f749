//! `RelayServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::api::routes;
use crate::api::surface::CommandSurface;
use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::relay::control::{ControlScriptProvider, DefaultControlScript};
use crate::relay::correlation::CorrelationTable;
use crate::relay::notifications::NotificationQueue;
use crate::relay::orchestrator::Relay;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::handler::ws_handler;
use crate::websocket::registry::ConnectionRegistry;

/// How often expired cached outcomes are purged.
const RESULT_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Caller-facing operations.
    pub surface: Arc<CommandSurface>,
    /// Orchestrator (also reachable through the surface).
    pub relay: Arc<Relay>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// When the server started.
    pub start_time: Instant,
}

/// The relay server.
pub struct RelayServer {
    config: Arc<ServerConfig>,
    relay: Arc<Relay>,
    surface: Arc<CommandSurface>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: Option<PrometheusHandle>,
    start_time: Instant,
}

impl RelayServer {
    /// Create a server using the default in-page control script.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_control_script(config, Arc::new(DefaultControlScript))
    }

    /// Create a server with a custom control script provider.
    pub fn with_control_script(
        config: ServerConfig,
        control_script: Arc<dyn ControlScriptProvider>,
    ) -> Self {
        let correlation = Arc::new(CorrelationTable::new());
        let registry = Arc::new(ConnectionRegistry::new(
            Arc::clone(&correlation),
            config.liveness_timeout,
        ));
        let relay = Arc::new(Relay::new(
            registry,
            correlation,
            Arc::new(NotificationQueue::default()),
        ));
        let surface = Arc::new(CommandSurface::new(
            Arc::clone(&relay),
            config.surface_config(),
            control_script,
        ));

        Self {
            config: Arc::new(config),
            relay,
            surface,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics: None,
            start_time: Instant::now(),
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            surface: Arc::clone(&self.surface),
            relay: Arc::clone(&self.relay),
            shutdown: Arc::clone(&self.shutdown),
            config: Arc::clone(&self.config),
            metrics: self.metrics.clone(),
            start_time: self.start_time,
        };

        Router::new()
            .route("/ws", get(ws_handler))
            .merge(routes::routes())
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the listener and start serving in the background.
    pub async fn start(&self) -> Result<ServerHandle, ServerError> {
        let addr = self.config.bind_addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "tabrelay listening");

        let router = self.router();
        let token = self.shutdown.token();
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "http server failed");
            }
        });

        let maintenance = spawn_result_purge(
            Arc::clone(&self.surface),
            self.shutdown.token(),
            RESULT_PURGE_INTERVAL,
        );

        Ok(ServerHandle {
            local_addr,
            relay: Arc::clone(&self.relay),
            shutdown: Arc::clone(&self.shutdown),
            tasks: vec![server, maintenance],
        })
    }

    /// The orchestrator.
    pub fn relay(&self) -> &Arc<Relay> {
        &self.relay
    }

    /// The command surface.
    pub fn surface(&self) -> &Arc<CommandSurface> {
        &self.surface
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Handle returned by [`RelayServer::start`]. Keeps background tasks alive.
pub struct ServerHandle {
    local_addr: SocketAddr,
    relay: Arc<Relay>,
    shutdown: Arc<ShutdownCoordinator>,
    tasks: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Address actually bound (resolves port `0`).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop serving, fail pending requests and wait for tasks.
    pub async fn shutdown(self, timeout: Option<Duration>) {
        self.shutdown
            .graceful_shutdown(&self.relay, self.tasks, timeout)
            .await;
    }
}

fn spawn_result_purge(
    surface: Arc<CommandSurface>,
    cancel: tokio_util::sync::CancellationToken,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = surface.purge_expired_results();
                    if removed > 0 {
                        debug!(removed, "purged expired results");
                    }
                }
                () = cancel.cancelled() => break,
            }
        }
    })
}
