//! Startup orchestration and the serve/shutdown sequence.
//!
//! # Responsibilities
//! - Connect the backend and register every service against it
//! - Run the HTTP server until shutdown
//! - On shutdown, drain HTTP and close the backend connection concurrently
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal, nothing is retried
//! - Listeners start last (traffic only once routes are frozen)
//! - The connection is closed exactly once, by a task that only waits on the
//!   shutdown token

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::GatewayConfig;
use crate::error::StartupError;
use crate::http::{AppState, HttpServer};
use crate::lifecycle::{Phase, Shutdown};
use crate::net::{self, ConnectOptions};
use crate::routing::{MethodRegistry, Router, ServiceRegistration};
use crate::rpc::Backend;

/// How long aborted requests get to unwind after the grace period.
const ABORT_WINDOW: Duration = Duration::from_secs(1);

/// A fully initialized gateway, ready to serve.
pub struct Gateway {
    config: GatewayConfig,
    backend: Arc<dyn Backend>,
    router: Router,
    phase: watch::Sender<Phase>,
}

impl Gateway {
    /// Connect to the configured backend and register `services` against it.
    pub async fn initialize(
        config: GatewayConfig,
        services: &[ServiceRegistration],
    ) -> Result<Self, StartupError> {
        let endpoint = config.backend.endpoint().map_err(|e| {
            StartupError::Config(crate::config::ConfigError::Validation(vec![e]))
        })?;
        let options = ConnectOptions {
            connect_timeout: config.backend.connect_timeout(),
            ..Default::default()
        };

        let connection = net::connect(&endpoint, &options).await?;
        Self::with_backend(config, Arc::new(connection), services)
    }

    /// Build a gateway over an already established backend.
    pub fn with_backend<B: Backend>(
        config: GatewayConfig,
        backend: Arc<B>,
        services: &[ServiceRegistration],
    ) -> Result<Self, StartupError> {
        let mut registry = MethodRegistry::new();
        for service in services {
            registry.register_service(*service)?;
        }
        tracing::info!(routes = registry.len(), "Services registered");

        let router = Router::new(registry, backend.clone())
            .with_default_timeout(config.timeouts.request())
            .with_max_body_size(config.security.max_body_size);

        let (phase, _) = watch::channel(Phase::Initializing);
        Ok(Self {
            config,
            backend,
            router,
            phase,
        })
    }

    /// Subscribe to phase transitions.
    pub fn phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Serve until `shutdown` fires, then stop.
    ///
    /// Returns an error only if the HTTP server fails before shutdown was
    /// requested. Failures while stopping are logged.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: Shutdown,
    ) -> Result<(), std::io::Error> {
        let Gateway {
            config,
            backend,
            router,
            phase,
        } = self;
        let grace = config.timeouts.shutdown_grace();

        let abort = CancellationToken::new();
        let server = HttpServer::new(AppState::new(router, abort.clone()));

        let mut server_task = tokio::spawn(server.run(listener, shutdown.token()));
        let closer = spawn_closer(backend, shutdown.clone());
        phase.send_replace(Phase::Serving);
        tracing::info!(name = %config.app.name, version = %config.app.version, "Gateway serving");

        let early_exit = tokio::select! {
            _ = shutdown.cancelled() => None,
            result = &mut server_task => Some(result),
        };
        phase.send_replace(Phase::ShuttingDown);

        let outcome = match early_exit {
            Some(result) => {
                tracing::error!("HTTP server exited before shutdown was requested");
                shutdown.trigger();
                match result {
                    Ok(inner) => inner,
                    Err(join) => Err(std::io::Error::other(join)),
                }
            }
            None => {
                tracing::info!(grace_secs = grace.as_secs(), "Draining HTTP server");
                if let Err(e) = drain(&mut server_task, grace, &abort).await {
                    tracing::warn!(error = %e, "HTTP server did not stop cleanly");
                }
                Ok(())
            }
        };

        if let Err(e) = closer.await {
            tracing::warn!(error = %e, "Connection closer task failed");
        }

        phase.send_replace(Phase::Terminated);
        tracing::info!("Shutdown complete");
        outcome
    }
}

/// Close the backend once shutdown fires.
fn spawn_closer(backend: Arc<dyn Backend>, shutdown: Shutdown) -> JoinHandle<()> {
    tokio::spawn(async move {
        shutdown.cancelled().await;
        match backend.close().await {
            Ok(()) => tracing::debug!("Backend connection released"),
            Err(e) => tracing::warn!(error = %e, "Failed to close backend connection"),
        }
    })
}

/// Wait for the server within `grace`; after that, cancel in-flight requests
/// and finally abort the task.
async fn drain(
    server_task: &mut JoinHandle<Result<(), std::io::Error>>,
    grace: Duration,
    abort: &CancellationToken,
) -> Result<(), std::io::Error> {
    if let Ok(result) = tokio::time::timeout(grace, &mut *server_task).await {
        return result.map_err(std::io::Error::other)?;
    }

    tracing::warn!("Grace period elapsed, cancelling in-flight requests");
    abort.cancel();

    match tokio::time::timeout(ABORT_WINDOW, &mut *server_task).await {
        Ok(result) => result.map_err(std::io::Error::other)?,
        Err(_) => {
            server_task.abort();
            Err(std::io::Error::other("HTTP server aborted after grace period"))
        }
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("router", &self.router)
            .field("phase", &*self.phase.borrow())
            .finish()
    }
}
