//! Shutdown coordination for the gateway.

use tokio_util::sync::CancellationToken;

/// Coordinator for graceful shutdown.
///
/// Wraps the process-wide cancellation token. Triggering is idempotent; all
/// waiters observe the same single transition.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        if !self.token.is_cancelled() {
            tracing::info!("Shutdown triggered");
            self.token.cancel();
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until shutdown is triggered.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Handle to the underlying token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Token cancelled together with this one, or on its own.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}
