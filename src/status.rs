use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::gateway::HttpGateway;
use crate::models::{SystemState, SystemStatusResponse};

/// Polls the server status while the session is authenticated.
pub struct StatusMonitor {
    gateway: Arc<HttpGateway>,
    interval: Duration,
    state: watch::Sender<SystemState>,
}

impl StatusMonitor {
    pub fn new(gateway: Arc<HttpGateway>, interval: Duration) -> Self {
        let (state, _) = watch::channel(SystemState::Offline);
        Self {
            gateway,
            interval,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SystemState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> SystemState {
        *self.state.borrow()
    }

    /// one status check; anonymous sessions report offline without a request
    pub async fn check(&self) -> SystemState {
        let state = if !self.gateway.session().is_authenticated() {
            SystemState::Offline
        } else {
            match self.gateway.get::<SystemStatusResponse>("/system/status").await {
                Ok(response) => response.status,
                Err(e) => {
                    tracing::error!("System status check failed: {}", e);
                    SystemState::Offline
                }
            }
        };

        // observers only hear about actual changes
        let changed = self.state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
        if changed {
            tracing::info!("📡 System status: {:?}", state);
        }
        state
    }

    /// poll until `shutdown` is cancelled
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut session = self.gateway.session().subscribe();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.check().await;
                }
                changed = session.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    // react to login/logout right away instead of on the next tick
                    self.check().await;
                }
            }
        }
        tracing::debug!("Status monitor stopped");
    }
}
