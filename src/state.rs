// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared agent state: the single source of truth for "is a deployment
//! already in flight", plus the handles every poll cycle needs.
//!
//! §4.F's singleton guarantee lives entirely in [`AgentState::begin_action`]
//! — publish-then-clear over one `Arc<Mutex<Option<String>>>`, the same
//! shape `abp-workspace` uses to guard its single active workspace lease.

use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::config::Config;
use crate::installer::{InstallerCapability, RebootCapability};
use crate::transport::Transport;

/// Everything a poll cycle needs that outlives a single tick.
pub struct AgentState {
    /// Resolved, immutable configuration.
    pub config: Arc<Config>,
    /// Shared HTTP/JSON transport.
    pub transport: Transport,
    /// Installer capability handle.
    pub installer: Arc<dyn InstallerCapability>,
    /// Reboot capability handle.
    pub rebooter: Arc<dyn RebootCapability>,

    active_action: Arc<AsyncMutex<Option<String>>>,
    worker: AsyncMutex<Option<JoinHandle<()>>>,
}

impl AgentState {
    /// Construct fresh state with no deployment in flight and no worker.
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        transport: Transport,
        installer: Arc<dyn InstallerCapability>,
        rebooter: Arc<dyn RebootCapability>,
    ) -> Self {
        Self {
            config,
            transport,
            installer,
            rebooter,
            active_action: Arc::new(AsyncMutex::new(None)),
            worker: AsyncMutex::new(None),
        }
    }

    /// Attempt to adopt `action_id` as the in-flight deployment.
    ///
    /// Returns `Ok(())` if there was no deployment already running, or
    /// `Err(existing_action_id)` if one is, in which case the caller should
    /// surface `ALREADY_IN_PROGRESS` (§4.D step 1) without touching the
    /// worker slot.
    pub async fn begin_action(&self, action_id: &str) -> Result<(), String> {
        let mut guard = self.active_action.lock().await;
        match guard.as_ref() {
            Some(existing) => Err(existing.clone()),
            None => {
                *guard = Some(action_id.to_string());
                Ok(())
            }
        }
    }

    /// Clear the in-flight action, making the agent available for the next
    /// deploymentBase. Called once the worker's terminal feedback has been
    /// sent, success or failure.
    pub async fn clear_action(&self) {
        *self.active_action.lock().await = None;
    }

    /// The currently in-flight action id, if any.
    pub async fn current_action(&self) -> Option<String> {
        self.active_action.lock().await.clone()
    }

    /// Join whatever worker task is currently stored, discarding it
    /// afterwards. A panic inside the worker is logged and swallowed —
    /// the worker itself is responsible for reporting terminal feedback
    /// before it can panic past that point.
    pub async fn join_previous_worker(&self) {
        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(%err, "previous deployment worker task panicked");
            }
        }
    }

    /// Store a newly spawned worker handle, replacing (after joining) any
    /// previous one. §4.D guarantees at most one worker runs at a time, so
    /// this is only ever called after [`AgentState::join_previous_worker`].
    pub async fn set_worker(&self, handle: JoinHandle<()>) {
        *self.worker.lock().await = Some(handle);
    }
}
