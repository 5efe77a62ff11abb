// SPDX-License-Identifier: MIT OR Apache-2.0
//! Poll loop: a one-second tick that drives the base poll, identify, and
//! deployment dispatch described in §4.E.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::deployment;
use crate::error::{AgentError, Result};
use crate::feedback::FeedbackEnvelope;
use crate::json_path;
use crate::state::AgentState;
use crate::transport::Method;

/// Cadence tracking, driven by the one-second tick.
struct PollState {
    interval_secs: u64,
    elapsed_secs: u64,
}

impl PollState {
    fn new(retry_wait: Duration) -> Self {
        Self {
            interval_secs: retry_wait.as_secs().max(1),
            elapsed_secs: 0,
        }
    }

    fn tick(&mut self) -> bool {
        self.elapsed_secs += 1;
        if self.elapsed_secs >= self.interval_secs {
            self.elapsed_secs = 0;
            true
        } else {
            false
        }
    }
}

/// Run the poll loop forever, or for exactly one cycle in one-shot mode.
///
/// Returns the process exit code: `0` in the normal (looping) case, whether
/// it ends via a shutdown signal or (in one-shot mode) `0`/`1` reflecting
/// whether the base poll succeeded.
pub async fn run(state: Arc<AgentState>) -> i32 {
    let mut poll_state = PollState::new(state.config.retry_wait);
    let one_shot = state.config.run_once;
    let mut ticker = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown_signal() => {
                info!("shutdown signal received, joining deployment worker");
                state.join_previous_worker().await;
                return 0;
            }
        }

        if !poll_state.tick() {
            continue;
        }

        let result = poll_cycle(&state, &mut poll_state).await;

        if one_shot {
            return match result {
                Ok(()) => 0,
                Err(_) => 1,
            };
        }
    }
}

/// Resolves once SIGINT (or, on Unix, SIGTERM) is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// One full poll cycle: base poll, identify, deployment, cancel recognition.
async fn poll_cycle(state: &Arc<AgentState>, poll_state: &mut PollState) -> Result<()> {
    let base_url = state.config.controller_url(None);
    let response = match state
        .transport
        .request(Method::Get, &base_url, None, true)
        .await
    {
        Ok(Some(body)) => body,
        Ok(None) => {
            warn!("base poll returned an empty body");
            poll_state.interval_secs = state.config.retry_wait.as_secs().max(1);
            return Err(AgentError::JsonResponseParse("empty base poll response".into()));
        }
        Err(err) => {
            if err.is_unauthorized() {
                warn!(token_kind = state.config.token_kind(), "base poll rejected as unauthorized");
            } else {
                warn!(%err, code = %err.code(), "base poll failed");
            }
            poll_state.interval_secs = state.config.retry_wait.as_secs().max(1);
            return Err(err);
        }
    };

    poll_state.interval_secs = json_path::get_str(&response, "config.polling.sleep")
        .and_then(parse_hhmmss)
        .unwrap_or_else(|| state.config.retry_wait.as_secs().max(1));

    if json_path::href(&response, "_links.configData").is_some() {
        if let Err(err) = identify(state).await {
            warn!(%err, "identify report failed");
        }
    }

    if json_path::href(&response, "_links.deploymentBase").is_some() {
        if let Err(err) = deployment::process_deployment(state, &response).await {
            match err {
                AgentError::AlreadyInProgress { action_id } => {
                    debug!(action_id, "deployment already in progress, skipping");
                }
                other => warn!(%other, "deployment dispatch failed"),
            }
        }
    }

    if json_path::href(&response, "_links.cancelAction").is_some() {
        warn!("cancel action not supported");
    }

    Ok(())
}

/// `HH:MM:SS` → total seconds.
fn parse_hhmmss(s: &str) -> Option<u64> {
    let mut parts = s.splitn(3, ':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: u64 = parts.next()?.parse().ok()?;
    Some(hours * 3600 + minutes * 60 + seconds)
}

/// PUT `configData` with a success/closed identify report.
async fn identify(state: &Arc<AgentState>) -> Result<()> {
    let url = state.config.controller_url(Some("configData"));
    let envelope = FeedbackEnvelope::identify(state.config.device.clone());
    state
        .transport
        .request(Method::Put, &url, Some(&envelope.to_json()), false)
        .await?;
    info!("identify report sent");
    Ok(())
}
