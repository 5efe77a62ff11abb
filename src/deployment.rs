// SPDX-License-Identifier: MIT OR Apache-2.0
//! Deployment workflow: turns a poll response that carries a
//! `deploymentBase` link into a running download worker, and reacts to the
//! installer's completion callback once the bundle is handed off.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{AgentError, Result};
use crate::feedback::{Finished, FeedbackEnvelope};
use crate::installer::InstallOutcome;
use crate::json_path;
use crate::state::AgentState;
use crate::transport::Method;
use crate::{diskutil, download};

/// The artifact a worker owns for the duration of one deployment.
#[derive(Debug, Clone)]
struct Artifact {
    action_id: String,
    feedback_url: String,
    download_url: String,
    expected_size: u64,
    expected_sha1: String,
    bundle_path: std::path::PathBuf,
}

/// Entry point for §4.D, invoked by the poll loop whenever the poll response
/// carries `_links.deploymentBase`.
pub async fn process_deployment(state: &Arc<AgentState>, poll_response: &Value) -> Result<()> {
    // Step 1 (§4.D): singleton check, strictly before resolving or fetching
    // anything — a deployment already in flight must not be disturbed.
    if let Some(existing) = state.current_action().await {
        return Err(AgentError::AlreadyInProgress {
            action_id: existing,
        });
    }

    let deployment_href = json_path::href(poll_response, "_links.deploymentBase").ok_or_else(
        || AgentError::JsonResponseParse("missing _links.deploymentBase.href".to_string()),
    )?;

    let deployment = state
        .transport
        .request(Method::Get, &deployment_href, None, true)
        .await?
        .ok_or_else(|| AgentError::JsonResponseParse("empty deploymentBase response".into()))?;

    let action_id = json_path::get_str(&deployment, "id")
        .ok_or_else(|| AgentError::JsonResponseParse("missing deployment id".to_string()))?
        .to_string();

    // Re-checked atomically here in case another deployment was adopted
    // between the step-1 check above and this point.
    if let Err(existing) = state.begin_action(&action_id).await {
        return Err(AgentError::AlreadyInProgress {
            action_id: existing,
        });
    }

    let feedback_url = format!(
        "{}/deploymentBase/{}/feedback",
        state.config.controller_url(None),
        action_id
    );

    let result = match resolve_artifact(&deployment, &action_id, &feedback_url, state) {
        Ok(artifact) => start_worker(state, artifact).await,
        Err(err) => Err(err),
    };

    if let Err(err) = result {
        let detail = match &err {
            // A lookup failure is as unactionable as an actual shortfall —
            // the free-space gate (§4.D step 7) reports the same detail
            // text either way.
            AgentError::NoSpace { .. } | AgentError::FileIo(_) => {
                "Not enough free space.".to_string()
            }
            other => other.to_string(),
        };
        report(
            state,
            &feedback_url,
            FeedbackEnvelope::terminal(&action_id, Finished::Failure, Some(detail)),
        )
        .await;
        state.clear_action().await;
        return Err(err);
    }

    Ok(())
}

/// Step 6: select the first chunk/artifact, warning if more were present.
fn resolve_artifact(
    deployment: &Value,
    action_id: &str,
    feedback_url: &str,
    state: &Arc<AgentState>,
) -> Result<Artifact> {
    let chunks = json_path::get_array(deployment, "deployment.chunks")
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AgentError::JsonResponseParse("deployment has no chunks".to_string()))?;
    if chunks.len() > 1 {
        warn!(chunk_count = chunks.len(), "multiple chunks in deployment; using first only");
    }
    let chunk = &chunks[0];

    let artifacts = json_path::get_array(chunk, "artifacts")
        .filter(|a| !a.is_empty())
        .ok_or_else(|| AgentError::JsonResponseParse("chunk has no artifacts".to_string()))?;
    if artifacts.len() > 1 {
        warn!(
            artifact_count = artifacts.len(),
            "multiple artifacts in chunk; using first only"
        );
    }
    let artifact = &artifacts[0];

    let expected_size = json_path::get_u64(artifact, "size")
        .ok_or_else(|| AgentError::JsonResponseParse("artifact missing size".to_string()))?;
    let expected_sha1 = json_path::get_str(artifact, "hashes.sha1")
        .ok_or_else(|| AgentError::JsonResponseParse("artifact missing hashes.sha1".to_string()))?
        .to_string();

    let download_url = json_path::href(artifact, "_links.download")
        .or_else(|| json_path::href(artifact, "_links.download-http"))
        .ok_or_else(|| AgentError::Download("no download link on artifact".to_string()))?;

    Ok(Artifact {
        action_id: action_id.to_string(),
        feedback_url: feedback_url.to_string(),
        download_url,
        expected_size,
        expected_sha1,
        bundle_path: state.config.bundle_download_location.clone(),
    })
}

/// Steps 7-9: free-space gate, join the previous worker, spawn the new one.
async fn start_worker(state: &Arc<AgentState>, artifact: Artifact) -> Result<()> {
    let available = diskutil::free_bytes(&artifact.bundle_path)?;
    if available < artifact.expected_size {
        return Err(AgentError::NoSpace {
            needed: artifact.expected_size,
            available,
        });
    }

    state.join_previous_worker().await;

    let worker_state = Arc::clone(state);
    let handle = tokio::spawn(async move {
        run_worker(worker_state, artifact).await;
    });
    state.set_worker(handle).await;
    Ok(())
}

/// The download worker: download, checksum, hand off to the installer.
async fn run_worker(state: Arc<AgentState>, artifact: Artifact) {
    let auth_header = state.config.auth_header();
    let outcome = download::download(
        state.transport.client(),
        auth_header.as_deref(),
        &artifact.download_url,
        &artifact.bundle_path,
        artifact.expected_size,
    )
    .await;

    let download_outcome = match outcome {
        Ok(o) => o,
        Err(err) => {
            warn!(%err, action_id = %artifact.action_id, "download failed");
            report(
                &state,
                &artifact.feedback_url,
                FeedbackEnvelope::terminal(&artifact.action_id, Finished::Failure, Some(err.to_string())),
            )
            .await;
            cleanup(&state, &artifact).await;
            return;
        }
    };

    report(
        &state,
        &artifact.feedback_url,
        FeedbackEnvelope::progress(
            &artifact.action_id,
            format!(
                "Download complete. {:.2} MB/s",
                download_outcome.average_bytes_per_second / 1_000_000.0
            ),
        ),
    )
    .await;

    if download_outcome.sha1_hex != artifact.expected_sha1 {
        let detail = format!(
            "Checksum mismatch: expected {}, computed {}",
            artifact.expected_sha1, download_outcome.sha1_hex
        );
        warn!(action_id = %artifact.action_id, "{detail}");
        report(
            &state,
            &artifact.feedback_url,
            FeedbackEnvelope::terminal(&artifact.action_id, Finished::Failure, Some(detail)),
        )
        .await;
        cleanup(&state, &artifact).await;
        return;
    }

    report(
        &state,
        &artifact.feedback_url,
        FeedbackEnvelope::progress(&artifact.action_id, "File checksum OK."),
    )
    .await;

    match state.installer.notify_ready(&artifact.bundle_path).await {
        Ok(install_outcome) => {
            complete_install(&state, &artifact, install_outcome).await;
        }
        Err(err) => {
            warn!(%err, action_id = %artifact.action_id, "installer handoff failed");
            report(
                &state,
                &artifact.feedback_url,
                FeedbackEnvelope::terminal(&artifact.action_id, Finished::Failure, Some(err.to_string())),
            )
            .await;
            cleanup(&state, &artifact).await;
        }
    }
}

/// Install-completion callback: terminal report, optional reboot, cleanup.
async fn complete_install(state: &Arc<AgentState>, artifact: &Artifact, outcome: InstallOutcome) {
    if state.current_action().await.as_deref() != Some(artifact.action_id.as_str()) {
        debug!(action_id = %artifact.action_id, "stale install completion, ignoring");
        return;
    }

    match outcome {
        InstallOutcome::Success => {
            info!(action_id = %artifact.action_id, "bundle installed successfully");
            report(
                state,
                &artifact.feedback_url,
                FeedbackEnvelope::terminal(
                    &artifact.action_id,
                    Finished::Success,
                    Some("Software bundle installed successful.".to_string()),
                ),
            )
            .await;
            if state.config.post_update_reboot {
                if let Err(err) = state.rebooter.request_reboot().await {
                    tracing::error!(%err, "failed to request system reboot after install");
                }
            }
        }
        InstallOutcome::Failure { reason } => {
            warn!(action_id = %artifact.action_id, %reason, "bundle install failed");
            report(
                state,
                &artifact.feedback_url,
                FeedbackEnvelope::terminal(
                    &artifact.action_id,
                    Finished::Failure,
                    Some("Failed to install software bundle.".to_string()),
                ),
            )
            .await;
        }
    }

    cleanup(state, artifact).await;
}

/// Progress callback surface used by an external installer while it works;
/// a no-op once the action id has been cleared.
pub async fn report_install_progress(state: &Arc<AgentState>, action_id: &str, feedback_url: &str, detail: impl Into<String>) {
    if state.current_action().await.as_deref() != Some(action_id) {
        return;
    }
    report(state, feedback_url, FeedbackEnvelope::progress(action_id, detail)).await;
}

async fn cleanup(state: &Arc<AgentState>, artifact: &Artifact) {
    state.clear_action().await;
    if artifact.bundle_path.exists() {
        if let Err(err) = tokio::fs::remove_file(&artifact.bundle_path).await {
            warn!(%err, path = %artifact.bundle_path.display(), "failed to remove bundle file during cleanup");
        }
    }
}

async fn report(state: &Arc<AgentState>, feedback_url: &str, envelope: FeedbackEnvelope) {
    let body = envelope.to_json();
    if let Err(err) = state
        .transport
        .request(Method::Post, feedback_url, Some(&body), false)
        .await
    {
        warn!(%err, url = feedback_url, "failed to send feedback report");
    }
}
