// SPDX-License-Identifier: MIT OR Apache-2.0
//! Installer and reboot capability boundary.
//!
//! The agent never runs an installer itself, and never manages a
//! service-manager integration either — both are external collaborators the
//! hosting program supplies. This module defines only the seam: the traits
//! the agent calls through, and (under `cfg(test)`) the in-memory doubles
//! used to exercise the deployment workflow. No production body is shipped
//! here; a real RAUC-or-similar backend is the embedder's to provide.

use std::path::PathBuf;

use async_trait::async_trait;

/// Outcome reported by the installer once it has acted on a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The bundle was applied successfully.
    Success,
    /// The bundle was rejected or failed to apply.
    Failure {
        /// Human-readable reason, folded into the terminal feedback detail.
        reason: String,
    },
}

/// The installer side of the hand-off: accept a verified bundle, report back
/// whether it applied.
#[async_trait]
pub trait InstallerCapability: Send + Sync {
    /// Hand a verified bundle at `bundle_path` to the installer and await
    /// its outcome.
    ///
    /// Called only after the download's SHA-1 has matched the server's
    /// advertised hash (§4.D step 6). A transport-level error here is a
    /// defect in the capability implementation, not a DDI protocol error —
    /// callers should treat `Err` as [`crate::error::AgentError::Download`].
    async fn notify_ready(&self, bundle_path: &PathBuf) -> crate::error::Result<InstallOutcome>;
}

/// Reboot side of a successful install, invoked only when
/// [`crate::config::Config::post_update_reboot`] is set.
#[async_trait]
pub trait RebootCapability: Send + Sync {
    /// Request that the device reboot. Implementations typically never
    /// return on success; a returned `Err` means the request itself could
    /// not be issued.
    async fn request_reboot(&self) -> crate::error::Result<()>;
}


#[cfg(test)]
mod tests {
    use super::test_support::{CountingRebooter, RecordingInstaller};
    use super::*;

    #[tokio::test]
    async fn recording_installer_captures_bundle_path() {
        let installer = RecordingInstaller::new(InstallOutcome::Success);
        let path = PathBuf::from("/tmp/bundle.raucb");
        let outcome = installer.notify_ready(&path).await.unwrap();
        assert_eq!(outcome, InstallOutcome::Success);
        assert_eq!(installer.received.lock().unwrap().as_slice(), &[path]);
    }

    #[tokio::test]
    async fn counting_rebooter_increments_on_each_call() {
        let rebooter = CountingRebooter::default();
        rebooter.request_reboot().await.unwrap();
        rebooter.request_reboot().await.unwrap();
        assert_eq!(*rebooter.count.lock().unwrap(), 2);
    }
}
