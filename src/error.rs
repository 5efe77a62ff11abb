// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stable error taxonomy for the DDI agent.
//!
//! Every [`AgentError`] carries a machine-matchable [`ErrorCode`] so callers
//! (and tests) can branch on failure kind without parsing message text.

use thiserror::Error;

/// Broad, stable, machine-readable classification of an [`AgentError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// DNS, TCP, TLS handshake, or timeout failure.
    Transport,
    /// Response status was not 200.
    Http,
    /// Response body failed to parse as JSON.
    JsonParse,
    /// A deployment was requested while one was already in flight.
    AlreadyInProgress,
    /// The poll/deployment response was missing an expected field.
    JsonResponseParse,
    /// The bundle download failed (I/O, slow-transfer abort, etc).
    Download,
    /// The downloaded bundle's SHA-1 did not match the advertised one.
    Checksum,
    /// Not enough free space to hold the artifact.
    NoSpace,
    /// A local file operation (open/remove/stat) failed.
    FileIo,
    /// An install-complete callback arrived with no live action id.
    InstallerStale,
}

impl ErrorCode {
    /// Stable `SCREAMING_SNAKE_CASE` representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport => "TRANSPORT",
            Self::Http => "HTTP",
            Self::JsonParse => "JSON_PARSE",
            Self::AlreadyInProgress => "ALREADY_IN_PROGRESS",
            Self::JsonResponseParse => "JSON_RESPONSE_PARSE",
            Self::Download => "DOWNLOAD",
            Self::Checksum => "CHECKSUM",
            Self::NoSpace => "NO_SPACE",
            Self::FileIo => "FILE_IO",
            Self::InstallerStale => "INSTALLER_STALE",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for the DDI agent core.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Transport-layer failure: DNS, connect, TLS, or timeout.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// Server responded with a non-200 status.
    #[error("http error: status {status}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Raw response body, kept for diagnostics.
        body: String,
    },

    /// Response body was not valid JSON where JSON was expected.
    #[error("failed to parse response body as JSON: {0}")]
    JsonParse(#[source] serde_json::Error),

    /// A deployment is already in progress; the existing action id is untouched.
    #[error("deployment already in progress (action {action_id})")]
    AlreadyInProgress {
        /// The action id of the deployment already running.
        action_id: String,
    },

    /// A field expected by the DDI contract was missing from a response.
    #[error("{0}")]
    JsonResponseParse(String),

    /// The bundle download failed.
    #[error("download failed: {0}")]
    Download(String),

    /// Computed SHA-1 did not match the advertised one.
    #[error("checksum mismatch: expected {expected}, computed {computed}")]
    Checksum {
        /// Hash advertised by the server.
        expected: String,
        /// Hash computed from the downloaded bytes.
        computed: String,
    },

    /// Not enough free space to hold the artifact.
    #[error("not enough free space: need {needed} bytes, {available} available")]
    NoSpace {
        /// Bytes the artifact requires.
        needed: u64,
        /// Bytes actually free.
        available: u64,
    },

    /// A local file operation failed.
    #[error("local file I/O error: {0}")]
    FileIo(#[source] std::io::Error),

    /// Install-complete callback fired with no live action id.
    #[error("install-complete received with no active deployment")]
    InstallerStale,
}

impl AgentError {
    /// The stable [`ErrorCode`] for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Transport(_) => ErrorCode::Transport,
            Self::Http { .. } => ErrorCode::Http,
            Self::JsonParse(_) => ErrorCode::JsonParse,
            Self::AlreadyInProgress { .. } => ErrorCode::AlreadyInProgress,
            Self::JsonResponseParse(_) => ErrorCode::JsonResponseParse,
            Self::Download(_) => ErrorCode::Download,
            Self::Checksum { .. } => ErrorCode::Checksum,
            Self::NoSpace { .. } => ErrorCode::NoSpace,
            Self::FileIo(_) => ErrorCode::FileIo,
            Self::InstallerStale => ErrorCode::InstallerStale,
        }
    }

    /// True for HTTP 401 responses, which the scheduler treats specially.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Http { status: 401, .. })
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err)
    }
}

impl From<std::io::Error> for AgentError {
    fn from(err: std::io::Error) -> Self {
        Self::FileIo(err)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AgentError>;
