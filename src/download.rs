// SPDX-License-Identifier: MIT OR Apache-2.0
//! Streaming binary downloader: fetches a URL to a local file while
//! incrementally hashing the bytes written and enforcing a slow-transfer
//! abort, mirroring `sidecar-kit::process`'s async I/O pump but piping an
//! HTTP body to a file instead of a child process's stdout to a frame codec.

use std::path::Path;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use reqwest::Client;
use sha1::{Digest, Sha1};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{AgentError, Result};
use crate::transport::USER_AGENT;

/// Minimum throughput before the slow-transfer guard starts counting.
const SLOW_TRANSFER_THRESHOLD_BPS: f64 = 100.0;
/// Consecutive seconds under threshold before aborting.
const SLOW_TRANSFER_ABORT_SECS: u64 = 60;

/// Outcome of a successful download.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadOutcome {
    /// Lowercase hex SHA-1 of the bytes written.
    pub sha1_hex: String,
    /// Average throughput over the whole transfer.
    pub average_bytes_per_second: f64,
}

/// Stream `url` to `target_path`, truncating any existing file, computing a
/// running SHA-1 over the exact bytes written.
pub async fn download(
    client: &Client,
    auth_header: Option<&str>,
    url: &str,
    target_path: &Path,
    expected_size: u64,
) -> Result<DownloadOutcome> {
    let mut request = client
        .get(url)
        .header("User-Agent", USER_AGENT)
        .header("Accept", "application/octet-stream");
    if let Some(auth) = auth_header {
        request = request.header("Authorization", auth);
    }

    let response = request.send().await.map_err(AgentError::Transport)?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AgentError::Http {
            status: status.as_u16(),
            body,
        });
    }

    let mut file = File::create(target_path).await?;
    let mut hasher = Sha1::new();
    let mut total_bytes: u64 = 0;
    let started = Instant::now();

    let mut slow_window_start = started;
    let mut slow_window_bytes: u64 = 0;
    let mut slow_seconds: u64 = 0;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| AgentError::Download(e.to_string()))?;
        hasher.update(&chunk);
        file.write_all(&chunk).await?;
        total_bytes += chunk.len() as u64;
        slow_window_bytes += chunk.len() as u64;

        let elapsed = slow_window_start.elapsed();
        if elapsed >= Duration::from_secs(1) {
            let bps = slow_window_bytes as f64 / elapsed.as_secs_f64();
            if bps < SLOW_TRANSFER_THRESHOLD_BPS {
                slow_seconds += elapsed.as_secs();
                if slow_seconds >= SLOW_TRANSFER_ABORT_SECS {
                    return Err(AgentError::Download(format!(
                        "throughput below {SLOW_TRANSFER_THRESHOLD_BPS} B/s for {SLOW_TRANSFER_ABORT_SECS} consecutive seconds"
                    )));
                }
            } else {
                slow_seconds = 0;
            }
            slow_window_start = Instant::now();
            slow_window_bytes = 0;
        }
    }
    file.flush().await?;

    debug!(
        total_bytes,
        expected_size, "download finished, verifying size"
    );

    let elapsed_secs = started.elapsed().as_secs_f64().max(f64::EPSILON);
    let average_bytes_per_second = total_bytes as f64 / elapsed_secs;

    Ok(DownloadOutcome {
        sha1_hex: hex_encode(&hasher.finalize()),
        average_bytes_per_second,
    })
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(s, "{b:02x}").expect("writing to a String cannot fail");
    }
    s
}
