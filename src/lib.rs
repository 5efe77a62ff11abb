// SPDX-License-Identifier: MIT OR Apache-2.0
//! Device-side update agent implementing the hawkBit Direct Device
//! Integration (DDI) client protocol: poll loop, transport, download,
//! feedback encoding, and the deployment workflow that ties them together.

pub mod config;
pub mod deployment;
pub mod diskutil;
pub mod download;
pub mod error;
pub mod feedback;
pub mod installer;
pub mod json_path;
pub mod scheduler;
pub mod state;
pub mod transport;

use std::sync::Arc;

use crate::config::Config;
use crate::installer::{InstallerCapability, RebootCapability};
use crate::state::AgentState;

/// Build the shared agent state and hand back a future that runs the poll
/// loop to completion, per §4.F's init/run split.
pub async fn build_state(
    config: Config,
    installer: Arc<dyn InstallerCapability>,
    rebooter: Arc<dyn RebootCapability>,
) -> error::Result<Arc<AgentState>> {
    let client = transport::build_client(&config)?;
    let config = Arc::new(config);
    let transport = transport::Transport::new(client, &config);
    Ok(Arc::new(AgentState::new(
        config, transport, installer, rebooter,
    )))
}

/// Run the agent to completion (forever, or one cycle in one-shot mode),
/// returning the process exit code.
pub async fn run(state: Arc<AgentState>) -> i32 {
    scheduler::run(state).await
}
