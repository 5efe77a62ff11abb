// SPDX-License-Identifier: MIT OR Apache-2.0
//! DDI feedback envelope: the status document pushed back to the server at
//! every lifecycle point (identify, download progress, checksum, terminal).

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// `status.execution` — whether the action is still open on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Execution {
    /// The device is still working the action.
    Proceeding,
    /// The device considers the action finished (success or failure).
    Closed,
}

/// `status.result.finished` — the outcome, if any, of the action so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Finished {
    /// No outcome yet; still in progress.
    None,
    /// The action completed successfully.
    Success,
    /// The action failed.
    Failure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ResultBody {
    finished: Finished,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StatusBody {
    result: ResultBody,
    execution: Execution,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<String>>,
}

/// The full DDI feedback JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackEnvelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    time: String,
    status: StatusBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<BTreeMap<String, String>>,
}

/// `YYYYMMDDTHHMMSS`, as mandated by the DDI feedback contract.
fn now_stamp() -> String {
    Utc::now().format("%Y%m%dT%H%M%S").to_string()
}

impl FeedbackEnvelope {
    /// A `proceeding`/`none` report carrying a human-readable detail.
    #[must_use]
    pub fn progress(action_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            id: Some(action_id.into()),
            time: now_stamp(),
            status: StatusBody {
                result: ResultBody {
                    finished: Finished::None,
                },
                execution: Execution::Proceeding,
                details: Some(vec![detail.into()]),
            },
            data: None,
        }
    }

    /// A `closed` terminal report (success or failure), with an optional detail.
    #[must_use]
    pub fn terminal(
        action_id: impl Into<String>,
        finished: Finished,
        detail: Option<String>,
    ) -> Self {
        Self {
            id: Some(action_id.into()),
            time: now_stamp(),
            status: StatusBody {
                result: ResultBody { finished },
                execution: Execution::Closed,
                details: detail.map(|d| vec![d]),
            },
            data: None,
        }
    }

    /// The identify report: `success`/`closed`, no id, device data attached.
    #[must_use]
    pub fn identify(device: BTreeMap<String, String>) -> Self {
        Self {
            id: None,
            time: now_stamp(),
            status: StatusBody {
                result: ResultBody {
                    finished: Finished::Success,
                },
                execution: Execution::Closed,
                details: None,
            },
            data: if device.is_empty() { None } else { Some(device) },
        }
    }

    /// Serialize to a `serde_json::Value` for transport.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("FeedbackEnvelope always serializes")
    }
}
