// SPDX-License-Identifier: MIT OR Apache-2.0
//! Small dotted-path accessor over `serde_json::Value`.
//!
//! The DDI responses this agent reads are only ever traversed by fixed,
//! known-ahead-of-time paths (`_links.deploymentBase.href`,
//! `deployment.chunks`, …), so a full JSONPath engine would be overkill —
//! this module understands `a.b.c` dotted segments only.

use serde_json::Value;

/// Resolve a dotted path (e.g. `"_links.deploymentBase.href"`) against `root`.
///
/// Returns `None` if any segment is missing or not an object.
pub fn get<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(root, |node, segment| node.get(segment))
}

/// Resolve a dotted path to a string slice.
pub fn get_str<'a>(root: &'a Value, path: &str) -> Option<&'a str> {
    get(root, path).and_then(Value::as_str)
}

/// Resolve a dotted path to a `u64`.
pub fn get_u64(root: &Value, path: &str) -> Option<u64> {
    get(root, path).and_then(Value::as_u64)
}

/// Resolve a dotted path to an array slice.
pub fn get_array<'a>(root: &'a Value, path: &str) -> Option<&'a Vec<Value>> {
    get(root, path).and_then(Value::as_array)
}

/// Resolve `"<path>.href"`, the shape every hawkBit `_links` entry uses.
pub fn href(root: &Value, path: &str) -> Option<String> {
    get_str(root, &format!("{path}.href")).map(str::to_owned)
}
