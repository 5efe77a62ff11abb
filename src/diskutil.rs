// SPDX-License-Identifier: MIT OR Apache-2.0
//! Free-disk-space query for the §4.G space gate, checked before a bundle
//! download starts.

use std::path::Path;

use crate::error::{AgentError, Result};

/// Bytes free on the filesystem that contains `path`.
///
/// `path` need not exist yet — only its deepest existing ancestor is
/// queried, matching the common case of checking space before creating the
/// bundle's parent directory.
pub fn free_bytes(path: &Path) -> Result<u64> {
    let mut probe = path;
    while !probe.exists() {
        match probe.parent() {
            Some(parent) => probe = parent,
            None => break,
        }
    }
    fs2::available_space(probe).map_err(AgentError::FileIo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn free_bytes_on_existing_dir_is_nonzero() {
        let dir = tempdir().unwrap();
        let bytes = free_bytes(dir.path()).unwrap();
        assert!(bytes > 0);
    }

    #[test]
    fn free_bytes_walks_up_to_existing_ancestor() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("not").join("yet").join("created.raucb");
        let bytes = free_bytes(&missing).unwrap();
        assert!(bytes > 0);
    }
}
