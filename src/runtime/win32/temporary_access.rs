// SPDX-License-Identifier: MIT

//! ACL changes that are undone when the sandbox shuts down.

use super::acl::{AccessPermission, clear_access, deny_access, grant_access};
use super::trustee::Trustee;
use crate::fs::FilePath;
use crate::runtime::error::Result;

/// Every path touched here has all entries for its trustee cleared on drop.
#[derive(Default)]
pub struct TemporaryAccess {
    entries: Vec<(FilePath, Trustee)>,
}

impl TemporaryAccess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&mut self, path: &FilePath, trustee: &Trustee, permissions: &[AccessPermission]) -> Result<()> {
        self.entries.push((path.clone(), trustee.clone()));
        grant_access(path, trustee, permissions)
    }

    pub fn deny(&mut self, path: &FilePath, trustee: &Trustee, permissions: &[AccessPermission]) -> Result<()> {
        self.entries.push((path.clone(), trustee.clone()));
        deny_access(path, trustee, permissions)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Drop for TemporaryAccess {
    fn drop(&mut self) {
        for (path, trustee) in self.entries.drain(..) {
            if let Err(e) = clear_access(&path, &trustee) {
                tracing::error!("failed to reset access for {path}: {e}");
            }
        }
    }
}
