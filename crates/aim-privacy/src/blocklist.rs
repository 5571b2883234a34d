//! Blocked-identity set with a sorted list view.

use aim_core::errors::{AimError, Result};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
pub struct Blocklist {
    blocked: BTreeSet<String>,
}

impl Blocklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block(&mut self, identity_id: &str) -> Result<()> {
        if identity_id.trim().is_empty() {
            return Err(AimError::invalid("identity id must not be empty"));
        }
        self.blocked.insert(identity_id.to_owned());
        Ok(())
    }

    pub fn unblock(&mut self, identity_id: &str) {
        self.blocked.remove(identity_id);
    }

    pub fn is_blocked(&self, identity_id: &str) -> bool {
        self.blocked.contains(identity_id)
    }

    /// Sorted list of blocked identity ids.
    pub fn list(&self) -> Vec<String> {
        self.blocked.iter().cloned().collect()
    }
}
