//! Per-user root table.
//!
//! Maps each user to the key of their current root directory payload. This is
//! the only mutable state of the service: a write commits by replacing one
//! entry here. Callers hold the service lock around every access.

use std::collections::HashMap;

use crate::types::{BlobKey, UserName};

/// User name to root directory key.
#[derive(Debug, Default)]
pub struct RootTable {
    roots: HashMap<UserName, BlobKey>,
}

impl RootTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current root key of `user`.
    pub fn get(&self, user: &UserName) -> Option<&BlobKey> {
        self.roots.get(user)
    }

    /// Returns true if `user` has a root.
    pub fn contains(&self, user: &UserName) -> bool {
        self.roots.contains_key(user)
    }

    /// Installs a root for a new user. Returns false, leaving the table unchanged, if one exists.
    pub fn create(&mut self, user: UserName, key: BlobKey) -> bool {
        if self.roots.contains_key(&user) {
            return false;
        }
        self.roots.insert(user, key);
        true
    }

    /// Points `user` at a rewritten root. Returns the key it replaced.
    pub fn commit(&mut self, user: &UserName, key: BlobKey) -> Option<BlobKey> {
        self.roots.insert(user.clone(), key)
    }

    /// Number of users with a root.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Returns true if no user has a root.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_once() {
        let mut table = RootTable::new();
        let alice = UserName::new("alice@x");
        assert!(table.create(alice.clone(), BlobKey::new("r1")));
        assert!(!table.create(alice.clone(), BlobKey::new("r2")));
        assert_eq!(table.get(&alice), Some(&BlobKey::new("r1")));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_commit_replaces() {
        let mut table = RootTable::new();
        let alice = UserName::new("alice@x");
        table.create(alice.clone(), BlobKey::new("r1"));
        assert_eq!(table.commit(&alice, BlobKey::new("r2")), Some(BlobKey::new("r1")));
        assert_eq!(table.get(&alice), Some(&BlobKey::new("r2")));
    }

    #[test]
    fn test_unknown_user() {
        let table = RootTable::new();
        assert!(table.is_empty());
        assert!(!table.contains(&UserName::new("bob@y")));
        assert_eq!(table.get(&UserName::new("bob@y")), None);
    }
}
