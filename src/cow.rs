//! Per-open-file copy-on-write policy.

use std::collections::HashSet;

/// How writes to existing objects behave for one open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CowMode {
    /// Overwrite in place; predecessors are deleted.
    Never,

    /// The first write to each object in this open-file lifetime copies;
    /// later writes to the same object overwrite the copy.
    Once,
}

/// Decision oracle: "is this object dirty?" / "should writes COW?".
///
/// The dirty set lives only as long as the open file; reopening resets it,
/// so the first write after reopen copies again.
#[derive(Debug)]
pub struct CowPolicy {
    mode: CowMode,
    changed: HashSet<u64>,
}

impl CowPolicy {
    pub fn new(mode: CowMode) -> Self {
        Self {
            mode,
            changed: HashSet::new(),
        }
    }

    /// A policy with copy-on-write off.
    pub fn no_cow() -> Self {
        Self::new(CowMode::Never)
    }

    /// Whether copy-on-write is configured for this open file.
    pub fn cow_enabled(&self) -> bool {
        self.mode != CowMode::Never
    }

    /// Whether a write to `object_number` must copy: COW is enabled and the
    /// object has not been overwritten in this open-file lifetime.
    pub fn is_cow(&self, object_number: u64) -> bool {
        self.cow_enabled() && !self.changed.contains(&object_number)
    }

    /// Mark an object dirty so later writes in this lifetime skip the copy.
    pub fn object_changed(&mut self, object_number: u64) {
        self.changed.insert(object_number);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_cow_never_copies() {
        let policy = CowPolicy::no_cow();
        assert!(!policy.cow_enabled());
        assert!(!policy.is_cow(0));
        assert!(!policy.is_cow(17));
    }

    #[test]
    fn test_cow_once_copies_only_first_write() {
        let mut policy = CowPolicy::new(CowMode::Once);
        assert!(policy.cow_enabled());
        assert!(policy.is_cow(3));

        policy.object_changed(3);
        assert!(!policy.is_cow(3));
        // Other objects are still clean.
        assert!(policy.is_cow(4));
    }
}
