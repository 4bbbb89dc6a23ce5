//! Bounded ring of prior whole-document snapshots.
//!
//! The ring is ordered oldest to newest. Inserting past capacity
//! evicts the oldest snapshot. At steady state the newest entry always
//! holds the document bytes of the most recent successful save.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;

use crate::config::DEFAULT_MAX_REVERSIONS;

/// One complete prior state of the primary document.
#[derive(Debug, Clone)]
pub struct ReversionSnapshot {
    bytes: Vec<u8>,
    saved_at: Option<DateTime<Utc>>,
}

impl ReversionSnapshot {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Capture time, when one was recorded at save.
    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        self.saved_at
    }
}

/// Bounded history of document snapshots with deterministic eviction.
#[derive(Debug, Clone)]
pub struct ReversionRing {
    snapshots: VecDeque<ReversionSnapshot>,
    capacity: usize,
}

impl Default for ReversionRing {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_REVERSIONS)
    }
}

impl ReversionRing {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            snapshots: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append a snapshot as the most recent entry, evicting the oldest
    /// when the ring is full. Called after each successful save.
    pub fn add_version(&mut self, bytes: Vec<u8>, saved_at: DateTime<Utc>) {
        self.snapshots.push_back(ReversionSnapshot {
            bytes,
            saved_at: Some(saved_at),
        });
        while self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
        }
    }

    /// Append a rehydrated snapshot during archive load, preserving
    /// stored order (oldest loaded first). Entries beyond capacity are
    /// ignored rather than evicting earlier ones.
    pub fn add_version_to_end(&mut self, bytes: Vec<u8>) {
        if self.snapshots.len() >= self.capacity {
            return;
        }
        self.snapshots.push_back(ReversionSnapshot {
            bytes,
            saved_at: None,
        });
    }

    /// Append an unstamped snapshot as the most recent entry, evicting
    /// the oldest when the ring is full. Used for the current-document
    /// slot at load time, which must always win a place in the ring.
    pub fn push_newest(&mut self, bytes: Vec<u8>) {
        self.snapshots.push_back(ReversionSnapshot {
            bytes,
            saved_at: None,
        });
        while self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
        }
    }

    /// Snapshots oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ReversionSnapshot> {
        self.snapshots.iter()
    }

    pub fn newest(&self) -> Option<&ReversionSnapshot> {
        self.snapshots.back()
    }

    pub fn oldest(&self) -> Option<&ReversionSnapshot> {
        self.snapshots.front()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
