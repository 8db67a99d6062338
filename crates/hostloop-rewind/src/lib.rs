//! Byte-bounded rewind history with lightweight, in-memory compression.
//!
//! This crate optimizes for *stepping backwards one entry at a time*.
//! It does not support random access or seeking.
//!
//! # Layout
//! - The newest snapshot is kept uncompressed in `current`.
//! - Every entry after the first in a chain stores an XOR diff against the
//!   entry before it (`diff = cur ^ prev`), compressed with LZ4.
//! - Stepping back is an LZ4 decompression plus a byte-wise XOR, since
//!   `prev = cur ^ diff`.
//!
//! # Invariants
//! - `current` holds the snapshot of the newest entry, or is empty when the
//!   history is empty.
//! - All snapshots in a chain have the same length. A snapshot of a different
//!   length starts a new chain and drops the old one.
//! - The oldest entry never carries a diff.
//!
//! # Failure handling
//! A diff that fails to decompress, or decompresses to the wrong length, is
//! treated as corruption and the whole history is cleared.

use std::collections::VecDeque;

use hostloop_core::rewind::{Snapshot, StateHistory};
use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use tracing::{debug, warn};

struct Entry {
    /// LZ4-compressed XOR diff against the previous entry.
    delta: Option<Vec<u8>>,
}

impl Entry {
    fn stored_bytes(&self) -> usize {
        self.delta.as_ref().map_or(0, Vec::len)
    }
}

/// Rewind history bounded by the number of bytes it stores.
pub struct DeltaHistory {
    entries: VecDeque<Entry>,
    current: Vec<u8>,
    capacity_bytes: usize,
    /// Full snapshot plus every stored diff.
    stored_bytes: usize,
}

impl DeltaHistory {
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            current: Vec::new(),
            capacity_bytes,
            stored_bytes: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    pub fn stored_bytes(&self) -> usize {
        self.stored_bytes
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.current.clear();
        self.stored_bytes = 0;
    }

    /// Appends `snapshot` as the newest entry.
    pub fn push_bytes(&mut self, snapshot: Vec<u8>) {
        if self.entries.is_empty() || self.current.len() != snapshot.len() {
            if !self.entries.is_empty() {
                debug!(
                    old = self.current.len(),
                    new = snapshot.len(),
                    "snapshot size changed, starting a new chain"
                );
            }
            self.clear();
            self.stored_bytes = snapshot.len();
            self.current = snapshot;
            self.entries.push_back(Entry { delta: None });
            self.trim_to_capacity();
            return;
        }

        let diff: Vec<u8> = snapshot
            .iter()
            .zip(&self.current)
            .map(|(cur, prev)| cur ^ prev)
            .collect();
        let entry = Entry {
            delta: Some(compress_prepend_size(&diff)),
        };

        self.stored_bytes += entry.stored_bytes();
        self.current = snapshot;
        self.entries.push_back(entry);
        self.trim_to_capacity();
    }

    /// Removes the newest entry and returns its snapshot.
    ///
    /// `None` means the history was empty or turned out to be corrupt; a
    /// corrupt history has been cleared.
    pub fn pop_bytes(&mut self) -> Option<Vec<u8>> {
        let newest = self.entries.pop_back()?;
        let Some(compressed) = newest.delta else {
            // Chain start: nothing older to reconstruct.
            let snapshot = std::mem::take(&mut self.current);
            self.clear();
            return Some(snapshot);
        };
        self.stored_bytes -= compressed.len();

        let diff = match decompress_size_prepended(&compressed) {
            Ok(diff) if diff.len() == self.current.len() => diff,
            Ok(diff) => {
                warn!(
                    expected = self.current.len(),
                    actual = diff.len(),
                    "rewind delta has the wrong length, clearing history"
                );
                self.clear();
                return None;
            }
            Err(err) => {
                warn!(%err, "rewind delta is corrupt, clearing history");
                self.clear();
                return None;
            }
        };

        let mut previous = self.current.clone();
        for (byte, d) in previous.iter_mut().zip(&diff) {
            *byte ^= d;
        }
        Some(std::mem::replace(&mut self.current, previous))
    }

    fn trim_to_capacity(&mut self) {
        let mut trimmed = 0usize;
        while self.stored_bytes > self.capacity_bytes && self.entries.len() > 1 {
            if let Some(oldest) = self.entries.pop_front() {
                self.stored_bytes -= oldest.stored_bytes();
                trimmed += 1;
            }
            // The new oldest entry has nothing left to diff against.
            if let Some(front) = self.entries.front_mut()
                && let Some(delta) = front.delta.take()
            {
                self.stored_bytes -= delta.len();
            }
        }
        if trimmed > 0 {
            debug!(
                trimmed,
                remaining = self.entries.len(),
                stored = self.stored_bytes,
                "trimmed rewind history"
            );
        }
    }

    #[cfg(test)]
    fn corrupt_newest(&mut self) {
        if let Some(Entry { delta: Some(delta) }) = self.entries.back_mut() {
            delta.truncate(delta.len() / 2);
        }
    }
}

impl<M: Snapshot + ?Sized> StateHistory<M> for DeltaHistory {
    fn push(&mut self, machine: &M) {
        match machine.capture() {
            Ok(snapshot) => self.push_bytes(snapshot),
            Err(err) => debug!(%err, "snapshot capture failed, entry skipped"),
        }
    }

    fn pop(&mut self, machine: &mut M) -> bool {
        let Some(snapshot) = self.pop_bytes() else {
            return false;
        };
        if let Err(err) = machine.restore(&snapshot) {
            warn!(%err, "snapshot restore failed, entry dropped");
        }
        !self.is_empty()
    }
}
