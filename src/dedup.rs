//! Content-based duplicate detection
//!
//! Neighbouring pixels usually hit the same feature, so most accepted
//! responses are byte-identical repeats. Each body is fingerprinted with MD5
//! and only the first occurrence of a fingerprint is kept. Two different bodies
//! with the same digest are treated as the same document.

use crate::types::Fingerprint;
use std::collections::HashSet;
use std::sync::Mutex;

/// Result of offering a response body to the store
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Offer {
    /// First time this content was seen
    New(Fingerprint),
    /// Content was already offered earlier in the sweep
    Duplicate(Fingerprint),
}

impl Offer {
    /// Fingerprint of the offered body
    pub fn fingerprint(&self) -> Fingerprint {
        match self {
            Offer::New(fp) | Offer::Duplicate(fp) => *fp,
        }
    }

    /// Whether the body was new
    pub fn is_new(&self) -> bool {
        matches!(self, Offer::New(_))
    }
}

/// Set of fingerprints seen during one sweep
///
/// Safe to share between workers; the set is guarded by a mutex that is only
/// held for the insert.
#[derive(Debug, Default)]
pub struct DedupStore {
    seen: Mutex<HashSet<Fingerprint>>,
}

impl DedupStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Fingerprint `body` and record it, reporting whether it was new
    pub fn offer(&self, body: &[u8]) -> Offer {
        let fingerprint = Fingerprint::of(body);
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        if seen.insert(fingerprint) {
            Offer::New(fingerprint)
        } else {
            Offer::Duplicate(fingerprint)
        }
    }

    /// Whether a fingerprint has been recorded
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(fingerprint)
    }

    /// Number of distinct documents recorded
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether nothing has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
