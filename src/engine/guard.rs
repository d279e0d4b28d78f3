//! Progress / cycle guard for one decode session.
//!
//! Two sets are kept:
//! - attempt keys `(codec, fingerprint of its input)`, marked before the
//!   codec runs so failures count too.  No key is ever evaluated twice,
//!   which bounds a session at `registry_size × max_depth` invocations.
//! - fingerprints of every value the session has held.  An output equal to
//!   an earlier value is a cycle (an involution undoing itself) and is
//!   refused even though its attempt key is new.
//!
//! Fingerprints are BLAKE3 digests of the whitespace-trimmed value, so the
//! sets stay small no matter how large the payload is.

use std::collections::HashSet;

use crate::payload::Payload;

pub type Fingerprint = [u8; 32];

pub fn fingerprint(value: &Payload) -> Fingerprint {
    blake3::hash(value.trimmed()).into()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttemptKey {
    pub codec:       &'static str,
    pub fingerprint: Fingerprint,
}

#[derive(Debug, Default)]
pub struct ProgressGuard {
    visited:     HashSet<AttemptKey>,
    held:        HashSet<Fingerprint>,
    invocations: usize,
}

impl ProgressGuard {
    /// Start a guard whose history already contains the session input.
    pub fn new(initial: &Payload) -> Self {
        let mut guard = Self::default();
        guard.held.insert(fingerprint(initial));
        guard
    }

    /// Claim `key` for evaluation.  Returns `false` if it was already tried
    /// in this session; otherwise marks it visited and counts an invocation.
    pub fn begin(&mut self, key: AttemptKey) -> bool {
        if !self.visited.insert(key) {
            return false;
        }
        self.invocations += 1;
        true
    }

    pub fn is_visited(&self, key: &AttemptKey) -> bool {
        self.visited.contains(key)
    }

    /// True if a value with this fingerprint was current earlier on.
    pub fn seen_value(&self, fp: &Fingerprint) -> bool {
        self.held.contains(fp)
    }

    pub fn hold(&mut self, fp: Fingerprint) {
        self.held.insert(fp);
    }

    pub fn invocations(&self) -> usize {
        self.invocations
    }
}
