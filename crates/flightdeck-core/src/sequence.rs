// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Last-snapshot-wins ordering for overlapping poll responses.
//!
//! Each request takes a token before it is sent. When responses come back out
//! of order, a response whose token is not newer than the last applied one is
//! stale and must be dropped.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic request token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceToken(u64);

impl SequenceToken {
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SequenceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Issues tokens and admits only responses newer than the last applied one.
#[derive(Debug, Default)]
pub struct SnapshotSequencer {
    issued: AtomicU64,
    applied: AtomicU64,
}

impl SnapshotSequencer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a token for a request about to be sent.
    pub fn issue(&self) -> SequenceToken {
        SequenceToken(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Record `token` as applied if it is newer than anything applied so far.
    ///
    /// Returns false for a stale response, which the caller should discard.
    pub fn try_accept(&self, token: SequenceToken) -> bool {
        self.applied.fetch_max(token.0, Ordering::SeqCst) < token.0
    }

    /// Token of the most recently applied response, if any.
    #[must_use]
    pub fn last_applied(&self) -> Option<SequenceToken> {
        match self.applied.load(Ordering::SeqCst) {
            0 => None,
            value => Some(SequenceToken(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_increase() {
        let sequencer = SnapshotSequencer::new();
        let a = sequencer.issue();
        let b = sequencer.issue();
        assert!(b > a);
    }

    #[test]
    fn test_stale_response_is_rejected() {
        let sequencer = SnapshotSequencer::new();
        let slow = sequencer.issue();
        let fast = sequencer.issue();

        assert!(sequencer.try_accept(fast));
        assert!(!sequencer.try_accept(slow));
        assert_eq!(sequencer.last_applied(), Some(fast));
    }

    #[test]
    fn test_same_token_is_applied_once() {
        let sequencer = SnapshotSequencer::new();
        let token = sequencer.issue();
        assert!(sequencer.try_accept(token));
        assert!(!sequencer.try_accept(token));
    }

    #[test]
    fn test_in_order_responses_all_apply() {
        let sequencer = SnapshotSequencer::new();
        assert_eq!(sequencer.last_applied(), None);
        for _ in 0..5 {
            let token = sequencer.issue();
            assert!(sequencer.try_accept(token));
        }
    }
}
