use crate::sequence::SequenceId;
use std::collections::HashMap;

/// Maps end-of-turn marker names to the sequence they close out.
///
/// A sequence only completes when the channel echoes its marker back, which
/// happens after the caller has actually heard the audio sent before it.
#[derive(Debug, Default)]
pub struct PlaybackCompletionTracker {
    pending: HashMap<String, SequenceId>,
}

impl PlaybackCompletionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the marker is already pending.
    pub fn register(&mut self, marker: &str, id: SequenceId) -> bool {
        if self.pending.contains_key(marker) {
            tracing::warn!(marker, sequence = id, "marker already registered");
            return false;
        }
        self.pending.insert(marker.to_string(), id);
        tracing::debug!(marker, sequence = id, "marker registered");
        true
    }

    pub fn resolve(&mut self, marker: &str) -> Option<SequenceId> {
        self.pending.remove(marker)
    }

    /// Drop all pending markers; returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
