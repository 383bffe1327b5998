use std::collections::{BTreeSet, HashMap};

pub type SequenceId = u64;

/// Lifecycle of one agent turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceState {
    /// Still allowed to produce output.
    Live,
    /// Invalidated by a barge-in before its playback was confirmed.
    Interrupted,
    /// The channel acknowledged the end-of-turn marker.
    Completed,
    /// Finished without a marker, e.g. after a model or synthesis failure.
    Abandoned,
}

/// Name of the end-of-turn marker sent to the channel for `id`.
pub fn marker_name(id: SequenceId) -> String {
    format!("end-{id}")
}

/// Issues turn identifiers and answers cancellation queries.
///
/// A sequence is valid exactly while it is in the live set. `interrupt`
/// empties the set in one step, which is what makes barge-in total: any
/// pipeline stage that polls `is_valid` afterwards stops producing output.
#[derive(Debug, Default)]
pub struct SequenceTracker {
    last_issued: SequenceId,
    live: BTreeSet<SequenceId>,
    ended: HashMap<SequenceId, SequenceState>,
    agent_speaking: bool,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) -> SequenceId {
        self.last_issued += 1;
        let id = self.last_issued;
        self.live.insert(id);
        self.agent_speaking = true;
        tracing::info!(sequence = id, "starting response sequence");
        id
    }

    /// Invalidate every live sequence. Returns the ids that were live.
    pub fn interrupt(&mut self) -> Vec<SequenceId> {
        let invalidated: Vec<SequenceId> = std::mem::take(&mut self.live).into_iter().collect();
        for id in &invalidated {
            self.ended.insert(*id, SequenceState::Interrupted);
        }
        self.agent_speaking = false;
        if !invalidated.is_empty() {
            tracing::info!(sequences = ?invalidated, "caller interrupted, invalidating sequences");
        }
        invalidated
    }

    pub fn is_valid(&self, id: SequenceId) -> bool {
        self.live.contains(&id)
    }

    /// Retire `id` after its playback was confirmed.
    pub fn finish(&mut self, id: SequenceId) -> bool {
        self.retire(id, SequenceState::Completed)
    }

    /// Retire `id` without a playback confirmation.
    pub fn abandon(&mut self, id: SequenceId) -> bool {
        self.retire(id, SequenceState::Abandoned)
    }

    fn retire(&mut self, id: SequenceId, state: SequenceState) -> bool {
        if !self.live.remove(&id) {
            return false;
        }
        self.ended.insert(id, state);
        if self.live.is_empty() {
            self.agent_speaking = false;
        }
        tracing::info!(sequence = id, ?state, "response sequence retired");
        true
    }

    pub fn state(&self, id: SequenceId) -> Option<SequenceState> {
        if self.live.contains(&id) {
            Some(SequenceState::Live)
        } else {
            self.ended.get(&id).copied()
        }
    }

    pub fn is_agent_speaking(&self) -> bool {
        self.agent_speaking
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_strictly_increasing() {
        let mut tracker = SequenceTracker::new();
        let first = tracker.start();
        let second = tracker.start();
        tracker.interrupt();
        let third = tracker.start();

        assert!(first < second && second < third);
        assert_eq!(marker_name(third), "end-3");
    }

    #[test]
    fn interrupt_invalidates_every_live_sequence() {
        let mut tracker = SequenceTracker::new();
        let ids: Vec<_> = (0..5).map(|_| tracker.start()).collect();

        let invalidated = tracker.interrupt();

        assert_eq!(invalidated, ids);
        assert!(ids.iter().all(|id| !tracker.is_valid(*id)));
        assert!(ids
            .iter()
            .all(|id| tracker.state(*id) == Some(SequenceState::Interrupted)));
        assert!(!tracker.is_agent_speaking());
    }

    #[test]
    fn second_interrupt_is_a_no_op() {
        let mut tracker = SequenceTracker::new();
        let id = tracker.start();
        tracker.interrupt();

        assert!(tracker.interrupt().is_empty());
        assert_eq!(tracker.state(id), Some(SequenceState::Interrupted));
        assert!(!tracker.is_agent_speaking());
        assert_eq!(tracker.live_count(), 0);
    }

    #[test]
    fn speaking_flag_clears_when_last_sequence_retires() {
        let mut tracker = SequenceTracker::new();
        let first = tracker.start();
        let second = tracker.start();

        assert!(tracker.finish(first));
        assert!(tracker.is_agent_speaking());
        assert!(tracker.abandon(second));
        assert!(!tracker.is_agent_speaking());

        assert_eq!(tracker.state(first), Some(SequenceState::Completed));
        assert_eq!(tracker.state(second), Some(SequenceState::Abandoned));
    }

    #[test]
    fn finishing_an_interrupted_sequence_does_not_complete_it() {
        let mut tracker = SequenceTracker::new();
        let id = tracker.start();
        tracker.interrupt();

        assert!(!tracker.finish(id));
        assert_eq!(tracker.state(id), Some(SequenceState::Interrupted));
        assert_eq!(tracker.state(42), None);
    }
}
