use crate::frames::FrameAligner;
use crate::playback::PlaybackCompletionTracker;
use crate::sequence::{SequenceId, SequenceState, SequenceTracker, marker_name};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type SharedCallState = Arc<CallState>;

/// What a barge-in threw away.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterruptSummary {
    pub sequences: Vec<SequenceId>,
    pub discarded_bytes: usize,
    pub dropped_markers: usize,
}

impl InterruptSummary {
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty() && self.discarded_bytes == 0 && self.dropped_markers == 0
    }
}

struct Inner {
    sequences: SequenceTracker,
    frames: FrameAligner,
    markers: PlaybackCompletionTracker,
}

/// Per-call state shared between the controller and turn tasks.
///
/// Turn tasks run on a multi-threaded runtime, so the live set, the audio
/// remainder and the pending markers sit behind one mutex. Operations that
/// must not interleave with a barge-in (checking validity then buffering
/// audio, checking validity then registering a marker) happen in a single
/// critical section.
pub struct CallState {
    inner: Mutex<Inner>,
}

impl CallState {
    pub fn new(frame_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                sequences: SequenceTracker::new(),
                frames: FrameAligner::new(frame_size),
                markers: PlaybackCompletionTracker::new(),
            }),
        }
    }

    pub fn shared(frame_size: usize) -> SharedCallState {
        Arc::new(Self::new(frame_size))
    }

    // Every method leaves the state consistent before it can panic, so a
    // poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn start_sequence(&self) -> SequenceId {
        self.lock().sequences.start()
    }

    pub fn is_valid(&self, id: SequenceId) -> bool {
        self.lock().sequences.is_valid(id)
    }

    pub fn is_agent_speaking(&self) -> bool {
        self.lock().sequences.is_agent_speaking()
    }

    pub fn sequence_state(&self, id: SequenceId) -> Option<SequenceState> {
        self.lock().sequences.state(id)
    }

    /// Buffer synthesized audio for `id` and return the frames it completes.
    ///
    /// Returns `None` without touching the buffer if `id` is no longer live.
    pub fn push_audio(&self, id: SequenceId, audio: &[u8]) -> Option<Vec<Vec<u8>>> {
        let mut inner = self.lock();
        if !inner.sequences.is_valid(id) {
            return None;
        }
        Some(inner.frames.push(audio))
    }

    /// The short trailing frame for `id`, if it is live and anything is buffered.
    pub fn flush_audio(&self, id: SequenceId) -> Option<Vec<u8>> {
        let mut inner = self.lock();
        if !inner.sequences.is_valid(id) {
            return None;
        }
        inner.frames.flush()
    }

    /// Register the end-of-turn marker for a live sequence.
    pub fn register_marker(&self, id: SequenceId) -> Option<String> {
        let mut inner = self.lock();
        if !inner.sequences.is_valid(id) {
            return None;
        }
        let name = marker_name(id);
        inner.markers.register(&name, id).then_some(name)
    }

    /// Resolve a marker echoed by the channel and complete its sequence.
    pub fn acknowledge_marker(&self, marker: &str) -> Option<SequenceId> {
        let mut inner = self.lock();
        let id = inner.markers.resolve(marker)?;
        inner.sequences.finish(id);
        Some(id)
    }

    /// Retire a sequence that will never get a marker.
    ///
    /// Its unflushed audio is dropped with it, so the next sequence starts on
    /// a frame boundary.
    pub fn abandon(&self, id: SequenceId) -> bool {
        let mut inner = self.lock();
        let retired = inner.sequences.abandon(id);
        if retired {
            let discarded = inner.frames.clear();
            if discarded > 0 {
                tracing::debug!(sequence = id, discarded, "dropped audio of abandoned sequence");
            }
        }
        retired
    }

    /// Barge-in: invalidate every live sequence, drop buffered audio and
    /// forget pending markers, all in one step.
    pub fn interrupt(&self) -> InterruptSummary {
        let mut inner = self.lock();
        InterruptSummary {
            sequences: inner.sequences.interrupt(),
            discarded_bytes: inner.frames.clear(),
            dropped_markers: inner.markers.clear(),
        }
    }

    pub fn pending_markers(&self) -> usize {
        self.lock().markers.pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_sequence_cannot_buffer_audio() {
        let state = CallState::new(4);
        let first = state.start_sequence();
        assert_eq!(state.push_audio(first, &[1, 2]), Some(vec![]));

        state.interrupt();
        let second = state.start_sequence();

        assert_eq!(state.push_audio(first, &[9, 9, 9, 9]), None);
        assert_eq!(state.flush_audio(first), None);
        assert_eq!(state.push_audio(second, &[5, 6, 7, 8]), Some(vec![vec![5, 6, 7, 8]]));
    }

    #[test]
    fn interrupt_summary_reports_what_was_dropped() {
        let state = CallState::new(160);
        let id = state.start_sequence();
        state.push_audio(id, &[0xFF; 10]);
        state.register_marker(id);

        let summary = state.interrupt();
        assert_eq!(
            summary,
            InterruptSummary {
                sequences: vec![id],
                discarded_bytes: 10,
                dropped_markers: 1,
            }
        );
        assert!(state.interrupt().is_empty());
    }

    #[test]
    fn marker_is_only_registered_for_live_sequences() {
        let state = CallState::new(160);
        let id = state.start_sequence();
        assert_eq!(state.register_marker(id).as_deref(), Some("end-1"));
        assert_eq!(state.register_marker(id), None);

        state.interrupt();
        assert_eq!(state.register_marker(id), None);
        assert_eq!(state.acknowledge_marker("end-1"), None);
        assert_eq!(state.sequence_state(id), Some(SequenceState::Interrupted));
    }

    #[test]
    fn barge_in_then_new_turn_completes_on_acknowledgment() {
        let state = CallState::new(4);
        let first = state.start_sequence();
        let frames = state.push_audio(first, &[0; 12]).unwrap();
        assert_eq!(frames.len(), 3);

        state.interrupt();
        let second = state.start_sequence();
        let marker = state.register_marker(second).unwrap();
        assert_eq!(marker, "end-2");

        assert_eq!(state.acknowledge_marker(&marker), Some(second));
        assert_eq!(state.sequence_state(first), Some(SequenceState::Interrupted));
        assert_eq!(state.sequence_state(second), Some(SequenceState::Completed));
        assert_eq!(state.pending_markers(), 0);
        assert!(!state.is_agent_speaking());
    }

    #[test]
    fn abandoned_sequence_leaves_no_audio_for_the_next() {
        let state = CallState::new(4);
        let failed = state.start_sequence();
        assert_eq!(state.push_audio(failed, &[1, 2, 3, 4, 5]), Some(vec![vec![1, 2, 3, 4]]));

        assert!(state.abandon(failed));
        assert!(!state.abandon(failed));
        assert_eq!(state.sequence_state(failed), Some(SequenceState::Abandoned));

        let next = state.start_sequence();
        assert_eq!(state.push_audio(next, &[6, 7, 8, 9]), Some(vec![vec![6, 7, 8, 9]]));
        assert_eq!(state.flush_audio(next), None);
    }

    #[test]
    fn sequence_left_unacknowledged_never_completes() {
        let state = CallState::new(160);
        let id = state.start_sequence();
        state.register_marker(id);

        assert_eq!(state.sequence_state(id), Some(SequenceState::Live));
        state.interrupt();
        assert_ne!(state.sequence_state(id), Some(SequenceState::Completed));
    }
}
