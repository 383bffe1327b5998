use crate::booking::BookingDesk;
use crate::conversation::Conversation;
use crate::delivery::Delivery;
use crate::error::TurnError;
use crate::llm::ChatModel;
use crate::monitor::SpeechStatus;
use crate::realtime_api::Synthesizer;
use crate::segmenter::UnitSegmenter;
use crate::sequence::SequenceId;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct TurnConfig {
    /// Units at or under this many characters wait for more text.
    pub min_unit_len: usize,
    /// Tool rounds allowed per turn before the turn is given up.
    pub max_tool_rounds: usize,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            min_unit_len: 5,
            max_tool_rounds: 5,
        }
    }
}

/// What a successful turn delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnSummary {
    pub reply: String,
    pub units: usize,
    pub frames: usize,
    /// `None` when the session is speech-disabled.
    pub marker: Option<String>,
}

#[derive(Debug)]
pub struct TurnReport {
    pub sequence: SequenceId,
    pub result: Result<TurnSummary, TurnError>,
    /// The caller declined further help after a confirmed booking.
    pub conversation_complete: bool,
}

/// Runs one sequence from utterance to end-of-turn marker.
///
/// Cheap to clone; every turn of a call shares the same conversation, which
/// also serializes turns: a turn waits for the previous one to finish or
/// notice it was interrupted.
#[derive(Clone)]
pub struct DialogueTurnEngine {
    model: Arc<dyn ChatModel>,
    synthesizer: Arc<dyn Synthesizer>,
    delivery: Arc<Delivery>,
    desk: BookingDesk,
    conversation: Arc<Mutex<Conversation>>,
    speech: Arc<SpeechStatus>,
    config: TurnConfig,
}

impl DialogueTurnEngine {
    pub fn new(
        model: Arc<dyn ChatModel>,
        synthesizer: Arc<dyn Synthesizer>,
        delivery: Arc<Delivery>,
        desk: BookingDesk,
        conversation: Arc<Mutex<Conversation>>,
        speech: Arc<SpeechStatus>,
        config: TurnConfig,
    ) -> Self {
        Self {
            model,
            synthesizer,
            delivery,
            desk,
            conversation,
            speech,
            config,
        }
    }

    pub fn conversation(&self) -> &Arc<Mutex<Conversation>> {
        &self.conversation
    }

    /// Answer one finalized caller utterance.
    pub async fn run(&self, utterance: &str, id: SequenceId) -> TurnReport {
        let mut conversation = self.conversation.lock().await;
        let result = self.respond(&mut conversation, utterance, id).await;
        if let Ok(summary) = &result {
            conversation.record_reply(utterance, &summary.reply);
        }
        self.report(id, result, conversation.is_complete())
    }

    /// Speak the opening greeting; there is no utterance to parse.
    pub async fn run_greeting(&self, id: SequenceId, greeting: &str) -> TurnReport {
        let mut conversation = self.conversation.lock().await;
        let result = async {
            let frames = self.speak_unit(id, greeting).await?;
            self.finish_reply(&mut conversation, id, greeting.to_string(), 1, frames)
                .await
        }
        .await;
        self.report(id, result, conversation.is_complete())
    }

    fn report(
        &self,
        id: SequenceId,
        result: Result<TurnSummary, TurnError>,
        conversation_complete: bool,
    ) -> TurnReport {
        match &result {
            Ok(summary) => {
                tracing::info!(
                    sequence = id,
                    units = summary.units,
                    frames = summary.frames,
                    marker = ?summary.marker,
                    "turn delivered"
                );
                if summary.marker.is_none() {
                    self.delivery.state().abandon(id);
                }
            }
            Err(TurnError::Interrupted) => {
                tracing::info!(sequence = id, "turn aborted after interruption");
            }
            Err(e) => {
                tracing::warn!(sequence = id, "turn failed: {}", e);
                self.delivery.state().abandon(id);
            }
        }
        TurnReport {
            sequence: id,
            result,
            conversation_complete,
        }
    }

    fn ensure_valid(&self, id: SequenceId) -> Result<(), TurnError> {
        if self.delivery.state().is_valid(id) {
            Ok(())
        } else {
            Err(TurnError::Interrupted)
        }
    }

    async fn respond(
        &self,
        conversation: &mut Conversation,
        utterance: &str,
        id: SequenceId,
    ) -> Result<TurnSummary, TurnError> {
        conversation.push_user(utterance);
        self.run_tool_rounds(conversation, id).await?;

        let mut chunks = self
            .model
            .stream(conversation.messages())
            .await
            .map_err(TurnError::Model)?;
        self.ensure_valid(id)?;

        let mut segmenter = UnitSegmenter::new(self.config.min_unit_len);
        let mut reply = String::new();
        let (mut units, mut frames) = (0, 0);
        while let Some(chunk) = chunks.recv().await {
            self.ensure_valid(id)?;
            let chunk = chunk.map_err(TurnError::Model)?;
            reply.push_str(&chunk);
            if let Some(unit) = segmenter.push(&chunk) {
                tracing::debug!(sequence = id, unit = %unit, "speakable unit");
                frames += self.speak_unit(id, &unit).await?;
                units += 1;
            }
        }
        self.ensure_valid(id)?;
        if let Some(unit) = segmenter.finish() {
            frames += self.speak_unit(id, &unit).await?;
            units += 1;
        }

        self.finish_reply(conversation, id, reply, units, frames)
            .await
    }

    /// Call the model with tools until it stops asking for them.
    async fn run_tool_rounds(
        &self,
        conversation: &mut Conversation,
        id: SequenceId,
    ) -> Result<(), TurnError> {
        let tools = self.desk.declarations();
        for round in 0..=self.config.max_tool_rounds {
            self.ensure_valid(id)?;
            let message = self
                .model
                .complete(conversation.messages(), &tools)
                .await
                .map_err(TurnError::Model)?;
            self.ensure_valid(id)?;

            if message.tool_calls.is_empty() {
                return Ok(());
            }
            if round == self.config.max_tool_rounds {
                break;
            }

            let calls = message.tool_calls;
            conversation.push_tool_calls(message.content, calls.clone());
            for call in &calls {
                tracing::info!(
                    sequence = id,
                    tool = %call.function.name,
                    arguments = %call.function.arguments,
                    "invoking tool"
                );
                let result = self.desk.invoke(
                    &mut conversation.context,
                    &call.function.name,
                    &call.function.arguments,
                );
                conversation.push_tool_result(call, &result);
            }
        }
        Err(TurnError::ToolRoundLimit(self.config.max_tool_rounds))
    }

    /// Synthesize one unit and forward its audio. Returns the frames sent.
    async fn speak_unit(&self, id: SequenceId, unit: &str) -> Result<usize, TurnError> {
        self.ensure_valid(id)?;
        if !self.speech.is_enabled() {
            return Ok(0);
        }
        let mut audio = self
            .synthesizer
            .synthesize(unit)
            .await
            .map_err(TurnError::Synthesis)?;
        let mut frames = 0;
        while let Some(chunk) = audio.recv().await {
            let chunk = chunk.map_err(TurnError::Synthesis)?;
            frames += self.delivery.push(id, &chunk).await?;
        }
        Ok(frames)
    }

    async fn finish_reply(
        &self,
        conversation: &mut Conversation,
        id: SequenceId,
        reply: String,
        units: usize,
        mut frames: usize,
    ) -> Result<TurnSummary, TurnError> {
        self.ensure_valid(id)?;
        let marker = if self.speech.is_enabled() {
            frames += self.delivery.flush(id).await?;
            Some(self.delivery.mark(id).await?)
        } else {
            tracing::warn!(sequence = id, "speech disabled, reply kept in history only");
            None
        };
        conversation.push_assistant(&reply);
        Ok(TurnSummary {
            reply,
            units,
            frames,
            marker,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::BookingStore;
    use crate::llm::MockChatModel;
    use crate::session_state::{CallState, SharedCallState};
    use crate::sequence::SequenceState;
    use crate::test_support::{FakeChannel, FakeSynthesizer, Sent, text_stream};
    use concierge_types::{ChatMessage, Role, ToolCall};

    struct Harness {
        state: SharedCallState,
        channel: Arc<FakeChannel>,
        synthesizer: Arc<FakeSynthesizer>,
        speech: Arc<SpeechStatus>,
        engine: DialogueTurnEngine,
    }

    fn harness(model: MockChatModel, frame_size: usize) -> Harness {
        let state = CallState::shared(frame_size);
        let channel = Arc::new(FakeChannel::default());
        let synthesizer = Arc::new(FakeSynthesizer::default());
        let speech = Arc::new(SpeechStatus::default());
        let delivery = Arc::new(Delivery::new(state.clone(), channel.clone()));
        let engine = DialogueTurnEngine::new(
            Arc::new(model),
            synthesizer.clone(),
            delivery,
            BookingDesk::new(Arc::new(BookingStore::new())),
            Arc::new(Mutex::new(Conversation::new("You are a receptionist."))),
            speech.clone(),
            TurnConfig::default(),
        );
        Harness {
            state,
            channel,
            synthesizer,
            speech,
            engine,
        }
    }

    #[tokio::test]
    async fn tool_round_then_streamed_reply() {
        let mut model = MockChatModel::new();
        let mut seq = mockall::Sequence::new();
        model
            .expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|messages, tools| {
                tools.len() == 3 && messages.last().map(|m| m.role) == Some(Role::User)
            })
            .returning(|_, _| {
                Ok(ChatMessage::assistant_tool_calls(
                    None,
                    vec![ToolCall::new("call_1", "get_availability", r#"{"guests":2,"beds":2}"#)],
                ))
            });
        model
            .expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|messages, _| {
                let last = messages.last().unwrap();
                last.role == Role::Tool
                    && last.text().contains("deluxe-two-bed")
                    && last.text().contains("deluxe-lounge")
            })
            .returning(|_, _| Ok(ChatMessage::assistant("We have two rooms.")));
        model
            .expect_stream()
            .times(1)
            .returning(|_| Ok(text_stream(&["We have two rooms", " for you.", " Shall I hold one?"])));

        let h = harness(model, 4);
        let id = h.state.start_sequence();
        let report = h.engine.run("Two guests, double bed please", id).await;

        let summary = report.result.unwrap();
        assert_eq!(summary.units, 2);
        assert_eq!(summary.marker.as_deref(), Some("end-1"));
        assert_eq!(
            h.synthesizer.spoken(),
            vec!["We have two rooms for you.", "Shall I hold one?"]
        );
        assert_eq!(h.channel.marks(), vec!["end-1"]);

        let conversation = h.engine.conversation().lock().await;
        let roles: Vec<Role> = conversation.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::System, Role::User, Role::Assistant, Role::Tool, Role::Assistant]
        );
        assert_eq!(conversation.context.guests, Some(2));
        assert_eq!(conversation.context.available_rooms.len(), 2);
        assert_eq!(
            conversation.messages().last().unwrap().text(),
            "We have two rooms for you. Shall I hold one?"
        );
    }

    #[tokio::test]
    async fn audio_is_framed_and_flushed_before_the_marker() {
        let mut model = MockChatModel::new();
        model
            .expect_complete()
            .returning(|_, _| Ok(ChatMessage::assistant("")));
        model
            .expect_stream()
            .returning(|_| Ok(text_stream(&["Certainly, one moment."])));

        let h = harness(model, 4);
        h.synthesizer.set_audio(vec![vec![1, 2, 3], vec![4, 5, 6, 7, 8, 9]]);
        let id = h.state.start_sequence();
        let summary = h.engine.run("hello", id).await.result.unwrap();

        assert_eq!(summary.frames, 3);
        assert_eq!(
            h.channel.sent(),
            vec![
                Sent::Frame(vec![1, 2, 3, 4]),
                Sent::Frame(vec![5, 6, 7, 8]),
                Sent::Frame(vec![9]),
                Sent::Mark("end-1".to_string()),
            ]
        );
        assert_eq!(h.state.sequence_state(id), Some(SequenceState::Live));
        assert_eq!(h.state.acknowledge_marker("end-1"), Some(id));
        assert_eq!(h.state.sequence_state(id), Some(SequenceState::Completed));
    }

    #[tokio::test]
    async fn interrupt_mid_stream_stops_the_turn() {
        let mut model = MockChatModel::new();
        model
            .expect_complete()
            .returning(|_, _| Ok(ChatMessage::assistant("")));
        let (tx, rx) = tokio::sync::mpsc::channel(8);
        let mut rx = Some(rx);
        model
            .expect_stream()
            .returning(move |_| Ok(rx.take().unwrap()));

        let h = harness(model, 160);
        let id = h.state.start_sequence();
        let engine = h.engine.clone();
        let turn = tokio::spawn(async move { engine.run("what rooms do you have", id).await });

        tx.send(Ok("First sentence here.".to_string())).await.unwrap();
        while h.synthesizer.spoken().is_empty() {
            tokio::task::yield_now().await;
        }
        h.state.interrupt();
        tx.send(Ok(" Second sentence here.".to_string())).await.unwrap();
        drop(tx);

        let report = turn.await.unwrap();
        assert!(report.result.unwrap_err().is_interrupted());
        assert_eq!(h.synthesizer.spoken(), vec!["First sentence here."]);
        assert!(h.channel.marks().is_empty());
        assert_eq!(h.state.sequence_state(id), Some(SequenceState::Interrupted));

        let conversation = h.engine.conversation().lock().await;
        assert_eq!(conversation.messages().last().unwrap().role, Role::User);
    }

    #[tokio::test]
    async fn model_failure_abandons_the_sequence() {
        let mut model = MockChatModel::new();
        model
            .expect_complete()
            .returning(|_, _| Err(anyhow::anyhow!("rate limited")));

        let h = harness(model, 160);
        let id = h.state.start_sequence();
        let report = h.engine.run("hi", id).await;

        assert!(matches!(report.result, Err(TurnError::Model(_))));
        assert_eq!(h.state.sequence_state(id), Some(SequenceState::Abandoned));
        assert!(h.channel.sent().is_empty());
        assert!(!h.state.is_agent_speaking());
    }

    #[tokio::test]
    async fn failed_turn_leftover_audio_does_not_prefix_the_next_turn() {
        let mut model = MockChatModel::new();
        model
            .expect_complete()
            .returning(|_, _| Ok(ChatMessage::assistant("")));
        let (tx, rx) = tokio::sync::mpsc::channel(8);
        tx.send(Ok("First sentence here.".to_string())).await.unwrap();
        tx.send(Err(anyhow::anyhow!("stream broke"))).await.unwrap();
        drop(tx);
        let mut broken = Some(rx);
        model.expect_stream().returning(move |_| match broken.take() {
            Some(rx) => Ok(rx),
            None => Ok(text_stream(&["Second reply is fine."])),
        });

        let h = harness(model, 4);
        h.synthesizer.set_audio(vec![vec![1, 2, 3, 4, 5]]);

        let failed = h.state.start_sequence();
        let report = h.engine.run("hello", failed).await;
        assert!(matches!(report.result, Err(TurnError::Model(_))));
        assert_eq!(h.state.sequence_state(failed), Some(SequenceState::Abandoned));
        assert_eq!(h.channel.frames(), vec![vec![1, 2, 3, 4]]);

        let next = h.state.start_sequence();
        let summary = h.engine.run("are you there", next).await.result.unwrap();
        assert_eq!(summary.marker.as_deref(), Some("end-2"));
        assert_eq!(
            h.channel.frames(),
            vec![vec![1, 2, 3, 4], vec![1, 2, 3, 4], vec![5]]
        );
    }

    #[tokio::test]
    async fn synthesis_dropped_mid_unit_fails_the_turn() {
        let mut model = MockChatModel::new();
        model
            .expect_complete()
            .returning(|_, _| Ok(ChatMessage::assistant("")));
        model
            .expect_stream()
            .returning(|_| Ok(text_stream(&["Our lounge room is free tonight."])));

        let h = harness(model, 4);
        h.synthesizer.set_audio(vec![vec![1, 2, 3, 4, 5, 6]]);
        h.synthesizer.drop_mid_unit(true);
        let id = h.state.start_sequence();
        let report = h.engine.run("anything tonight", id).await;

        assert!(matches!(report.result, Err(TurnError::Synthesis(_))));
        assert!(h.channel.marks().is_empty());
        assert_eq!(h.channel.frames(), vec![vec![1, 2, 3, 4]]);
        assert_eq!(h.state.sequence_state(id), Some(SequenceState::Abandoned));
        assert!(!h.state.is_agent_speaking());

        let conversation = h.engine.conversation().lock().await;
        assert_eq!(conversation.messages().last().unwrap().role, Role::User);
    }

    #[tokio::test]
    async fn tool_rounds_are_capped() {
        let mut model = MockChatModel::new();
        model.expect_complete().times(6).returning(|_, _| {
            Ok(ChatMessage::assistant_tool_calls(
                None,
                vec![ToolCall::new("call", "choose_room", r#"{"room_id":"family-suite"}"#)],
            ))
        });
        model.expect_stream().never();

        let h = harness(model, 160);
        let id = h.state.start_sequence();
        let report = h.engine.run("the family suite", id).await;

        assert!(matches!(report.result, Err(TurnError::ToolRoundLimit(5))));
        assert_eq!(h.state.sequence_state(id), Some(SequenceState::Abandoned));
    }

    #[tokio::test]
    async fn speech_disabled_turn_updates_history_only() {
        let mut model = MockChatModel::new();
        model
            .expect_complete()
            .returning(|_, _| Ok(ChatMessage::assistant("")));
        model
            .expect_stream()
            .returning(|_| Ok(text_stream(&["Sorry, I cannot speak right now."])));

        let h = harness(model, 160);
        h.speech.disable();
        let id = h.state.start_sequence();
        let summary = h.engine.run("hello?", id).await.result.unwrap();

        assert_eq!(summary.marker, None);
        assert!(h.synthesizer.spoken().is_empty());
        assert!(h.channel.sent().is_empty());
        assert_eq!(h.state.sequence_state(id), Some(SequenceState::Abandoned));
        let conversation = h.engine.conversation().lock().await;
        assert_eq!(
            conversation.messages().last().unwrap().text(),
            "Sorry, I cannot speak right now."
        );
    }

    #[tokio::test]
    async fn greeting_is_spoken_and_recorded() {
        let h = harness(MockChatModel::new(), 160);
        let id = h.state.start_sequence();
        let report = h.engine.run_greeting(id, "Hello, how can I help?").await;

        assert_eq!(report.result.unwrap().marker.as_deref(), Some("end-1"));
        assert_eq!(h.synthesizer.spoken(), vec!["Hello, how can I help?"]);
        let conversation = h.engine.conversation().lock().await;
        let last = conversation.messages().last().unwrap();
        assert_eq!((last.role, last.text()), (Role::Assistant, "Hello, how can I help?"));
    }
}
