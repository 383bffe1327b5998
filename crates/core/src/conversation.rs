use crate::booking::BookingContext;
use crate::prompt::TOOL_GUIDANCE;
use concierge_types::{ChatMessage, ToolCall};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static DECLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(no thanks|no thank you|nothing else|no|nope|nah|nothing|that['’]s all|that is all|that['’]s it|that is it|i['’]m good|im good|i am good|i['’]m fine|all set|that['’]ll be all)\b",
    )
    .unwrap()
});
// Pleasantries a caller may wrap a decline in.
static CLOSING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(thanks|thank you|thank|so much|very much|really|for now|okay|ok|great|perfect|cheers|bye|goodbye|good ?night|have a (good|nice|great) (day|night|one)|oh|well)\b",
    )
    .unwrap()
});

/// A reply that turns down further help and asks for nothing new.
///
/// "No thanks, that's all." declines; "No, I'd like a different room" does
/// not, since words outside the closing vocabulary are left over.
fn is_decline(utterance: &str) -> bool {
    if !DECLINE.is_match(utterance) {
        return false;
    }
    let rest = DECLINE.replace_all(utterance, " ");
    let rest = CLOSING.replace_all(&rest, " ");
    !rest.chars().any(char::is_alphanumeric)
}

/// Everything one call remembers: the model history, the booking slots, and
/// the flags that decide when the caller is done.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    pub context: BookingContext,
    booking_confirmed: bool,
    asked_anything_else: bool,
    completed: bool,
}

impl Conversation {
    pub fn new(system_prompt: &str) -> Self {
        Self {
            messages: vec![
                ChatMessage::system(system_prompt),
                ChatMessage::system(TOOL_GUIDANCE),
            ],
            context: BookingContext::new(),
            booking_confirmed: false,
            asked_anything_else: false,
            completed: false,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Record a caller utterance and merge the slots it mentions.
    pub fn push_user(&mut self, utterance: &str) {
        self.context.update_from_text(utterance);
        self.messages.push(ChatMessage::user(utterance));
    }

    pub fn push_tool_calls(&mut self, content: Option<String>, calls: Vec<ToolCall>) {
        self.messages
            .push(ChatMessage::assistant_tool_calls(content, calls));
    }

    pub fn push_tool_result(&mut self, call: &ToolCall, result: &Value) {
        if result.get("booking_id").is_some_and(|id| !id.is_null()) {
            self.booking_confirmed = true;
        }
        self.messages.push(ChatMessage::tool_result(
            &call.id,
            &call.function.name,
            result.to_string(),
        ));
    }

    pub fn push_assistant(&mut self, reply: &str) {
        self.messages.push(ChatMessage::assistant(reply));
    }

    /// Update the completion flags after the agent answered `utterance` with `reply`.
    ///
    /// The caller's decline only counts if the agent had already asked whether
    /// there was anything else before this utterance.
    pub fn record_reply(&mut self, utterance: &str, reply: &str) {
        if self.context.booking_id.is_some() {
            self.booking_confirmed = true;
        }

        if self.asked_anything_else && is_decline(utterance) {
            self.completed = true;
            tracing::info!("caller declined further help, conversation complete");
        }

        let reply = reply.to_lowercase();
        if self.booking_confirmed
            && (reply.contains("anything else") || reply.contains("help you with"))
        {
            self.asked_anything_else = true;
        }
    }

    pub fn booking_confirmed(&self) -> bool {
        self.booking_confirmed
    }

    pub fn asked_anything_else(&self) -> bool {
        self.asked_anything_else
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }
}
