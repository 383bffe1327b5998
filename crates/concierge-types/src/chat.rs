//! OpenAI-compatible chat-completions messages.

use crate::tools::Tool;

/// The role of the message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One entry of the conversation history sent to the model.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChatMessage {
    pub role: Role,

    #[serde(default)]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    fn new(role: Role, content: Option<String>) -> Self {
        Self {
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system(text: &str) -> Self {
        Self::new(Role::System, Some(text.to_string()))
    }

    pub fn user(text: &str) -> Self {
        Self::new(Role::User, Some(text.to_string()))
    }

    pub fn assistant(text: &str) -> Self {
        Self::new(Role::Assistant, Some(text.to_string()))
    }

    /// An assistant turn that asked for tool invocations.
    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::new(Role::Assistant, Some(content.unwrap_or_default()))
        }
    }

    /// The structured result of one tool invocation.
    pub fn tool_result(tool_call_id: &str, name: &str, content: String) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.to_string()),
            name: Some(name.to_string()),
            ..Self::new(Role::Tool, Some(content))
        }
    }

    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolCall {
    pub id: String,

    #[serde(rename = "type", default = "default_tool_call_kind")]
    pub kind: String,

    pub function: FunctionCall,
}

fn default_tool_call_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FunctionCall {
    pub name: String,

    /// Arguments as a JSON-encoded string, exactly as the model produced them.
    #[serde(default)]
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: &str, name: &str, arguments: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: default_tool_call_kind(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }
    }
}

/// Body of `POST /chat/completions`.
#[derive(Debug, serde::Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<&'a [Tool]>,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Choice {
    pub message: ChatMessage,
}

/// One `data:` payload of a streamed completion.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ChatStreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub delta: Delta,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatStreamChunk {
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
    }
}
