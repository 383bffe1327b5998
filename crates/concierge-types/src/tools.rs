#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ToolKind {
    #[serde(rename = "function")]
    Function,
}

/// A tool declaration in the chat-completions shape:
/// `{"type": "function", "function": {...}}`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Tool {
    #[serde(rename = "type")]
    kind: ToolKind,
    function: FunctionTool,
}

impl Tool {
    pub fn function(function: FunctionTool) -> Self {
        Self {
            kind: ToolKind::Function,
            function,
        }
    }

    pub fn kind(&self) -> ToolKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        self.function.name()
    }

    pub fn definition(&self) -> &FunctionTool {
        &self.function
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FunctionTool {
    /// The name of the function
    name: String,

    /// The description of the function
    description: String,

    /// The parameters of the function in JSON Schema format
    parameters: serde_json::Value,
}

impl FunctionTool {
    pub fn new(name: &str, description: &str, parameters: serde_json::Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parameters(&self) -> &serde_json::Value {
        &self.parameters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_serializes_in_chat_completions_shape() {
        let tool = Tool::function(FunctionTool::new(
            "choose_room",
            "Select a room by id.",
            serde_json::json!({"type": "object"}),
        ));

        let value = serde_json::to_value(&tool).unwrap();
        assert_eq!(value["type"], "function");
        assert_eq!(value["function"]["name"], "choose_room");
        assert_eq!(value["function"]["parameters"]["type"], "object");
    }
}
