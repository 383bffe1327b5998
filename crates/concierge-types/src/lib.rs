//now callers can use these types without pulling in any client
pub mod chat;
pub mod deepgram;
pub mod tools;
pub mod twilio;

//re-export types for easier access
pub use chat::{ChatMessage, Role, ToolCall};
pub use tools::{FunctionTool, Tool};
pub use twilio::{InboundMessage, OutboundMessage};
