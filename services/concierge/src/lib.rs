pub mod config;
pub mod deepgram_adapter;
pub mod prompt_loader;
pub mod server;
pub mod twilio;
