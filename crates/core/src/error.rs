use thiserror::Error;

/// Why a single turn produced no (or only partial) reply.
///
/// None of these escape the turn engine; they are reported to the call
/// controller, which logs them and waits for the next utterance.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("sequence was interrupted")]
    Interrupted,

    #[error("language model request failed: {0:#}")]
    Model(anyhow::Error),

    #[error("synthesis failed: {0:#}")]
    Synthesis(anyhow::Error),

    #[error("failed to deliver audio to the call: {0:#}")]
    Channel(anyhow::Error),

    #[error("model kept requesting tools after {0} rounds")]
    ToolRoundLimit(usize),
}

impl TurnError {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, TurnError::Interrupted)
    }
}

/// Failures that end a call before it can start talking.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("could not open the synthesis connection: {0:#}")]
    Synthesis(anyhow::Error),

    #[error("could not open the recognition connection: {0:#}")]
    Recognition(anyhow::Error),
}
