use thiserror::Error;

/// Why an analysis attempt failed. `Display` is the text shown to the user.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Network error: {0}")]
    Transport(String),
    #[error("Empty response")]
    EmptyResponse,
    #[error("Could not read nutrition data: {0}")]
    MalformedPayload(String),
    #[error("Failed to save entry: {0}")]
    Persistence(String),
    #[error("Failed to read capture: {0}")]
    Capture(String),
    #[error("Superseded by a newer analysis")]
    Superseded,
}

impl AnalysisError {
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::Transport(_) => "transport",
            AnalysisError::EmptyResponse => "empty_response",
            AnalysisError::MalformedPayload(_) => "malformed_payload",
            AnalysisError::Persistence(_) => "persistence",
            AnalysisError::Capture(_) => "capture",
            AnalysisError::Superseded => "superseded",
        }
    }
}
