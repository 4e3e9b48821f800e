use serde::{Deserialize, Serialize};

/// Tunables of the lifecycle engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Upper bound on messages fetched when rendering a transcript.
    #[serde(default = "default_transcript_max_messages")]
    pub transcript_max_messages: usize,
}

fn default_transcript_max_messages() -> usize {
    1000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            transcript_max_messages: default_transcript_max_messages(),
        }
    }
}
