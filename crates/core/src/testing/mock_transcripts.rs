//! In-memory transcript store for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::ticket::Ticket;
use crate::transcript::{TranscriptError, TranscriptStore};

/// Mock implementation of the TranscriptStore trait.
#[derive(Debug, Default)]
pub struct MockTranscriptStore {
    transcripts: Arc<RwLock<HashMap<String, String>>>,
    /// When true, every save fails with an I/O error.
    fail_saves: Arc<RwLock<bool>>,
}

impl MockTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_saves(&self, fail: bool) {
        *self.fail_saves.write().await = fail;
    }

    pub async fn count(&self) -> usize {
        self.transcripts.read().await.len()
    }

    pub async fn get(&self, pointer: &str) -> Option<String> {
        self.transcripts.read().await.get(pointer).cloned()
    }
}

#[async_trait]
impl TranscriptStore for MockTranscriptStore {
    async fn save(&self, ticket: &Ticket, rendered: &str) -> Result<String, TranscriptError> {
        let pointer = format!("mock/{}.txt", ticket.id);
        if *self.fail_saves.read().await {
            return Err(TranscriptError::Io {
                path: pointer.into(),
                source: std::io::Error::other("simulated write failure"),
            });
        }
        self.transcripts
            .write()
            .await
            .insert(pointer.clone(), rendered.to_string());
        Ok(pointer)
    }

    async fn load(&self, pointer: &str) -> Result<String, TranscriptError> {
        self.get(pointer)
            .await
            .ok_or_else(|| TranscriptError::NotFound(pointer.to_string()))
    }
}
