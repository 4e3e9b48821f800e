//! Transcript storage.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::ticket::Ticket;

/// Errors that can occur while storing or reading transcripts.
#[derive(Debug, Error)]
pub enum TranscriptError {
    /// The pointer does not name a transcript inside the store.
    #[error("Invalid transcript pointer: {0}")]
    InvalidPointer(String),

    /// No transcript stored under this pointer.
    #[error("Transcript not found: {0}")]
    NotFound(String),

    #[error("Transcript I/O failed at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Durable storage for rendered transcripts.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Store the transcript of `ticket` and return a pointer to it.
    ///
    /// Saving again for the same ticket overwrites the previous copy.
    async fn save(&self, ticket: &Ticket, rendered: &str) -> Result<String, TranscriptError>;

    /// Read back a transcript by pointer.
    async fn load(&self, pointer: &str) -> Result<String, TranscriptError>;
}

/// Stores transcripts as text files under `<root>/<guild>/<ticket>.txt`.
#[derive(Debug, Clone)]
pub struct FsTranscriptStore {
    root: PathBuf,
}

impl FsTranscriptStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn pointer_for(ticket: &Ticket) -> String {
        format!("{}/{}.txt", ticket.id.guild_id, ticket.id)
    }

    /// Resolve a pointer to a path, refusing anything that could escape the root.
    fn resolve(&self, pointer: &str) -> Result<PathBuf, TranscriptError> {
        let relative = Path::new(pointer);
        let is_plain = !pointer.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !is_plain {
            return Err(TranscriptError::InvalidPointer(pointer.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl TranscriptStore for FsTranscriptStore {
    async fn save(&self, ticket: &Ticket, rendered: &str) -> Result<String, TranscriptError> {
        let pointer = Self::pointer_for(ticket);
        let path = self.resolve(&pointer)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| TranscriptError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        // Write to a temporary file first so a crash never leaves a truncated transcript.
        let tmp_path = path.with_extension("txt.tmp");
        tokio::fs::write(&tmp_path, rendered)
            .await
            .map_err(|source| TranscriptError::Io {
                path: tmp_path.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|source| TranscriptError::Io {
                path: path.clone(),
                source,
            })?;

        debug!(ticket_id = %ticket.id, path = %path.display(), bytes = rendered.len(), "Saved transcript");
        Ok(pointer)
    }

    async fn load(&self, pointer: &str) -> Result<String, TranscriptError> {
        let path = self.resolve(pointer)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(TranscriptError::NotFound(pointer.to_string()))
            }
            Err(source) => Err(TranscriptError::Io { path, source }),
        }
    }
}
