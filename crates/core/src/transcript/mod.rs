//! Ticket transcripts: rendering channel history and storing the result.

mod html;
mod render;
mod store;

pub use html::{html_escape, render_html_transcript};
pub use render::render_transcript;
pub use store::{FsTranscriptStore, TranscriptError, TranscriptStore};
