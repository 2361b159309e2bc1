//! Indie Canvas - chat with business documents and generate HTML canvases
//!
//! Uploaded files are converted to text and kept in a per-user `Session`.
//! That text becomes the context for document chat and for the templated
//! generation calls that produce business canvases, plans and pitch slides.

pub mod api;
pub mod cli;
mod config;
pub mod core;
pub mod ingest;
pub mod prompts;
pub mod session;
pub mod utils;

pub use crate::api::{GeneratedArtifact, ARTIFACT_FILE_NAME, ARTIFACT_MIME};
pub use crate::config::{ConnectionConfig, Settings, DEFAULT_API_VERSION, DEFAULT_MAX_FILE_BYTES};
pub use crate::core::{AppError, ChatMessage, CompletionBackend, CompletionClient, Result, Role, SamplingParams};
pub use crate::ingest::{DocumentConverter, Ingestor, MarkdownConverter};
pub use crate::prompts::CanvasKind;
pub use crate::session::{GenerationState, IngestOutcome, Page, Session, UploadedDocument};
