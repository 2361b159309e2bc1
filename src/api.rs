//! Completion-backed operations
//!
//! Each function here is a single request/response round-trip against a
//! `CompletionBackend`. Session bookkeeping stays in `session`; this module only
//! assembles prompts, makes the call and shapes the reply.

use crate::config::ConnectionConfig;
use crate::core::{
    AppError, ChatMessage, CompletionBackend, CompletionClient, Result, SamplingParams,
};
use crate::prompts::{self, CanvasKind};
use crate::session::UploadedDocument;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name offered for download of any generated document.
pub const ARTIFACT_FILE_NAME: &str = "business_plan.html";
pub const ARTIFACT_MIME: &str = "text/html";

const CONNECTION_TEST_PROMPT: &str = "Hello, this is a connection test.";

/// A self-contained HTML document produced by one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedArtifact {
    pub kind: CanvasKind,
    pub html: String,
}

impl GeneratedArtifact {
    pub fn file_name(&self) -> &'static str {
        ARTIFACT_FILE_NAME
    }

    pub fn mime(&self) -> &'static str {
        ARTIFACT_MIME
    }

    /// Write the document into `dir`, returning the full path.
    pub async fn save_to(&self, dir: impl AsRef<Path>) -> std::io::Result<PathBuf> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(self.file_name());
        tokio::fs::write(&path, &self.html).await?;
        tracing::info!("[Generator] Saved {} to {}", self.kind.title(), path.display());
        Ok(path)
    }
}

/// Generate one HTML document of `kind` from the given documents.
pub async fn generate_canvas(
    backend: &dyn CompletionBackend,
    kind: CanvasKind,
    documents: &[UploadedDocument],
) -> Result<GeneratedArtifact> {
    let messages = prompts::build(kind, documents);
    tracing::info!(
        "[Generator] Generating {} from {} documents",
        kind.title(),
        documents.len()
    );

    let raw = backend.chat(&messages, kind.sampling()).await?;
    let html = prompts::strip_code_fence(&raw);

    tracing::info!("[Generator] {} ready ({} bytes)", kind.title(), html.len());
    Ok(GeneratedArtifact { kind, html })
}

/// Answer one question about the given documents.
pub async fn ask_documents(
    backend: &dyn CompletionBackend,
    documents: &[UploadedDocument],
    question: &str,
    params: SamplingParams,
) -> Result<String> {
    let messages: Vec<ChatMessage> = prompts::build_chat(documents, question);
    backend.chat(&messages, params).await
}

/// Make one tiny completion call with `config` to prove it works.
///
/// Uses a throw-away client, so the session's cached handle is left alone.
pub async fn test_connection(config: &ConnectionConfig, timeout: Duration) -> Result<()> {
    if !config.is_complete() {
        return Err(AppError::NotConfigured(
            "endpoint, API key and deployment name are all required".to_string(),
        ));
    }

    let client = CompletionClient::new(config.clone(), timeout)?;
    let reply = client
        .chat(
            &[ChatMessage::user(CONNECTION_TEST_PROMPT)],
            SamplingParams::new(0.1, 10),
        )
        .await?;

    if reply.trim().is_empty() {
        return Err(AppError::Request("No response received".to_string()));
    }
    Ok(())
}
