//! Session - per-user state for one interactive usage span
//!
//! Information Hiding:
//! - Document map and tombstones hidden behind add/remove/clear operations
//! - Completion client built lazily and dropped whenever the connection changes
//! - Nothing here outlives the session; there is no persistence

mod document;

pub use document::{DocumentStore, UploadedDocument};

use crate::api::{self, GeneratedArtifact};
use crate::config::{ConnectionConfig, Settings};
use crate::core::{AppError, ChatMessage, CompletionClient, Result, SamplingParams};
use crate::ingest::Ingestor;
use crate::prompts::CanvasKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Which screen of the tool the user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    #[default]
    FileUpload,
    Chat,
    Generation,
    Settings,
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Page::FileUpload => "File Upload",
            Page::Chat => "AI Chat",
            Page::Generation => "AI Generation",
            Page::Settings => "Settings",
        };
        f.write_str(name)
    }
}

impl FromStr for Page {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upload" | "files" | "file_upload" => Ok(Page::FileUpload),
            "chat" => Ok(Page::Chat),
            "generate" | "generation" => Ok(Page::Generation),
            "settings" | "config" => Ok(Page::Settings),
            other => Err(format!("unknown page '{}'", other)),
        }
    }
}

/// Progress of the generation feature.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GenerationState {
    #[default]
    Idle,
    Requesting,
    Succeeded,
    Failed(String),
}

/// What happened to one file of an upload batch.
#[derive(Debug)]
pub enum IngestOutcome {
    Added,
    SkippedTombstoned,
    Rejected(AppError),
}

impl IngestOutcome {
    pub fn is_added(&self) -> bool {
        matches!(self, IngestOutcome::Added)
    }
}

pub struct Session {
    settings: Settings,
    ingestor: Ingestor,
    store: DocumentStore,
    transcript: Vec<ChatMessage>,
    connection: ConnectionConfig,
    client: Option<Arc<CompletionClient>>,
    page: Page,
    generation: GenerationState,
}

impl Session {
    /// Start a session seeded with the configured connection.
    pub fn new(settings: Settings) -> Self {
        let ingestor = Ingestor::new(settings.ingest.max_file_bytes);
        Self::with_ingestor(settings, ingestor)
    }

    pub fn with_ingestor(settings: Settings, ingestor: Ingestor) -> Self {
        let connection = settings.initial_connection();
        Self {
            settings,
            ingestor,
            store: DocumentStore::new(),
            transcript: Vec::new(),
            connection,
            client: None,
            page: Page::default(),
            generation: GenerationState::default(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // ---- documents -------------------------------------------------------

    pub fn documents(&self) -> &[UploadedDocument] {
        self.store.documents()
    }

    pub fn document(&self, name: &str) -> Option<&UploadedDocument> {
        self.store.get(name)
    }

    pub fn tombstones(&self) -> Vec<&str> {
        self.store.tombstones().collect()
    }

    pub fn add_document(&mut self, name: &str, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        let size = text.len() as u64;
        self.store.add(UploadedDocument::new(name, text, size))
    }

    pub fn remove_document(&mut self, name: &str) -> bool {
        let removed = self.store.remove(name);
        tracing::debug!("[Session] Removed {} (was present: {})", name, removed);
        removed
    }

    pub fn clear_all(&mut self) -> usize {
        let removed = self.store.clear_all();
        tracing::debug!("[Session] Cleared {} documents", removed);
        removed
    }

    /// Ingest one upload. Tombstoned names are skipped before any conversion work.
    pub fn ingest_file(&mut self, name: &str, bytes: &[u8]) -> IngestOutcome {
        if self.store.is_tombstoned(name) {
            tracing::debug!("[Session] Skipping {}: removed earlier in this session", name);
            return IngestOutcome::SkippedTombstoned;
        }

        let text = match self.ingestor.ingest(name, bytes) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("[Session] {}", e);
                return IngestOutcome::Rejected(e);
            }
        };

        match self
            .store
            .add(UploadedDocument::new(name, text, bytes.len() as u64))
        {
            Ok(()) => IngestOutcome::Added,
            Err(e) => IngestOutcome::Rejected(e),
        }
    }

    /// Ingest every file independently; one failure never stops the rest.
    pub fn ingest_batch<I, N, B>(&mut self, files: I) -> Vec<(String, IngestOutcome)>
    where
        I: IntoIterator<Item = (N, B)>,
        N: Into<String>,
        B: AsRef<[u8]>,
    {
        files
            .into_iter()
            .map(|(name, bytes)| {
                let name = name.into();
                let outcome = self.ingest_file(&name, bytes.as_ref());
                (name, outcome)
            })
            .collect()
    }

    // ---- connection ------------------------------------------------------

    pub fn connection(&self) -> &ConnectionConfig {
        &self.connection
    }

    /// Replace the connection wholesale and drop the cached client.
    pub fn save_connection(&mut self, config: ConnectionConfig) {
        tracing::info!("[Session] Connection settings saved: {:?}", config);
        self.connection = config;
        self.client = None;
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.http.timeout_secs)
    }

    /// The session's client, built on first use from the current connection.
    pub fn client(&mut self) -> Result<Arc<CompletionClient>> {
        if let Some(client) = &self.client {
            return Ok(Arc::clone(client));
        }
        let client = Arc::new(CompletionClient::new(
            self.connection.clone(),
            self.http_timeout(),
        )?);
        self.client = Some(Arc::clone(&client));
        Ok(client)
    }

    /// Client that is ready for a completion call, deployment included.
    fn ready_client(&mut self) -> Result<Arc<CompletionClient>> {
        let client = self.client()?;
        if self.connection.deployment.trim().is_empty() {
            return Err(AppError::NotConfigured("deployment name is not set".to_string()));
        }
        Ok(client)
    }

    pub async fn test_connection(&self) -> Result<()> {
        api::test_connection(&self.connection, self.http_timeout()).await
    }

    // ---- chat ------------------------------------------------------------

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn append_message(&mut self, message: ChatMessage) {
        self.transcript.push(message);
    }

    /// Ask a question about the uploaded documents.
    ///
    /// The question and answer are appended only when the call succeeds.
    pub async fn ask(&mut self, question: &str) -> Result<String> {
        if self.store.is_empty() {
            return Err(AppError::NoDocuments);
        }
        let client = self.ready_client()?;
        let params = SamplingParams::new(
            self.settings.chat.temperature,
            self.settings.chat.max_tokens,
        );

        let answer =
            api::ask_documents(&*client, self.store.documents(), question, params).await?;

        self.transcript.push(ChatMessage::user(question));
        self.transcript.push(ChatMessage::assistant(answer.clone()));
        Ok(answer)
    }

    // ---- generation ------------------------------------------------------

    pub fn generation_state(&self) -> &GenerationState {
        &self.generation
    }

    pub async fn generate(&mut self, kind: CanvasKind) -> Result<GeneratedArtifact> {
        let client = self.ready_client()?;

        self.generation = GenerationState::Requesting;
        let result = api::generate_canvas(&*client, kind, self.store.documents()).await;
        self.generation = match &result {
            Ok(_) => GenerationState::Succeeded,
            Err(e) => {
                tracing::warn!("[Session] Generation failed: {}", e);
                GenerationState::Failed(e.to_string())
            }
        };
        result
    }

    // ---- navigation ------------------------------------------------------

    pub fn current_page(&self) -> Page {
        self.page
    }

    pub fn set_page(&mut self, page: Page) {
        self.page = page;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session() -> Session {
        Session::with_ingestor(Settings::default(), Ingestor::new(1024))
    }

    async fn server_replying(content: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": content}}]
            })))
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn test_batch_isolates_failures() {
        let mut session = session();
        let results = session.ingest_batch(vec![
            ("big.txt", vec![b'x'; 2048]),
            ("bad.exe", b"MZ".to_vec()),
            ("ok.txt", b"fine".to_vec()),
        ]);

        assert!(matches!(results[0].1, IngestOutcome::Rejected(AppError::SizeLimitExceeded { .. })));
        assert!(matches!(results[1].1, IngestOutcome::Rejected(AppError::Conversion { .. })));
        assert!(results[2].1.is_added());
        assert_eq!(session.documents().len(), 1);
        assert_eq!(session.documents()[0].name(), "ok.txt");
    }

    /// Panics on files whose content is `boom`, converts everything else verbatim.
    struct BoomConverter;

    impl crate::ingest::DocumentConverter for BoomConverter {
        fn convert(&self, path: &std::path::Path) -> anyhow::Result<String> {
            let text = std::fs::read_to_string(path)?;
            if text == "boom" {
                panic!("malformed cross-reference table");
            }
            Ok(text)
        }
    }

    #[test]
    fn test_batch_continues_after_converter_panic() {
        let mut session =
            Session::with_ingestor(Settings::default(), Ingestor::with_converter(BoomConverter, 1024));
        let results = session.ingest_batch(vec![
            ("first.txt", b"one".to_vec()),
            ("bad.pdf", b"boom".to_vec()),
            ("after.txt", b"two".to_vec()),
        ]);

        assert!(results[0].1.is_added());
        match &results[1].1 {
            IngestOutcome::Rejected(AppError::Conversion { name, message }) => {
                assert_eq!(name, "bad.pdf");
                assert!(message.contains("malformed cross-reference table"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(results[2].1.is_added());

        let names: Vec<_> = session.documents().iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["first.txt", "after.txt"]);
        assert!(session.ingest_file("later.txt", b"three").is_added());
    }

    #[test]
    fn test_reupload_after_remove_is_skipped() {
        let mut session = session();
        assert!(session.ingest_file("report.txt", b"Q3 numbers").is_added());
        assert!(session.remove_document("report.txt"));

        let outcome = session.ingest_file("report.txt", b"Q3 numbers");
        assert!(matches!(outcome, IngestOutcome::SkippedTombstoned));
        assert!(session.documents().is_empty());
        assert_eq!(session.tombstones(), vec!["report.txt"]);
    }

    #[test]
    fn test_client_is_not_configured_without_credentials() {
        let mut session = session();
        assert!(matches!(session.client(), Err(AppError::NotConfigured(_))));
        assert!(!session.has_client());
    }

    #[test]
    fn test_saving_connection_invalidates_client() {
        let mut session = session();
        session.save_connection(ConnectionConfig::new("https://a.example", "key", "gpt-4o"));
        let first = session.client().unwrap();
        let again = session.client().unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        session.save_connection(ConnectionConfig::new("https://b.example", "key", "gpt-4o"));
        assert!(!session.has_client());
        let rebuilt = session.client().unwrap();
        assert_eq!(rebuilt.config().endpoint, "https://b.example");
    }

    #[tokio::test]
    async fn test_ask_requires_documents_then_deployment() {
        let mut session = session();
        session.save_connection(ConnectionConfig::new("https://a.example", "key", ""));
        assert!(matches!(session.ask("hi").await, Err(AppError::NoDocuments)));

        session.add_document("a.txt", "hello").unwrap();
        assert!(matches!(session.ask("hi").await, Err(AppError::NotConfigured(_))));
        assert!(session.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_ask_appends_to_transcript_on_success() {
        let server = server_replying("It says hello.").await;
        let mut session = session();
        session.save_connection(ConnectionConfig::new(server.uri(), "key", "gpt-4o"));
        session.add_document("a.txt", "hello").unwrap();

        let answer = session.ask("What does a.txt say?").await.unwrap();
        assert_eq!(answer, "It says hello.");
        assert_eq!(
            session.transcript(),
            &[
                ChatMessage::user("What does a.txt say?"),
                ChatMessage::assistant("It says hello."),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_ask_leaves_transcript_untouched() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let mut session = session();
        session.save_connection(ConnectionConfig::new(server.uri(), "key", "gpt-4o"));
        session.add_document("a.txt", "hello").unwrap();

        assert!(matches!(session.ask("hi").await, Err(AppError::Request(_))));
        assert!(session.transcript().is_empty());
        assert_eq!(session.documents().len(), 1);
    }

    #[tokio::test]
    async fn test_generation_state_transitions() {
        let server = server_replying("```html\n<html>ok</html>\n```").await;
        let mut session = session();
        assert_eq!(session.generation_state(), &GenerationState::Idle);

        session.save_connection(ConnectionConfig::new(server.uri(), "key", "gpt-4o"));
        let artifact = session.generate(CanvasKind::ValueProposition).await.unwrap();
        assert_eq!(artifact.html, "<html>ok</html>");
        assert_eq!(session.generation_state(), &GenerationState::Succeeded);

        session.save_connection(ConnectionConfig::new("http://127.0.0.1:9", "key", "gpt-4o"));
        assert!(session.generate(CanvasKind::PitchSlide).await.is_err());
        assert!(matches!(session.generation_state(), GenerationState::Failed(_)));
    }

    #[test]
    fn test_page_defaults_to_upload_and_parses() {
        let mut session = session();
        assert_eq!(session.current_page(), Page::FileUpload);
        session.set_page("settings".parse().unwrap());
        assert_eq!(session.current_page(), Page::Settings);
        assert!("nowhere".parse::<Page>().is_err());
    }
}
