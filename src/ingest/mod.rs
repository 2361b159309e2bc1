//! Document Ingestion
//!
//! Information Hiding:
//! - Conversion library hidden behind the `DocumentConverter` trait
//! - Scratch files are created and removed here, callers only see text
//! - Library failures are normalised into `AppError::Conversion`

pub mod extract;

pub use extract::{MarkdownConverter, SUPPORTED_EXTENSIONS};

use crate::config::DEFAULT_MAX_FILE_BYTES;
use crate::core::{AppError, Result};
use std::any::Any;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

/// External file-to-text capability.
///
/// Receives the path of a scratch copy of the upload that keeps the original extension.
pub trait DocumentConverter: Send + Sync {
    fn convert(&self, path: &Path) -> anyhow::Result<String>;
}

/// Size gate and scratch-file handling in front of a converter.
pub struct Ingestor {
    converter: Box<dyn DocumentConverter>,
    max_file_bytes: u64,
}

impl Ingestor {
    pub fn new(max_file_bytes: u64) -> Self {
        Self::with_converter(MarkdownConverter::new(), max_file_bytes)
    }

    pub fn with_converter(converter: impl DocumentConverter + 'static, max_file_bytes: u64) -> Self {
        Self {
            converter: Box::new(converter),
            max_file_bytes,
        }
    }

    pub fn max_file_bytes(&self) -> u64 {
        self.max_file_bytes
    }

    /// Reject uploads above the admission limit without touching the converter.
    pub fn check_size(&self, filename: &str, size: u64) -> Result<()> {
        if size > self.max_file_bytes {
            return Err(AppError::SizeLimitExceeded {
                name: filename.to_string(),
                size,
                limit: self.max_file_bytes,
            });
        }
        Ok(())
    }

    /// Convert one upload to text.
    ///
    /// The scratch file is removed when this returns, whether conversion worked or not.
    pub fn ingest(&self, filename: &str, bytes: &[u8]) -> Result<String> {
        self.check_size(filename, bytes.len() as u64)?;

        let suffix = scratch_suffix(filename);
        let mut scratch = tempfile::Builder::new()
            .prefix("indie-upload-")
            .suffix(&suffix)
            .tempfile()
            .map_err(|e| AppError::conversion(filename, format!("failed to create scratch file: {}", e)))?;

        scratch
            .write_all(bytes)
            .and_then(|_| scratch.flush())
            .map_err(|e| AppError::conversion(filename, format!("failed to write scratch file: {}", e)))?;

        tracing::debug!(
            "[Ingestor] Converting {} ({} bytes) via {}",
            filename,
            bytes.len(),
            scratch.path().display()
        );

        let converted = panic::catch_unwind(AssertUnwindSafe(|| self.converter.convert(scratch.path())))
            .unwrap_or_else(|payload| {
                Err(anyhow::anyhow!("converter panicked: {}", panic_message(&*payload)))
            });
        let text = converted.map_err(|e| AppError::conversion(filename, format!("{:#}", e)))?;

        tracing::info!("[Ingestor] Converted {} to {} characters", filename, text.chars().count());
        Ok(text)
    }
}

impl Default for Ingestor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_BYTES)
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Everything after the last dot, like the upload widget reports it.
fn scratch_suffix(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && !ext.contains(['/', '\\']) => format!(".{}", ext),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Records every path it was handed, then succeeds or fails as told.
    #[derive(Clone, Default)]
    struct RecordingConverter {
        seen: Arc<Mutex<Vec<PathBuf>>>,
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl DocumentConverter for RecordingConverter {
        fn convert(&self, path: &Path) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(path.to_path_buf());
            if self.fail {
                anyhow::bail!("corrupt file");
            }
            Ok(std::fs::read_to_string(path)?)
        }
    }

    #[test]
    fn test_ingest_returns_converted_text() {
        let ingestor = Ingestor::default();
        let text = ingestor.ingest("notes.md", b"# Plan\nShip it").unwrap();
        assert_eq!(text, "# Plan\nShip it");
    }

    #[test]
    fn test_oversized_upload_never_reaches_converter() {
        let converter = RecordingConverter::default();
        let ingestor = Ingestor::with_converter(converter.clone(), 16);

        let err = ingestor.ingest("huge.csv", &[b'a'; 17]).unwrap_err();
        assert!(matches!(err, AppError::SizeLimitExceeded { size: 17, limit: 16, .. }));
        assert_eq!(converter.calls.load(Ordering::SeqCst), 0);

        assert!(ingestor.ingest("edge.csv", &[b'a'; 16]).is_ok());
    }

    #[test]
    fn test_default_limit_is_ten_megabytes() {
        let ingestor = Ingestor::default();
        assert!(ingestor.check_size("a.pdf", 10_485_760).is_ok());
        assert!(ingestor.check_size("a.pdf", 10_485_761).is_err());
    }

    #[test]
    fn test_scratch_file_keeps_extension_and_is_removed() {
        let converter = RecordingConverter::default();
        let ingestor = Ingestor::with_converter(converter.clone(), 1024);

        ingestor.ingest("report.final.txt", b"hello").unwrap();

        let seen = converter.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].extension().and_then(|e| e.to_str()), Some("txt"));
        assert!(!seen[0].exists());
    }

    #[test]
    fn test_conversion_failure_is_normalised_and_cleans_up() {
        let converter = RecordingConverter {
            fail: true,
            ..Default::default()
        };
        let ingestor = Ingestor::with_converter(converter.clone(), 1024);

        let err = ingestor.ingest("broken.docx", b"garbage").unwrap_err();
        match err {
            AppError::Conversion { name, message } => {
                assert_eq!(name, "broken.docx");
                assert!(message.contains("corrupt file"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let seen = converter.seen.lock().unwrap();
        assert!(!seen[0].exists());
    }

    /// Panics on every file, like a conversion library with an unchecked index.
    struct PanickingConverter;

    impl DocumentConverter for PanickingConverter {
        fn convert(&self, _path: &Path) -> anyhow::Result<String> {
            panic!("index out of bounds");
        }
    }

    #[test]
    fn test_converter_panic_becomes_conversion_error() {
        let ingestor = Ingestor::with_converter(PanickingConverter, 1024);

        let err = ingestor.ingest("deck.pptx", b"zip-ish").unwrap_err();
        match err {
            AppError::Conversion { name, message } => {
                assert_eq!(name, "deck.pptx");
                assert!(message.contains("converter panicked: index out of bounds"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(ingestor.ingest("again.txt", b"x").is_err());
    }

    #[test]
    fn test_panic_message_reads_str_and_string_payloads() {
        let from_str: Box<dyn Any + Send> = Box::new("plain");
        let from_string: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let other: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(&*from_str), "plain");
        assert_eq!(panic_message(&*from_string), "owned");
        assert_eq!(panic_message(&*other), "unknown panic");
    }

    #[test]
    fn test_scratch_suffix() {
        assert_eq!(scratch_suffix("deck.pptx"), ".pptx");
        assert_eq!(scratch_suffix("README"), "");
        assert_eq!(scratch_suffix("trailing."), "");
    }
}
