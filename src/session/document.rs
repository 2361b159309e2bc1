use crate::core::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Text extracted from one upload. Never mutated after ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedDocument {
    name: String,
    text: String,
    size_bytes: u64,
}

impl UploadedDocument {
    pub fn new(name: impl Into<String>, text: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            size_bytes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Size of the original upload, not of the extracted text.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Documents keyed by filename, in upload order, plus the names the user removed.
///
/// Tombstones are never cleared: a removed name stays rejected for the rest of the session.
#[derive(Debug, Default, Clone)]
pub struct DocumentStore {
    documents: Vec<UploadedDocument>,
    tombstones: BTreeSet<String>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn documents(&self) -> &[UploadedDocument] {
        &self.documents
    }

    pub fn get(&self, name: &str) -> Option<&UploadedDocument> {
        self.documents.iter().find(|doc| doc.name == name)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn is_tombstoned(&self, name: &str) -> bool {
        self.tombstones.contains(name)
    }

    pub fn tombstones(&self) -> impl Iterator<Item = &str> {
        self.tombstones.iter().map(String::as_str)
    }

    /// Insert or replace a document. Tombstoned names are refused and leave the store untouched.
    pub fn add(&mut self, document: UploadedDocument) -> Result<()> {
        if self.is_tombstoned(&document.name) {
            return Err(AppError::Tombstoned(document.name));
        }
        match self.documents.iter_mut().find(|doc| doc.name == document.name) {
            Some(existing) => *existing = document,
            None => self.documents.push(document),
        }
        Ok(())
    }

    /// Tombstone `name` and drop it if present. Returns whether a document was dropped.
    pub fn remove(&mut self, name: &str) -> bool {
        self.tombstones.insert(name.to_string());
        let before = self.documents.len();
        self.documents.retain(|doc| doc.name != name);
        before != self.documents.len()
    }

    /// Tombstone every current name and empty the store. Returns how many were dropped.
    pub fn clear_all(&mut self) -> usize {
        let removed = self.documents.len();
        self.tombstones
            .extend(self.documents.drain(..).map(|doc| doc.name));
        removed
    }
}
