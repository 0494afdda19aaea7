use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::RwLock;

use crate::semantic::preview;

/// One processed screenshot. Built once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub filename: String,
    /// Where the image came from: upload name or sample file path
    pub source: String,

    pub ocr_text: String,
    pub vision_description: Option<String>,
    /// Text that is embedded and searched
    pub combined_text: String,

    pub width: u32,
    pub height: u32,
    pub created_at: DateTime<Utc>,
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// Stable document id derived from the image source.
pub fn document_id(source: &str) -> String {
    let digest = Sha256::digest(source.as_bytes());
    digest.iter().take(16).map(|b| format!("{b:02x}")).collect()
}

/// Preview view of a document exposed to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub id: String,
    pub filename: String,
    pub source: String,
    pub ocr_text_preview: String,
    pub vision_preview: String,
    pub has_ocr: bool,
    pub has_vision: bool,
    pub width: u32,
    pub height: u32,
    pub created_at: DateTime<Utc>,
}

impl DocumentMetadata {
    pub fn from_document(doc: &Document, preview_chars: usize) -> Self {
        Self {
            id: doc.id.clone(),
            filename: doc.filename.clone(),
            source: doc.source.clone(),
            ocr_text_preview: preview(&doc.ocr_text, preview_chars),
            vision_preview: doc
                .vision_description
                .as_deref()
                .map(|v| preview(v, preview_chars))
                .unwrap_or_default(),
            has_ocr: !doc.ocr_text.trim().is_empty(),
            has_vision: doc.vision_description.is_some(),
            width: doc.width,
            height: doc.height,
            created_at: doc.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn from_score(score: f32) -> Self {
        if score > 0.7 {
            Confidence::High
        } else if score > 0.4 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub document_id: String,
    pub filename: String,
    pub score: f32,
    pub confidence: Confidence,
    /// Start of the OCR text
    pub snippet: String,
    pub vision_snippet: String,
    pub thumbnail_url: String,
}

impl SearchResult {
    pub fn new(doc: &Document, score: f32, snippet_chars: usize) -> Self {
        Self {
            document_id: doc.id.clone(),
            filename: doc.filename.clone(),
            score,
            confidence: Confidence::from_score(score),
            snippet: preview(&doc.ocr_text, snippet_chars),
            vision_snippet: doc
                .vision_description
                .as_deref()
                .map(|v| preview(v, snippet_chars))
                .unwrap_or_default(),
            thumbnail_url: thumbnail_url(&doc.id),
        }
    }
}

pub fn thumbnail_url(id: &str) -> String {
    format!("/api/documents/{id}/thumbnail")
}

/// Session document list, kept in insertion order.
#[derive(Default)]
pub struct DocumentStore {
    docs: RwLock<Vec<Document>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if a document with the same id is already stored.
    pub fn insert(&self, doc: Document) -> bool {
        let mut docs = self.docs.write().unwrap();
        if docs.iter().any(|d| d.id == doc.id) {
            return false;
        }
        docs.push(doc);
        true
    }

    pub fn get(&self, id: &str) -> Option<Document> {
        self.docs.read().unwrap().iter().find(|d| d.id == id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.docs.read().unwrap().iter().any(|d| d.id == id)
    }

    pub fn list(&self) -> Vec<Document> {
        self.docs.read().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.docs.read().unwrap().len()
    }

    pub fn clear(&self) {
        self.docs.write().unwrap().clear();
    }
}
