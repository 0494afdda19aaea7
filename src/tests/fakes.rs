//! Deterministic stand-ins for the OCR binary, the vision API and the
//! embedding model.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use image::{DynamicImage, GenericImageView};

use crate::documents::{document_id, Document};
use crate::ocr::{OcrError, TextRecognizer};
use crate::semantic::{combine_text, Embedder, EmbeddingError};
use crate::vision::{VisionDescriber, VisionError};

pub fn doc(source: &str, ocr: &str, vision: Option<&str>) -> Document {
    Document {
        id: document_id(source),
        filename: source.rsplit('/').next().unwrap_or(source).to_string(),
        source: source.to_string(),
        ocr_text: ocr.to_string(),
        vision_description: vision.map(str::to_owned),
        combined_text: combine_text(ocr, vision),
        width: 10,
        height: 10,
        created_at: Utc::now(),
    }
}

/// Bag-of-words vectors: every lowercase alphanumeric token adds 1.0 to a
/// hashed bucket. Text without tokens embeds to the zero vector.
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0; self.dims];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            v[(hasher.finish() as usize) % self.dims] += 1.0;
        }
        v
    }
}

impl Embedder for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing-test"
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.vector(text))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

/// Returns text chosen by image width, or a default.
pub struct FixedOcr {
    default: String,
    by_width: HashMap<u32, String>,
}

impl FixedOcr {
    pub fn new(default: &str) -> Self {
        Self {
            default: default.to_string(),
            by_width: HashMap::new(),
        }
    }

    pub fn with(mut self, width: u32, text: &str) -> Self {
        self.by_width.insert(width, text.to_string());
        self
    }
}

impl TextRecognizer for FixedOcr {
    fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError> {
        let (width, _) = image.dimensions();
        Ok(self
            .by_width
            .get(&width)
            .cloned()
            .unwrap_or_else(|| self.default.clone()))
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

pub struct FailingOcr;

impl TextRecognizer for FailingOcr {
    fn recognize(&self, _image: &DynamicImage) -> Result<String, OcrError> {
        Err(OcrError::Failed("engine crashed".into()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Always returns the same description and counts calls.
pub struct CountingDescriber {
    description: String,
    calls: Arc<AtomicUsize>,
}

impl CountingDescriber {
    pub fn new(description: &str, calls: Arc<AtomicUsize>) -> Self {
        Self {
            description: description.to_string(),
            calls,
        }
    }
}

impl VisionDescriber for CountingDescriber {
    fn describe(&self, _png: &[u8]) -> Result<String, VisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.description.clone())
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

pub struct FailingDescriber;

impl VisionDescriber for FailingDescriber {
    fn describe(&self, _png: &[u8]) -> Result<String, VisionError> {
        Err(VisionError::Api {
            status: 401,
            message: "invalid x-api-key".into(),
        })
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

pub struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn name(&self) -> &str {
        "failing"
    }

    fn dimensions(&self) -> usize {
        8
    }

    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::EmbeddingFailed("onnx session crashed".into()))
    }

    fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::EmbeddingFailed("onnx session crashed".into()))
    }
}
