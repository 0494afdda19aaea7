//! Turns raw screenshot bytes into searchable documents.
//!
//! Each image goes through: upload checks, decode, OCR, an optional vision
//! description and text combination. Vision problems degrade to OCR-only
//! text; decode and OCR problems fail the image.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use image::GenericImageView;
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    documents::{document_id, Document},
    images::{self, UploadError},
    ocr::{OcrError, TextRecognizer},
    semantic::{combine_text, normalize_ocr_text},
    vision::VisionDescriber,
};

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("{0}")]
    Upload(#[from] UploadError),

    #[error("image could not be decoded: {0}")]
    Decode(#[from] image::ImageError),

    #[error("text recognition failed: {0}")]
    Ocr(#[from] OcrError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    /// OCR plus vision descriptions
    Enhanced,
    OcrOnly,
}

/// A document plus its WebP thumbnail.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub document: Document,
    pub thumbnail: Vec<u8>,
}

/// Knobs the processor reads from `Config`.
#[derive(Debug, Clone)]
struct ProcessorSettings {
    accepted_formats: Vec<String>,
    max_upload_bytes: usize,
    vision_max_dimension: u32,
    thumbnail_dimension: u32,
    thumbnail_quality: u8,
}

impl From<&Config> for ProcessorSettings {
    fn from(config: &Config) -> Self {
        Self {
            accepted_formats: config.upload.accepted_formats.clone(),
            max_upload_bytes: config.upload.max_upload_bytes(),
            vision_max_dimension: config.vision.max_image_dimension,
            thumbnail_dimension: config.thumbnails.max_dimension,
            thumbnail_quality: config.thumbnails.quality,
        }
    }
}

pub struct ScreenshotProcessor {
    settings: ProcessorSettings,
    recognizer: Box<dyn TextRecognizer>,
    describer: Option<Box<dyn VisionDescriber>>,
    /// image content hash -> description
    vision_cache: Mutex<HashMap<String, String>>,
}

impl ScreenshotProcessor {
    pub fn new(
        config: &Config,
        recognizer: Box<dyn TextRecognizer>,
        describer: Option<Box<dyn VisionDescriber>>,
    ) -> Self {
        Self {
            settings: config.into(),
            recognizer,
            describer,
            vision_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn mode(&self) -> ProcessingMode {
        if self.describer.is_some() {
            ProcessingMode::Enhanced
        } else {
            ProcessingMode::OcrOnly
        }
    }

    /// Swap the vision backend, e.g. after the API key changed.
    /// Cached descriptions stay valid: they depend on the image only.
    pub fn set_describer(&mut self, describer: Option<Box<dyn VisionDescriber>>) {
        self.describer = describer;
    }

    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.vision_cache.lock() {
            cache.clear();
        }
    }

    /// Process one image. `source` identifies it for deduplication.
    pub fn process(
        &self,
        source: &str,
        filename: &str,
        data: &[u8],
    ) -> Result<ProcessedImage, ProcessError> {
        let format = images::check_upload(
            filename,
            data,
            &self.settings.accepted_formats,
            self.settings.max_upload_bytes,
        )?;

        let img = image::load_from_memory_with_format(data, format)?;
        let (width, height) = img.dimensions();

        let ocr_text = normalize_ocr_text(&self.recognizer.recognize(&img)?);
        let vision_description = self.describe(data, &img, filename);
        let combined_text = combine_text(&ocr_text, vision_description.as_deref());

        log::info!(
            "processed {filename}: ocr={} chars, vision={}",
            ocr_text.len(),
            vision_description.is_some()
        );

        let thumbnail = images::thumbnail(
            &img,
            self.settings.thumbnail_dimension,
            self.settings.thumbnail_quality,
        );

        Ok(ProcessedImage {
            document: Document {
                id: document_id(source),
                filename: filename.to_string(),
                source: source.to_string(),
                ocr_text,
                vision_description,
                combined_text,
                width,
                height,
                created_at: Utc::now(),
            },
            thumbnail,
        })
    }

    /// Vision description, from cache when possible. Failures yield `None`.
    fn describe(&self, data: &[u8], img: &image::DynamicImage, filename: &str) -> Option<String> {
        let describer = self.describer.as_ref()?;

        let hash = images::content_hash(data);
        if let Some(cached) = self.vision_cache.lock().ok()?.get(&hash) {
            log::debug!("vision cache hit for {filename}");
            return Some(cached.clone());
        }

        let png = match images::optimize_for_vision(img, self.settings.vision_max_dimension) {
            Ok(png) => png,
            Err(err) => {
                log::warn!("could not prepare {filename} for vision: {err:#}");
                return None;
            }
        };

        match describer.describe(&png) {
            Ok(description) => {
                if let Ok(mut cache) = self.vision_cache.lock() {
                    cache.insert(hash, description.clone());
                }
                Some(description)
            }
            Err(err) => {
                log::warn!(
                    "{} vision failed for {filename}, falling back to ocr only: {err}",
                    describer.name()
                );
                None
            }
        }
    }
}
