use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::{
    app::errors::AppError,
    config::Config,
    documents::{document_id, Document, DocumentMetadata, DocumentStore, SearchResult},
    images,
    ocr::{Tesseract, TextRecognizer},
    processor::{ProcessedImage, ProcessingMode, ScreenshotProcessor},
    semantic::SearchEngine,
    storage::{BackendMemory, StorageManager},
    vision::{describer_for_key, VisionDescriber},
};

/// One file handed to `Session::ingest`.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub data: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            data,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileError {
    pub filename: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub indexed: usize,
    pub documents: Vec<DocumentMetadata>,
    /// Files whose document already exists in this session
    pub skipped: Vec<String>,
    pub errors: Vec<FileError>,
    pub elapsed_secs: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeySource {
    Session,
    Environment,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_documents: usize,
    pub indexed_documents: usize,
    pub with_vision: usize,
    pub processing_time_secs: f64,
    pub mode: ProcessingMode,
    pub api_key: ApiKeySource,
    pub model_name: String,
    pub embedding_dimension: Option<usize>,
}

/// Everything one user works with: processed documents, their vectors and
/// thumbnails. Nothing outlives the process.
pub struct Session {
    config: Config,
    processor: RwLock<ScreenshotProcessor>,
    engine: SearchEngine,
    documents: DocumentStore,
    thumbnails: Box<dyn StorageManager>,
    processing_time: Mutex<Duration>,
    /// Key entered in the UI; takes precedence over the environment
    api_key: RwLock<Option<String>>,
}

impl Session {
    /// Session with tesseract OCR, the vision API if a key is in the
    /// environment, and a lazily loaded embedding model.
    pub fn new(config: Config) -> Self {
        let recognizer = Box::new(Tesseract::new(config.ocr.clone()));
        let describer = describer_for_key(&config.vision, config.vision.api_key_from_env());
        let engine = SearchEngine::new(config.search.clone(), config.base_path().clone());

        Self::new_with(config, recognizer, describer, engine)
    }

    pub fn new_with(
        config: Config,
        recognizer: Box<dyn TextRecognizer>,
        describer: Option<Box<dyn VisionDescriber>>,
        engine: SearchEngine,
    ) -> Self {
        log::info!(
            "session ready: ocr={} vision={}",
            recognizer.name(),
            describer.as_ref().map(|d| d.name()).unwrap_or("none")
        );

        Self {
            processor: RwLock::new(ScreenshotProcessor::new(&config, recognizer, describer)),
            config,
            engine,
            documents: DocumentStore::new(),
            thumbnails: Box::new(BackendMemory::new()),
            processing_time: Mutex::new(Duration::ZERO),
            api_key: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Process, index and store uploaded files.
    pub fn ingest(&self, uploads: Vec<Upload>) -> Result<BatchReport, AppError> {
        self.ingest_with_progress(uploads, |_, _, _| {})
    }

    /// Like `ingest`, calling `on_progress(done, total, filename)` after each file.
    pub fn ingest_with_progress<F>(
        &self,
        uploads: Vec<Upload>,
        on_progress: F,
    ) -> Result<BatchReport, AppError>
    where
        F: FnMut(usize, usize, &str),
    {
        self.check_batch_size(uploads.len())?;

        let items = uploads
            .into_iter()
            .map(|u| (format!("upload/{}", u.filename), u))
            .collect();

        self.ingest_sources(items, on_progress)
    }

    /// Like `ingest`, for a batch where some files were already rejected
    /// before reaching the session. They count towards the batch limit and
    /// are reported first in `errors`.
    pub fn ingest_with_rejected(
        &self,
        uploads: Vec<Upload>,
        mut rejected: Vec<FileError>,
    ) -> Result<BatchReport, AppError> {
        self.check_batch_size(uploads.len() + rejected.len())?;

        let items = uploads
            .into_iter()
            .map(|u| (format!("upload/{}", u.filename), u))
            .collect();

        let mut report = self.ingest_sources(items, |_, _, _| {})?;
        rejected.append(&mut report.errors);
        report.errors = rejected;
        Ok(report)
    }

    fn check_batch_size(&self, count: usize) -> Result<(), AppError> {
        if count == 0 {
            return Err(AppError::InvalidInput("no files provided".into()));
        }

        let limit = self.config.upload.max_files_per_batch;
        if count > limit {
            return Err(AppError::InvalidInput(format!(
                "{count} files uploaded, at most {limit} are allowed per batch"
            )));
        }

        Ok(())
    }

    /// Ingest every supported image in the configured samples directory.
    pub fn load_samples(&self) -> Result<BatchReport, AppError> {
        let dir = &self.config.samples_dir;
        if !dir.is_dir() {
            return Err(AppError::InvalidInput(format!(
                "samples directory {} does not exist, create it with `shotsearch generate-samples`",
                dir.display()
            )));
        }

        let paths = list_images(dir, &self.config.upload.accepted_formats)?;
        if paths.is_empty() {
            return Err(AppError::InvalidInput(format!(
                "no supported images in {}",
                dir.display()
            )));
        }

        log::info!("loading {} samples from {}", paths.len(), dir.display());
        self.ingest_paths(&paths, |_, _, _| {})
    }

    /// Ingest image files from disk. The file path is the document source.
    /// Unreadable files are reported per file.
    pub fn ingest_paths<F>(&self, paths: &[PathBuf], on_progress: F) -> Result<BatchReport, AppError>
    where
        F: FnMut(usize, usize, &str),
    {
        let mut items = Vec::with_capacity(paths.len());
        let mut unreadable = Vec::new();

        for path in paths {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());

            match std::fs::read(path) {
                Ok(data) => items.push((path.display().to_string(), Upload::new(filename, data))),
                Err(err) => {
                    log::warn!("failed to read {}: {err}", path.display());
                    unreadable.push(FileError {
                        filename,
                        error: err.to_string(),
                    });
                }
            }
        }

        let mut report = self.ingest_sources(items, on_progress)?;
        unreadable.append(&mut report.errors);
        report.errors = unreadable;
        Ok(report)
    }

    fn ingest_sources<F>(
        &self,
        items: Vec<(String, Upload)>,
        mut on_progress: F,
    ) -> Result<BatchReport, AppError>
    where
        F: FnMut(usize, usize, &str),
    {
        let started = Instant::now();
        let total = items.len();

        let mut processed: Vec<ProcessedImage> = Vec::new();
        let mut skipped = Vec::new();
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        {
            let processor = self
                .processor
                .read()
                .map_err(|_| anyhow::anyhow!("processor lock poisoned"))?;

            for (done, (source, upload)) in items.into_iter().enumerate() {
                let id = document_id(&source);

                if self.documents.contains(&id) || !seen.insert(id) {
                    log::info!("{} already processed, skipping", upload.filename);
                    skipped.push(upload.filename.clone());
                } else {
                    match processor.process(&source, &upload.filename, &upload.data) {
                        Ok(image) => processed.push(image),
                        Err(err) => {
                            log::warn!("failed to process {}: {err}", upload.filename);
                            errors.push(FileError {
                                filename: upload.filename.clone(),
                                error: err.to_string(),
                            });
                        }
                    }
                }

                on_progress(done + 1, total, &upload.filename);
            }
        }

        let docs: Vec<Document> = processed.iter().map(|p| p.document.clone()).collect();

        let indexed = match self.engine.index_batch(&docs) {
            Ok(indexed) => indexed,
            Err(err) => {
                log::error!("indexing failed: {err}");
                errors.extend(docs.iter().map(|doc| FileError {
                    filename: doc.filename.clone(),
                    error: format!("indexing failed: {err}"),
                }));
                processed.clear();
                0
            }
        };

        let preview_chars = self.config.search.preview_chars;
        let mut documents = Vec::with_capacity(processed.len());
        for image in processed {
            self.thumbnails.write(&image.document.id, &image.thumbnail)?;
            documents.push(DocumentMetadata::from_document(&image.document, preview_chars));
            self.documents.insert(image.document);
        }

        let elapsed = started.elapsed();
        if let Ok(mut total_time) = self.processing_time.lock() {
            *total_time += elapsed;
        }

        log::info!(
            "batch done: indexed={indexed} skipped={} errors={} elapsed={:.2}s",
            skipped.len(),
            errors.len(),
            elapsed.as_secs_f64()
        );

        Ok(BatchReport {
            indexed,
            documents,
            skipped,
            errors,
            elapsed_secs: elapsed.as_secs_f64(),
        })
    }

    pub fn search(&self, query: &str, top_k: Option<usize>) -> Result<Vec<SearchResult>, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::InvalidInput("search query must not be empty".into()));
        }

        let top_k = top_k.unwrap_or(self.config.search.default_top_k);
        let snippet_chars = self.config.search.snippet_chars;

        let results = self
            .engine
            .search(query, top_k)?
            .into_iter()
            .filter_map(|hit| {
                self.documents
                    .get(&hit.id)
                    .map(|doc| SearchResult::new(&doc, hit.score, snippet_chars))
            })
            .collect();

        Ok(results)
    }

    pub fn documents(&self) -> Vec<DocumentMetadata> {
        let preview_chars = self.config.search.preview_chars;
        self.documents
            .list()
            .iter()
            .map(|doc| DocumentMetadata::from_document(doc, preview_chars))
            .collect()
    }

    pub fn document(&self, id: &str) -> Result<Document, AppError> {
        self.documents.get(id).ok_or(AppError::NotFound)
    }

    /// WebP thumbnail bytes.
    pub fn thumbnail(&self, id: &str) -> Result<Vec<u8>, AppError> {
        if !self.thumbnails.exists(id) {
            return Err(AppError::NotFound);
        }
        Ok(self.thumbnails.read(id)?)
    }

    /// Drop documents, vectors, thumbnails and cached vision descriptions.
    pub fn clear(&self) {
        let count = self.documents.len();

        self.documents.clear();
        self.engine.clear();
        for id in self.thumbnails.list() {
            if let Err(err) = self.thumbnails.delete(&id) {
                log::warn!("failed to delete thumbnail {id}: {err}");
            }
        }
        if let Ok(processor) = self.processor.read() {
            processor.clear_cache();
        }
        if let Ok(mut total_time) = self.processing_time.lock() {
            *total_time = Duration::ZERO;
        }

        log::info!("session cleared ({count} documents)");
    }

    pub fn stats(&self) -> SessionStats {
        let engine = self.engine.stats();
        let docs = self.documents.list();

        SessionStats {
            total_documents: docs.len(),
            indexed_documents: engine.total_documents,
            with_vision: docs.iter().filter(|d| d.vision_description.is_some()).count(),
            processing_time_secs: self
                .processing_time
                .lock()
                .map(|t| t.as_secs_f64())
                .unwrap_or_default(),
            mode: self.mode(),
            api_key: self.api_key_source(),
            model_name: engine.model_name,
            embedding_dimension: engine.embedding_dimension,
        }
    }

    pub fn mode(&self) -> ProcessingMode {
        self.processor
            .read()
            .map(|p| p.mode())
            .unwrap_or(ProcessingMode::OcrOnly)
    }

    /// Use `key` for vision requests. `None` reverts to the environment key.
    pub fn set_api_key(&self, key: Option<String>) -> Result<ProcessingMode, AppError> {
        let key = key.map(|k| k.trim().to_string());
        if matches!(key.as_deref(), Some("")) {
            return Err(AppError::InvalidInput("api key must not be empty".into()));
        }

        let effective = key.clone().or_else(|| self.config.vision.api_key_from_env());
        let describer = describer_for_key(&self.config.vision, effective);

        *self
            .api_key
            .write()
            .map_err(|_| anyhow::anyhow!("api key lock poisoned"))? = key;

        let mut processor = self
            .processor
            .write()
            .map_err(|_| anyhow::anyhow!("processor lock poisoned"))?;
        processor.set_describer(describer);

        log::info!("vision api key updated, mode={:?}", processor.mode());
        Ok(processor.mode())
    }

    fn api_key_source(&self) -> ApiKeySource {
        let session_key = self.api_key.read().map(|k| k.is_some()).unwrap_or(false);
        if session_key {
            ApiKeySource::Session
        } else if self.config.vision.api_key_from_env().is_some() {
            ApiKeySource::Environment
        } else {
            ApiKeySource::None
        }
    }
}

/// Image files directly under `dir`, sorted by name.
pub fn list_images(dir: &Path, accepted: &[String]) -> std::io::Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .and_then(images::extension)
                .map(|ext| accepted.contains(&ext))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();
    Ok(paths)
}
