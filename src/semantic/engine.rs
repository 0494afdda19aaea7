//! Search engine over screenshot documents.
//!
//! - Lazy-loads the embedding model on first real use
//! - Keeps vectors in an in-memory `VectorIndex` for the session
//! - Thread-safe with interior mutability for lazy initialization

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;

use crate::config::SearchConfig;
use crate::documents::Document;
use crate::semantic::embeddings::{Embedder, EmbeddingError, EmbeddingModel};
use crate::semantic::index::{IndexError, ScoredId, VectorIndex};

/// Errors that can occur during search engine operations.
#[derive(Debug, thiserror::Error)]
pub enum SearchEngineError {
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Lazy-loaded search components.
struct EngineState {
    embedder: Box<dyn Embedder>,
    index: VectorIndex,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub total_documents: usize,
    pub model_name: String,
    /// `None` until the model has been loaded
    pub embedding_dimension: Option<usize>,
    pub indexed_ids: Vec<String>,
}

type LoadResult = Result<Box<dyn Embedder>, EmbeddingError>;
type Loader = Arc<dyn Fn() -> LoadResult + Send + Sync>;

pub struct SearchEngine {
    config: SearchConfig,
    loader: Loader,
    /// Model load still running after a timeout. Later calls wait on it
    /// instead of starting another download.
    pending: Mutex<Option<Receiver<LoadResult>>>,
    /// Uses Mutex<Option<_>> instead of OnceLock
    /// because get_or_try_init is unstable.
    state: Mutex<Option<EngineState>>,
}

impl SearchEngine {
    /// Create an engine that loads the configured fastembed model on demand.
    ///
    /// `cache_dir` receives downloaded model files under `models/`.
    pub fn new(config: SearchConfig, cache_dir: PathBuf) -> Self {
        let model_name = config.model.clone();
        Self::with_loader(config, move || {
            let model = EmbeddingModel::new(&model_name, cache_dir.clone())?;
            Ok(Box::new(model) as Box<dyn Embedder>)
        })
    }

    /// Create an engine that calls `loader` on a background thread the
    /// first time an embedder is needed.
    pub fn with_loader<F>(config: SearchConfig, loader: F) -> Self
    where
        F: Fn() -> LoadResult + Send + Sync + 'static,
    {
        Self {
            config,
            loader: Arc::new(loader),
            pending: Mutex::new(None),
            state: Mutex::new(None),
        }
    }

    /// Create an engine around an already loaded embedder.
    pub fn with_embedder(config: SearchConfig, embedder: Box<dyn Embedder>) -> Self {
        let engine = Self::with_loader(config, || {
            Err(EmbeddingError::InitFailed("no model loader configured".to_string()))
        });
        let index = VectorIndex::new(embedder.dimensions());
        if let Ok(mut guard) = engine.state.lock() {
            *guard = Some(EngineState { embedder, index });
        }
        engine
    }

    pub fn is_loaded(&self) -> bool {
        self.state
            .lock()
            .ok()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Number of indexed documents. 0 before the model is loaded.
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|s| s.index.len()))
            .unwrap_or(0)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|s| s.index.contains(id)))
            .unwrap_or(false)
    }

    /// Embed and index documents that have text and are not indexed yet.
    ///
    /// Returns the number of newly indexed documents.
    pub fn index_batch(&self, docs: &[Document]) -> Result<usize, SearchEngineError> {
        let candidates: Vec<&Document> = docs
            .iter()
            .filter(|doc| !doc.combined_text.trim().is_empty())
            .filter(|doc| !self.contains(&doc.id))
            .collect();

        if candidates.is_empty() {
            return Ok(0);
        }

        self.ensure_loaded()?;
        let mut guard = self.lock()?;
        let state = guard
            .as_mut()
            .ok_or_else(|| SearchEngineError::Internal("engine not initialized".to_string()))?;

        // same id twice in one batch
        let mut fresh: Vec<&Document> = Vec::with_capacity(candidates.len());
        for doc in candidates {
            if !fresh.iter().any(|d| d.id == doc.id) {
                fresh.push(doc);
            }
        }

        let texts: Vec<String> = fresh.iter().map(|doc| doc.combined_text.clone()).collect();
        let embeddings = state.embedder.embed_batch(&texts)?;

        let mut indexed = 0;
        for (doc, embedding) in fresh.iter().zip(embeddings) {
            match state.index.insert(doc.id.clone(), embedding) {
                Ok(()) => indexed += 1,
                Err(err) => log::warn!("skipping {} ({}): {err}", doc.filename, doc.id),
            }
        }

        log::info!("indexed {indexed} of {} documents", fresh.len());
        Ok(indexed)
    }

    /// Documents most similar to `query`, best first.
    ///
    /// An empty index returns no results without loading the model.
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<ScoredId>, SearchEngineError> {
        if self.len() == 0 || top_k == 0 {
            return Ok(vec![]);
        }

        let guard = self.lock()?;
        let state = guard
            .as_ref()
            .ok_or_else(|| SearchEngineError::Internal("engine not initialized".to_string()))?;

        let query_embedding = state.embedder.embed(query)?;
        let threshold = self.config.min_score.unwrap_or(-1.0);
        let limit = top_k.min(state.index.len());

        Ok(state.index.search(&query_embedding, threshold, limit)?)
    }

    /// Drop all indexed vectors. The loaded model stays loaded.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.state.lock() {
            if let Some(state) = guard.as_mut() {
                state.index.clear();
            }
        }
    }

    pub fn stats(&self) -> EngineStats {
        let guard = self.state.lock().ok();
        let state = guard.as_ref().and_then(|g| g.as_ref());

        EngineStats {
            total_documents: state.map(|s| s.index.len()).unwrap_or(0),
            model_name: state
                .map(|s| s.embedder.name().to_string())
                .unwrap_or_else(|| self.config.model.clone()),
            embedding_dimension: state.map(|s| s.index.dimensions()),
            indexed_ids: state.map(|s| s.index.ids()).unwrap_or_default(),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<EngineState>>, SearchEngineError> {
        self.state
            .lock()
            .map_err(|e| SearchEngineError::Internal(format!("Lock poisoned: {}", e)))
    }

    /// Load the model if needed. The state lock is only taken to install
    /// the finished model, so `stats` and `len` never wait on a download.
    fn ensure_loaded(&self) -> Result<(), SearchEngineError> {
        if self.is_loaded() {
            return Ok(());
        }

        let mut pending = self
            .pending
            .lock()
            .map_err(|e| SearchEngineError::Internal(format!("Lock poisoned: {}", e)))?;

        // installed while we waited for the loader lock
        if self.is_loaded() {
            return Ok(());
        }

        let rx = pending.get_or_insert_with(|| {
            log::info!("Loading embedding model '{}'", self.config.model);

            let (tx, rx) = mpsc::channel();
            let loader = Arc::clone(&self.loader);
            std::thread::spawn(move || {
                let _ = tx.send(loader());
            });
            rx
        });

        let timeout = Duration::from_secs(self.config.download_timeout_secs);
        let embedder = match rx.recv_timeout(timeout) {
            Ok(result) => {
                *pending = None;
                result?
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "Embedding model '{}' still loading after {}s",
                    self.config.model,
                    timeout.as_secs()
                );
                return Err(EmbeddingError::DownloadTimeout(timeout.as_secs()).into());
            }
            Err(RecvTimeoutError::Disconnected) => {
                *pending = None;
                return Err(EmbeddingError::InitFailed(
                    "model loader thread exited unexpectedly".to_string(),
                )
                .into());
            }
        };

        log::info!(
            "Embedding model '{}' ready ({} dimensions)",
            embedder.name(),
            embedder.dimensions()
        );

        let mut guard = self.lock()?;
        if guard.is_none() {
            let index = VectorIndex::new(embedder.dimensions());
            *guard = Some(EngineState { embedder, index });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fakes::{doc, HashingEmbedder};

    fn engine() -> SearchEngine {
        SearchEngine::with_embedder(SearchConfig::default(), Box::new(HashingEmbedder::new(512)))
    }

    #[test]
    fn test_lazy_engine_is_not_loaded() {
        let engine = SearchEngine::new(SearchConfig::default(), PathBuf::from("/tmp"));
        assert!(!engine.is_loaded());

        let stats = engine.stats();
        assert_eq!(stats.total_documents, 0);
        assert_eq!(stats.model_name, "all-MiniLM-L6-v2");
        assert_eq!(stats.embedding_dimension, None);
    }

    #[test]
    fn test_empty_batch_and_search_do_not_load_model() {
        let engine = SearchEngine::new(SearchConfig::default(), PathBuf::from("/nonexistent"));

        assert_eq!(engine.index_batch(&[]).unwrap(), 0);
        assert_eq!(engine.index_batch(&[doc("blank.png", "  ", None)]).unwrap(), 0);
        assert!(engine.search("anything", 5).unwrap().is_empty());
        assert!(!engine.is_loaded());
    }

    fn slow_loader(
        calls: Arc<std::sync::atomic::AtomicUsize>,
        delay: Duration,
    ) -> impl Fn() -> LoadResult + Send + Sync + 'static {
        move || {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            std::thread::sleep(delay);
            Ok(Box::new(HashingEmbedder::new(64)) as Box<dyn Embedder>)
        }
    }

    #[test]
    fn test_load_timeout_reuses_running_loader() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let config = SearchConfig {
            download_timeout_secs: 0,
            ..Default::default()
        };
        let engine = SearchEngine::with_loader(
            config,
            slow_loader(calls.clone(), Duration::from_millis(300)),
        );
        let docs = vec![doc("a.png", "alpha", None)];

        for _ in 0..2 {
            let err = engine.index_batch(&docs).unwrap_err();
            assert!(matches!(
                err,
                SearchEngineError::Embedding(EmbeddingError::DownloadTimeout(0))
            ));
        }

        // stats answer while the model is still loading
        assert!(!engine.is_loaded());
        assert_eq!(engine.stats().total_documents, 0);

        std::thread::sleep(Duration::from_millis(600));
        assert_eq!(engine.index_batch(&docs).unwrap(), 1);
        assert!(engine.is_loaded());
        assert_eq!(engine.stats().embedding_dimension, Some(64));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_load_failure_allows_retry() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = calls.clone();
        let engine = SearchEngine::with_loader(SearchConfig::default(), move || {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err(EmbeddingError::InitFailed("offline".to_string()))
        });
        let docs = vec![doc("a.png", "alpha", None)];

        assert!(engine.index_batch(&docs).is_err());
        assert!(engine.index_batch(&docs).is_err());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert!(!engine.is_loaded());
    }

    #[test]
    fn test_unknown_model_fails_on_first_use() {
        let tmp = tempfile::tempdir().unwrap();
        let config = SearchConfig {
            model: "nonexistent-model".to_string(),
            ..Default::default()
        };
        let engine = SearchEngine::new(config, tmp.path().to_path_buf());

        let err = engine.index_batch(&[doc("a.png", "alpha", None)]).unwrap_err();
        assert!(matches!(
            err,
            SearchEngineError::Embedding(EmbeddingError::InvalidModel(_))
        ));
    }

    #[test]
    fn test_index_skips_already_indexed() {
        let engine = engine();
        let docs = vec![
            doc("login.png", "Login Portal Username Password", None),
            doc("error.png", "Error Authentication Failed", None),
        ];

        assert_eq!(engine.index_batch(&docs).unwrap(), 2);
        assert_eq!(engine.index_batch(&docs).unwrap(), 0);

        let dup = vec![doc("chart.png", "Sales chart", None), doc("chart.png", "Sales chart", None)];
        assert_eq!(engine.index_batch(&dup).unwrap(), 1);
        assert_eq!(engine.len(), 3);
    }

    #[test]
    fn test_search_ranks_expected_document_first() {
        let engine = engine();
        let docs = vec![
            doc("login.png", "Login Portal Username Password", Some("blue login button")),
            doc("error.png", "Error Authentication Failed Invalid password", None),
            doc("dashboard.png", "Analytics Dashboard Reports Settings", Some("graph chart dark theme")),
        ];
        engine.index_batch(&docs).unwrap();

        let results = engine.search("authentication error", 5).unwrap();
        assert_eq!(results[0].id, docs[1].id);

        let results = engine.search("dashboard chart", 1).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, docs[2].id);
    }

    #[test]
    fn test_top_k_capped_by_count() {
        let engine = engine();
        engine
            .index_batch(&[doc("a.png", "alpha text", None), doc("b.png", "beta text", None)])
            .unwrap();

        assert_eq!(engine.search("text", 10).unwrap().len(), 2);
        assert!(engine.search("text", 0).unwrap().is_empty());
    }

    #[test]
    fn test_min_score_filters() {
        let config = SearchConfig {
            min_score: Some(0.99),
            ..Default::default()
        };
        let engine = SearchEngine::with_embedder(config, Box::new(HashingEmbedder::new(512)));
        engine
            .index_batch(&[doc("a.png", "alpha", None), doc("b.png", "beta gamma", None)])
            .unwrap();

        let results = engine.search("alpha", 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, crate::documents::document_id("a.png"));
    }

    #[test]
    fn test_clear_and_stats() {
        let engine = engine();
        engine.index_batch(&[doc("a.png", "alpha", None)]).unwrap();

        let stats = engine.stats();
        assert_eq!(stats.total_documents, 1);
        assert_eq!(stats.embedding_dimension, Some(512));
        assert_eq!(stats.model_name, "hashing-test");
        assert_eq!(stats.indexed_ids.len(), 1);

        engine.clear();
        assert_eq!(engine.len(), 0);
        assert!(engine.search("alpha", 5).unwrap().is_empty());
    }

    #[test]
    fn test_text_without_tokens_is_skipped() {
        let engine = engine();
        let indexed = engine
            .index_batch(&[doc("symbols.png", "!!! ???", None), doc("ok.png", "words", None)])
            .unwrap();
        assert_eq!(indexed, 1);
    }
}
