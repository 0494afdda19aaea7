use crate::{
    images::SUPPORTED_FORMATS,
    storage::{self, StorageManager},
};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

const DEFAULT_MAX_UPLOAD_SIZE_MB: u64 = 10;
const MAX_UPLOAD_SIZE_MB: u64 = 1024;
const DEFAULT_MAX_FILES_PER_BATCH: usize = 50;

const DEFAULT_PAGE_TITLE: &str = "Visual Memory Search";

const DEFAULT_OCR_BINARY: &str = "tesseract";
const DEFAULT_OCR_LANGUAGE: &str = "eng";

const DEFAULT_VISION_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_VISION_API_VERSION: &str = "2023-06-01";
const DEFAULT_VISION_MODEL: &str = "claude-3-haiku-20240307";
const DEFAULT_VISION_MAX_TOKENS: u32 = 300;
/// Largest side sent to the vision API
const DEFAULT_VISION_MAX_DIMENSION: u32 = 1024;
const DEFAULT_VISION_TIMEOUT_SECS: u64 = 60;
const DEFAULT_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
const DEFAULT_VISION_PROMPT: &str = "Describe this screenshot focusing on: UI elements (buttons, forms, menus), color scheme and theme, main content type, any error messages or notifications, layout structure. Be concise but comprehensive.";

const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";
const DEFAULT_TOP_K: usize = 5;
const DEFAULT_PREVIEW_CHARS: usize = 500;
const DEFAULT_SNIPPET_CHARS: usize = 300;
/// Default model download timeout in seconds
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;

const DEFAULT_THUMBNAIL_DIMENSION: u32 = 480;
const DEFAULT_THUMBNAIL_QUALITY: u8 = 80;

const DEFAULT_SAMPLES_DIR: &str = "sample_screenshots";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Per-file limit
    #[serde(default = "default_max_upload_size_mb")]
    pub max_upload_size_mb: u64,

    #[serde(default = "default_max_files_per_batch")]
    pub max_files_per_batch: usize,

    /// Lowercase file extensions accepted by the uploader
    #[serde(default = "default_accepted_formats")]
    pub accepted_formats: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_upload_size_mb: default_max_upload_size_mb(),
            max_files_per_batch: default_max_files_per_batch(),
            accepted_formats: default_accepted_formats(),
        }
    }
}

impl UploadConfig {
    pub fn max_upload_bytes(&self) -> usize {
        let bytes = self.max_upload_size_mb.saturating_mul(1024 * 1024);
        usize::try_from(bytes).unwrap_or(usize::MAX)
    }

    /// Request body limit for a full batch of base64 encoded files.
    pub fn max_request_bytes(&self) -> usize {
        let per_file = (self.max_upload_bytes() / 3)
            .saturating_mul(4)
            .saturating_add(1024);
        per_file.saturating_mul(self.max_files_per_batch)
    }
}

fn default_max_upload_size_mb() -> u64 {
    DEFAULT_MAX_UPLOAD_SIZE_MB
}

fn default_max_files_per_batch() -> usize {
    DEFAULT_MAX_FILES_PER_BATCH
}

fn default_accepted_formats() -> Vec<String> {
    SUPPORTED_FORMATS.iter().map(|f| f.to_string()).collect()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    /// Follow the browser preference
    Auto,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default)]
    pub theme: Theme,

    #[serde(default = "default_page_title")]
    pub page_title: String,

    #[serde(default = "default_example_queries")]
    pub example_queries: Vec<String>,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            page_title: default_page_title(),
            example_queries: default_example_queries(),
        }
    }
}

fn default_page_title() -> String {
    DEFAULT_PAGE_TITLE.to_string()
}

fn default_example_queries() -> Vec<String> {
    [
        "error message",
        "blue button",
        "login form",
        "dark theme",
        "code editor",
        "warning notification",
        "menu bar",
        "graph chart",
        "mobile interface",
    ]
    .iter()
    .map(|q| q.to_string())
    .collect()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Path or name of the tesseract executable
    #[serde(default = "default_ocr_binary")]
    pub binary: String,

    #[serde(default = "default_ocr_language")]
    pub language: String,

    /// Page segmentation mode passed as `--psm`
    #[serde(default)]
    pub page_segmentation_mode: Option<u8>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            binary: default_ocr_binary(),
            language: default_ocr_language(),
            page_segmentation_mode: None,
        }
    }
}

fn default_ocr_binary() -> String {
    DEFAULT_OCR_BINARY.to_string()
}

fn default_ocr_language() -> String {
    DEFAULT_OCR_LANGUAGE.to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VisionConfig {
    #[serde(default = "default_vision_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_vision_api_version")]
    pub api_version: String,

    #[serde(default = "default_vision_model")]
    pub model: String,

    #[serde(default = "default_vision_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_vision_prompt")]
    pub prompt: String,

    #[serde(default = "default_vision_max_dimension")]
    pub max_image_dimension: u32,

    #[serde(default = "default_vision_timeout_secs")]
    pub timeout_secs: u64,

    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_vision_endpoint(),
            api_version: default_vision_api_version(),
            model: default_vision_model(),
            max_tokens: default_vision_max_tokens(),
            prompt: default_vision_prompt(),
            max_image_dimension: default_vision_max_dimension(),
            timeout_secs: default_vision_timeout_secs(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl VisionConfig {
    /// API key from the configured environment variable, if set and non-blank.
    pub fn api_key_from_env(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }
}

fn default_vision_endpoint() -> String {
    DEFAULT_VISION_ENDPOINT.to_string()
}

fn default_vision_api_version() -> String {
    DEFAULT_VISION_API_VERSION.to_string()
}

fn default_vision_model() -> String {
    DEFAULT_VISION_MODEL.to_string()
}

fn default_vision_max_tokens() -> u32 {
    DEFAULT_VISION_MAX_TOKENS
}

fn default_vision_prompt() -> String {
    DEFAULT_VISION_PROMPT.to_string()
}

fn default_vision_max_dimension() -> u32 {
    DEFAULT_VISION_MAX_DIMENSION
}

fn default_vision_timeout_secs() -> u64 {
    DEFAULT_VISION_TIMEOUT_SECS
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

/// Configuration for embedding and similarity search
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Model name for embeddings (e.g., "all-MiniLM-L6-v2")
    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Results scoring below this are dropped. Unset keeps everything.
    #[serde(default)]
    pub min_score: Option<f32>,

    /// Length of OCR/vision previews attached to documents
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,

    /// Length of the snippet shown with a search result
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,

    /// Timeout for model download in seconds
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            default_top_k: default_top_k(),
            min_score: None,
            preview_chars: default_preview_chars(),
            snippet_chars: default_snippet_chars(),
            download_timeout_secs: default_download_timeout_secs(),
        }
    }
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_preview_chars() -> usize {
    DEFAULT_PREVIEW_CHARS
}

fn default_snippet_chars() -> usize {
    DEFAULT_SNIPPET_CHARS
}

fn default_download_timeout_secs() -> u64 {
    DEFAULT_DOWNLOAD_TIMEOUT_SECS
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThumbnailConfig {
    #[serde(default = "default_thumbnail_dimension")]
    pub max_dimension: u32,

    /// WebP quality (1-100)
    #[serde(default = "default_thumbnail_quality")]
    pub quality: u8,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            max_dimension: default_thumbnail_dimension(),
            quality: default_thumbnail_quality(),
        }
    }
}

fn default_thumbnail_dimension() -> u32 {
    DEFAULT_THUMBNAIL_DIMENSION
}

fn default_thumbnail_quality() -> u8 {
    DEFAULT_THUMBNAIL_QUALITY
}

fn default_samples_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SAMPLES_DIR)
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub vision: VisionConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub thumbnails: ThumbnailConfig,

    /// Directory scanned by "Load Sample Screenshots"
    #[serde(default = "default_samples_dir")]
    pub samples_dir: PathBuf,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            upload: UploadConfig::default(),
            ui: UiConfig::default(),
            ocr: OcrConfig::default(),
            vision: VisionConfig::default(),
            search: SearchConfig::default(),
            thumbnails: ThumbnailConfig::default(),
            samples_dir: default_samples_dir(),
            base_path: PathBuf::new(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        let upload = &self.upload;
        if !(1..=MAX_UPLOAD_SIZE_MB).contains(&upload.max_upload_size_mb) {
            bail!(
                "upload.max_upload_size_mb must be between 1 and {MAX_UPLOAD_SIZE_MB}, got {}",
                upload.max_upload_size_mb
            );
        }
        if upload.max_files_per_batch == 0 {
            bail!("upload.max_files_per_batch must be greater than 0");
        }
        if upload.accepted_formats.is_empty() {
            bail!("upload.accepted_formats must not be empty");
        }
        for format in &upload.accepted_formats {
            if !SUPPORTED_FORMATS.contains(&format.as_str()) {
                bail!(
                    "upload.accepted_formats: '{format}' is not supported, expected one of {}",
                    SUPPORTED_FORMATS.join(", ")
                );
            }
        }

        let vision = &self.vision;
        match url::Url::parse(&vision.endpoint) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            _ => bail!(
                "vision.endpoint must be an absolute http(s) url, got '{}'",
                vision.endpoint
            ),
        }
        if vision.max_image_dimension < 64 {
            bail!(
                "vision.max_image_dimension must be at least 64, got {}",
                vision.max_image_dimension
            );
        }
        if vision.max_tokens == 0 {
            bail!("vision.max_tokens must be greater than 0");
        }

        let search = &self.search;
        if search.default_top_k == 0 {
            bail!("search.default_top_k must be greater than 0");
        }
        if let Some(min_score) = search.min_score {
            if !(-1.0..=1.0).contains(&min_score) {
                bail!("search.min_score must be between -1.0 and 1.0, got {min_score}");
            }
        }
        if search.download_timeout_secs == 0 {
            bail!("search.download_timeout_secs must be greater than 0");
        }

        if !(1..=100).contains(&self.thumbnails.quality) {
            bail!(
                "thumbnails.quality must be between 1 and 100, got {}",
                self.thumbnails.quality
            );
        }
        if self.thumbnails.max_dimension == 0 {
            bail!("thumbnails.max_dimension must be greater than 0");
        }

        Ok(())
    }

    pub fn load_with(base_path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let base_path = base_path.into();
        let store = storage::BackendLocal::new(&base_path)
            .with_context(|| format!("failed to create {}", base_path.display()))?;

        // create new if does not exist
        if !store.exists(CONFIG_FILE) {
            store.write(CONFIG_FILE, serde_yml::to_string(&Self::default())?.as_bytes())?;
        }

        let config_str =
            String::from_utf8(store.read(CONFIG_FILE)?).context("config file is not valid utf8")?;
        let mut config: Self = serde_yml::from_str(&config_str).context("config is malformed")?;

        config.base_path = base_path;

        config.validate()?;

        // resave in case new defaults were filled in
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let store = storage::BackendLocal::new(&self.base_path)?;

        let config_str = serde_yml::to_string(&self)?;
        store.write(CONFIG_FILE, config_str.as_bytes())?;
        Ok(())
    }

    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }
}
