//! Text recognition through an external tesseract binary.

use std::io::ErrorKind;
use std::process::Command;

use image::{DynamicImage, ImageFormat};

use crate::config::OcrConfig;

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("ocr binary '{0}' not found")]
    BinaryNotFound(String),

    #[error("ocr failed: {0}")]
    Failed(String),

    #[error("ocr io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not prepare image for ocr: {0}")]
    Image(#[from] image::ImageError),
}

/// Extracts text from a decoded image.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError>;

    fn name(&self) -> &'static str;
}

pub struct Tesseract {
    config: OcrConfig,
}

impl Tesseract {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }

    fn command(&self, input: &std::path::Path) -> Command {
        let mut cmd = Command::new(&self.config.binary);
        cmd.arg(input)
            .arg("stdout")
            .arg("-l")
            .arg(&self.config.language);

        if let Some(psm) = self.config.page_segmentation_mode {
            cmd.arg("--psm").arg(psm.to_string());
        }

        cmd
    }
}

impl TextRecognizer for Tesseract {
    fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError> {
        let input = tempfile::Builder::new()
            .prefix("shotsearch-ocr-")
            .suffix(".png")
            .tempfile()?;

        // tesseract handles palette/alpha images poorly
        DynamicImage::ImageRgb8(image.to_rgb8()).save_with_format(input.path(), ImageFormat::Png)?;

        let output = self.command(input.path()).output().map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                OcrError::BinaryNotFound(self.config.binary.clone())
            } else {
                OcrError::Io(err)
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Failed(format!(
                "{} exited with {}: {}",
                self.config.binary,
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        log::debug!("ocr extracted {} chars", text.len());
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "tesseract"
    }
}
