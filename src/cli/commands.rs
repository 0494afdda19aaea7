use std::path::PathBuf;

use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    app::{session::list_images, Session},
    cli::{errors::CliResult, validation::*},
    config::Config,
    ocr::Tesseract,
    processor::ScreenshotProcessor,
    samples,
    vision::describer_for_key,
    web,
};

/// Command for running the web interface
#[derive(Debug, Clone)]
pub struct ServeCommand {
    pub addr: String,
}

impl ServeCommand {
    pub fn new(addr: Option<String>, config: &Config) -> CliResult<Self> {
        let addr = addr.unwrap_or_else(|| config.server.listen_addr.clone());
        validate_addr(&addr)?;
        Ok(Self { addr })
    }

    pub fn execute(self, config: Config) -> CliResult<()> {
        let session = Session::new(config);
        log::info!("processing mode: {:?}", session.mode());
        web::start_daemon(session, &self.addr)?;
        Ok(())
    }
}

/// Command for processing a single image
#[derive(Debug, Clone)]
pub struct ProcessCommand {
    pub file: PathBuf,
    pub thumbnail: Option<PathBuf>,
}

impl ProcessCommand {
    pub fn new(file: PathBuf, thumbnail: Option<PathBuf>, config: &Config) -> CliResult<Self> {
        validate_image_file(&file, &config.upload.accepted_formats)?;
        Ok(Self { file, thumbnail })
    }

    pub fn execute(self, config: Config) -> CliResult<()> {
        let processor = ScreenshotProcessor::new(
            &config,
            Box::new(Tesseract::new(config.ocr.clone())),
            describer_for_key(&config.vision, config.vision.api_key_from_env()),
        );
        log::info!("processing mode: {:?}", processor.mode());

        let data = std::fs::read(&self.file)?;
        let filename = self
            .file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let processed = processor
            .process(&self.file.display().to_string(), &filename, &data)
            .map_err(|err| crate::cli::errors::CliError::processing(format!("{filename}: {err}")))?;

        if let Some(path) = self.thumbnail {
            std::fs::write(&path, &processed.thumbnail)?;
            log::info!("thumbnail written to {}", path.display());
        }

        println!("{}", serde_json::to_string_pretty(&processed.document)?);
        Ok(())
    }
}

/// Command for indexing a directory and searching it
#[derive(Debug, Clone)]
pub struct SearchCommand {
    pub query: String,
    pub dir: PathBuf,
    pub top_k: Option<usize>,
}

impl SearchCommand {
    pub fn new(query: String, dir: PathBuf, top_k: Option<usize>) -> CliResult<Self> {
        validate_search(&query, top_k)?;
        validate_dir(&dir)?;
        Ok(Self { query, dir, top_k })
    }

    pub fn execute(self, config: Config) -> CliResult<()> {
        let paths = list_images(&self.dir, &config.upload.accepted_formats)?;
        if paths.is_empty() {
            return Err(crate::cli::errors::CliError::invalid_input(format!(
                "no supported images in {}",
                self.dir.display()
            )));
        }

        let session = Session::new(config);

        let bar = ProgressBar::new(paths.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );

        let report = session.ingest_paths(&paths, |done, _total, filename| {
            bar.set_position(done as u64);
            bar.set_message(filename.to_string());
        })?;
        bar.finish_and_clear();

        for err in &report.errors {
            eprintln!("skipped {}: {}", err.filename, err.error);
        }
        log::info!(
            "indexed {} of {} images in {:.1}s",
            report.indexed,
            paths.len(),
            report.elapsed_secs
        );

        let results = session.search(&self.query, self.top_k)?;
        println!("{}", serde_json::to_string_pretty(&results)?);
        Ok(())
    }
}

/// Command for writing the demo screenshots
#[derive(Debug, Clone)]
pub struct GenerateSamplesCommand {
    pub dir: PathBuf,
}

impl GenerateSamplesCommand {
    pub fn new(dir: Option<PathBuf>, config: &Config) -> Self {
        Self {
            dir: dir.unwrap_or_else(|| config.samples_dir.clone()),
        }
    }

    pub fn execute(self) -> CliResult<()> {
        for path in samples::generate(&self.dir)? {
            println!("{}", path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_command_uses_config_addr() {
        let config = Config::default();
        let cmd = ServeCommand::new(None, &config).unwrap();
        assert_eq!(cmd.addr, "0.0.0.0:8080");

        let cmd = ServeCommand::new(Some("127.0.0.1:9000".into()), &config).unwrap();
        assert_eq!(cmd.addr, "127.0.0.1:9000");

        assert!(ServeCommand::new(Some("nope".into()), &config).is_err());
    }

    #[test]
    fn test_search_command_validation() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(SearchCommand::new("login".into(), tmp.path().to_path_buf(), Some(3)).is_ok());
        assert!(SearchCommand::new(" ".into(), tmp.path().to_path_buf(), None).is_err());
        assert!(SearchCommand::new("login".into(), tmp.path().join("missing"), None).is_err());
    }

    #[test]
    fn test_search_command_empty_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let cmd = SearchCommand::new("login".into(), tmp.path().to_path_buf(), None).unwrap();
        assert!(cmd.execute(Config::default()).is_err());
    }

    #[test]
    fn test_generate_samples_command() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.samples_dir = tmp.path().join("from-config");

        let cmd = GenerateSamplesCommand::new(None, &config);
        assert_eq!(cmd.dir, config.samples_dir);

        let cmd = GenerateSamplesCommand::new(Some(tmp.path().join("explicit")), &config);
        cmd.execute().unwrap();

        let written = list_images(&tmp.path().join("explicit"), &config.upload.accepted_formats).unwrap();
        assert_eq!(written.len(), 10);
    }

    #[test]
    fn test_process_command_rejects_unsupported() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("notes.txt");
        std::fs::write(&file, b"hello").unwrap();

        assert!(ProcessCommand::new(file, None, &Config::default()).is_err());
    }
}
