use crate::config::Config;
use anyhow::{Context, Result};
use homedir::my_home;
use std::path::PathBuf;

/// Application factory for creating and configuring application components
pub struct AppFactory;

impl AppFactory {
    /// Get application paths, creating the base directory if needed
    pub fn get_paths() -> Result<AppPaths> {
        let base_path = Self::get_base_path()?;

        std::fs::create_dir_all(&base_path).with_context(|| {
            format!(
                "Failed to create application base directory {}",
                base_path.display()
            )
        })?;

        Ok(AppPaths::new(base_path))
    }

    pub fn create_config(paths: &AppPaths) -> Result<Config> {
        Config::load_with(&paths.base_path)
            .with_context(|| format!("invalid config in {}", paths.base_path.display()))
    }

    /// `$SHOTSEARCH_BASE_PATH` or `~/.local/share/shotsearch`
    fn get_base_path() -> Result<PathBuf> {
        if let Ok(base_path) = std::env::var("SHOTSEARCH_BASE_PATH") {
            return Ok(PathBuf::from(base_path));
        }

        let home = my_home()
            .context("Could not determine home directory")?
            .context("Home directory path is empty")?;

        Ok(home.join(".local/share/shotsearch"))
    }
}

/// Application paths structure
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Holds config.yaml and the fastembed model cache under `models/`
    pub base_path: PathBuf,
}

impl AppPaths {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }
}
