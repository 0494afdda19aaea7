use crate::cli::errors::{CliError, CliResult};
use crate::images;
use std::net::SocketAddr;
use std::path::Path;

/// Validates a listen address like `127.0.0.1:8080`
pub fn validate_addr(addr: &str) -> CliResult<()> {
    addr.parse::<SocketAddr>()
        .map(|_| ())
        .map_err(|_| CliError::validation("addr", format!("'{addr}' is not a valid host:port")))
}

/// Validates that the path is an existing image file with an accepted extension
pub fn validate_image_file(path: &Path, accepted: &[String]) -> CliResult<()> {
    if !path.is_file() {
        return Err(CliError::validation(
            "file",
            format!("{} is not a file", path.display()),
        ));
    }

    let ext = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(images::extension)
        .unwrap_or_default();

    if !accepted.contains(&ext) {
        return Err(CliError::validation(
            "file",
            format!("unsupported extension '{ext}', expected one of {}", accepted.join(", ")),
        ));
    }

    Ok(())
}

/// Validates the screenshot directory
pub fn validate_dir(dir: &Path) -> CliResult<()> {
    if !dir.is_dir() {
        return Err(CliError::validation(
            "dir",
            format!("{} is not a directory", dir.display()),
        ));
    }
    Ok(())
}

/// Validates search query and result count
pub fn validate_search(query: &str, top_k: Option<usize>) -> CliResult<()> {
    if query.trim().is_empty() {
        return Err(CliError::validation("query", "Search query cannot be empty"));
    }

    if let Some(top_k) = top_k {
        if top_k == 0 || top_k > 100 {
            return Err(CliError::validation("top_k", "Must be between 1 and 100"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepted() -> Vec<String> {
        images::SUPPORTED_FORMATS.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_validate_addr() {
        assert!(validate_addr("127.0.0.1:8080").is_ok());
        assert!(validate_addr("0.0.0.0:0").is_ok());
        assert!(validate_addr("localhost").is_err());
        assert!(validate_addr("").is_err());
    }

    #[test]
    fn test_validate_image_file() {
        let tmp = tempfile::tempdir().unwrap();
        let png = tmp.path().join("shot.png");
        let txt = tmp.path().join("notes.txt");
        std::fs::write(&png, b"x").unwrap();
        std::fs::write(&txt, b"x").unwrap();

        assert!(validate_image_file(&png, &accepted()).is_ok());
        assert!(validate_image_file(&txt, &accepted()).is_err());
        assert!(validate_image_file(&tmp.path().join("missing.png"), &accepted()).is_err());
        assert!(validate_image_file(tmp.path(), &accepted()).is_err());
    }

    #[test]
    fn test_validate_search() {
        assert!(validate_search("login form", None).is_ok());
        assert!(validate_search("login form", Some(5)).is_ok());
        assert!(validate_search("   ", None).is_err());
        assert!(validate_search("x", Some(0)).is_err());
        assert!(validate_search("x", Some(101)).is_err());
    }

    #[test]
    fn test_validate_dir() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(validate_dir(tmp.path()).is_ok());
        assert!(validate_dir(&tmp.path().join("nope")).is_err());
    }
}
