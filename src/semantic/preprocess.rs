//! Text shaping around embedding: OCR cleanup, combination and previews.

use once_cell::sync::Lazy;
use regex::Regex;

/// Ellipsis suffix when content is truncated
const TRUNCATION_SUFFIX: &str = "...";

static TRAILING_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+\n").unwrap());
static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Tidy raw OCR output: unify newlines, strip trailing spaces,
/// collapse runs of blank lines.
pub fn normalize_ocr_text(raw: &str) -> String {
    let text = raw.replace("\r\n", "\n").replace('\x0c', "\n");
    let text = TRAILING_SPACE.replace_all(&text, "\n");
    let text = BLANK_RUNS.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Text that gets embedded for a screenshot.
///
/// OCR text and the visual description are separated by a blank line;
/// empty parts are left out.
pub fn combine_text(ocr_text: &str, vision_description: Option<&str>) -> String {
    let ocr_text = ocr_text.trim();
    let vision = vision_description.map(str::trim).unwrap_or_default();

    match (ocr_text.is_empty(), vision.is_empty()) {
        (true, true) => String::new(),
        (false, true) => ocr_text.to_string(),
        (true, false) => vision.to_string(),
        (false, false) => format!("{ocr_text}\n\n{vision}"),
    }
}

/// At most `max_chars` characters, ending in an ellipsis when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let keep = max_chars.saturating_sub(TRUNCATION_SUFFIX.len());
    let truncated: String = text.chars().take(keep).collect();

    format!("{}{}", truncated.trim_end(), TRUNCATION_SUFFIX)
}
