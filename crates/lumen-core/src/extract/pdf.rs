use std::path::Path;

use lopdf::Document;
use tracing::{debug, warn};

/// Text of each readable page, in page order.
///
/// PDFs that fail to load degrade to no pages, as do pages whose decoded
/// text is mostly replacement or control characters (broken font encodings).
#[must_use]
pub fn page_texts(path: &Path) -> Vec<String> {
    let doc = match Document::load(path) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("Failed to load PDF {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    let mut pages = Vec::new();
    for page_num in doc.get_pages().keys() {
        match doc.extract_text(&[*page_num]) {
            Ok(text) if is_readable(&text) => pages.push(text.trim().to_string()),
            Ok(_) => debug!("Skipping unreadable page {} of {}", page_num, path.display()),
            Err(e) => debug!("No text on page {} of {}: {}", page_num, path.display(), e),
        }
    }
    pages
}

fn is_readable(text: &str) -> bool {
    let mut total = 0usize;
    let mut good = 0usize;
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        total += 1;
        if c.is_alphanumeric() || c.is_ascii_punctuation() {
            good += 1;
        }
    }
    total > 0 && good * 10 >= total * 6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_pdf_yields_no_pages() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("scrambled.pdf");
        std::fs::write(&path, b"%PDF-1.4\n\x00\x01garbage without xref").unwrap();
        assert!(page_texts(&path).is_empty());
    }

    #[test]
    fn readability_threshold() {
        assert!(is_readable("Battery capacity fades after 500 cycles."));
        assert!(!is_readable("\u{fffd}\u{fffd}\u{fffd}\u{1}\u{2}ab"));
        assert!(!is_readable("   \n "));
    }
}
