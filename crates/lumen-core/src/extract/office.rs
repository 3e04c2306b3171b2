//! Office Open XML documents (Word and PowerPoint). Both are zip archives
//! of XML parts; text lives in `<w:t>` and `<a:t>` runs respectively.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use regex::Regex;
use zip::ZipArchive;

use crate::error::{Error, Result};

/// Paragraph texts of a Word document, joined by blank lines.
pub fn word_text(path: &Path) -> Result<String> {
    let mut archive = open(path)?;
    let xml = read_part(&mut archive, "word/document.xml", path)?;

    let paragraph = pattern(r"(?s)<w:p[ >].*?</w:p>", path)?;
    let run = pattern(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>", path)?;

    let paragraphs: Vec<String> = paragraph
        .find_iter(&xml)
        .map(|p| run.captures_iter(p.as_str()).map(|c| unescape(&c[1])).collect::<String>())
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    Ok(paragraphs.join("\n\n"))
}

/// Text of each slide in presentation order. Slides without text are dropped.
pub fn slide_texts(path: &Path) -> Result<Vec<String>> {
    let mut archive = open(path)?;
    let slide_name = pattern(r"^ppt/slides/slide(\d+)\.xml$", path)?;
    let run = pattern(r"<a:t(?:\s[^>]*)?>([^<]*)</a:t>", path)?;

    let mut slides: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let number = slide_name.captures(name)?.get(1)?.as_str().parse().ok()?;
            Some((number, name.to_string()))
        })
        .collect();
    slides.sort_unstable();

    let mut texts = Vec::with_capacity(slides.len());
    for (_, name) in slides {
        let xml = read_part(&mut archive, &name, path)?;
        let text = run
            .captures_iter(&xml)
            .map(|c| unescape(&c[1]).trim().to_string())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !text.is_empty() {
            texts.push(text);
        }
    }
    Ok(texts)
}

fn open(path: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(path).map_err(|e| Error::extraction(path, e))?;
    ZipArchive::new(file).map_err(|e| Error::extraction(path, e))
}

fn read_part(archive: &mut ZipArchive<File>, name: &str, path: &Path) -> Result<String> {
    let mut part = archive
        .by_name(name)
        .map_err(|e| Error::extraction(path, format!("{name}: {e}")))?;
    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .map_err(|e| Error::extraction(path, format!("{name}: {e}")))?;
    Ok(xml)
}

fn pattern(re: &str, path: &Path) -> Result<Regex> {
    Regex::new(re).map_err(|e| Error::extraction(path, e))
}

fn unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entities_are_decoded() {
        assert_eq!(unescape("R&amp;D &lt;draft&gt;"), "R&D <draft>");
        assert_eq!(unescape("&amp;lt;"), "&lt;");
    }

    #[test]
    fn non_zip_document_is_an_extraction_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("plain.docx");
        std::fs::write(&path, "just text").unwrap();
        assert!(matches!(word_text(&path), Err(Error::Extraction { .. })));
    }
}
