use std::io::{Cursor, Read};

use common::error::AppError;

use super::{html, ExtractedText};

/// EPUB files are ZIP containers. Content entries (`.xhtml`/`.html`) are
/// run through the HTML extractor in archive order; each entry becomes one
/// page so locators can point back into the book.
pub fn extract(bytes: &[u8]) -> Result<ExtractedText, AppError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|err| AppError::UnsupportedFormat(format!("unreadable EPUB archive: {err}")))?;

    let mut sections = Vec::new();

    for index in 0..archive.len() {
        let Ok(mut entry) = archive.by_index(index) else {
            continue;
        };

        let name = entry.name().to_ascii_lowercase();
        if !(name.ends_with(".xhtml") || name.ends_with(".html")) {
            continue;
        }

        let mut content = Vec::new();
        if entry.read_to_end(&mut content).is_err() {
            continue;
        }

        let text = html::extract(&content);
        if !text.trim().is_empty() {
            sections.push(text);
        }
    }

    if sections.is_empty() {
        return Err(AppError::EmptyContent);
    }

    Ok(ExtractedText { pages: sections })
}
