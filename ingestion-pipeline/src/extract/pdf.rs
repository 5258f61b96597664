use lopdf::Document;

use common::error::AppError;

use super::ExtractedText;

/// Extracts the text layer of a PDF, one entry per page in page order.
///
/// Encrypted documents get a single empty-password decryption attempt;
/// anything stronger is a typed `Encrypted` failure. Pages whose text
/// cannot be extracted are skipped, but a document with no extractable
/// text at all is `EmptyContent`.
pub fn extract(bytes: &[u8]) -> Result<ExtractedText, AppError> {
    let mut document = Document::load_mem(bytes)
        .map_err(|err| AppError::UnsupportedFormat(format!("failed to parse PDF: {err}")))?;

    if document.is_encrypted() {
        document.decrypt("").map_err(|_| AppError::Encrypted)?;
    }

    let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();

    let mut pages = Vec::new();
    for page_number in page_numbers {
        match document.extract_text(&[page_number]) {
            Ok(text) if !text.trim().is_empty() => pages.push(text),
            _ => {}
        }
    }

    if pages.is_empty() {
        return Err(AppError::EmptyContent);
    }

    Ok(ExtractedText { pages })
}
