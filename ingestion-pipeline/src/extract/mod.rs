use std::path::Path;

use common::error::AppError;

pub mod docx;
pub mod epub;
pub mod html;
pub mod pdf;

/// Extraction result. Paged formats report one entry per source page (or
/// content section) so chunk locators can carry page numbers; other
/// formats produce a single page.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    pub pages: Vec<String>,
}

impl ExtractedText {
    pub fn single(text: String) -> Self {
        Self { pages: vec![text] }
    }

    /// Full text: pages joined by blank lines, trimmed.
    pub fn text(&self) -> String {
        self.pages
            .iter()
            .map(|page| page.trim())
            .filter(|page| !page.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(|page| page.trim().is_empty())
    }
}

/// Turns uploaded bytes into plain text, dispatching on the lowercased
/// file extension. Unknown extensions are decoded as plain text.
pub fn extract_text(bytes: &[u8], filename: &str) -> Result<ExtractedText, AppError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => pdf::extract(bytes),
        "epub" => epub::extract(bytes),
        "docx" => docx::extract(bytes),
        "html" | "htm" => Ok(ExtractedText::single(html::extract(bytes))),
        // ".txt" and anything unrecognized: identity decode, invalid bytes
        // replaced rather than rejected.
        _ => Ok(ExtractedText::single(
            String::from_utf8_lossy(bytes).into_owned(),
        )),
    }
}
