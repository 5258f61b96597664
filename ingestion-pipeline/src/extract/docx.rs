use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;

use common::error::AppError;

use super::ExtractedText;

/// Extracts the main document body of a DOCX file: `<w:t>` text runs from
/// `word/document.xml`, one line per `<w:p>` paragraph.
pub fn extract(bytes: &[u8]) -> Result<ExtractedText, AppError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|err| AppError::UnsupportedFormat(format!("unreadable DOCX archive: {err}")))?;

    let mut document_xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|_| AppError::UnsupportedFormat("word/document.xml not found".into()))?
        .read_to_string(&mut document_xml)
        .map_err(|err| AppError::UnsupportedFormat(format!("unreadable document body: {err}")))?;

    let text = collect_text_runs(&document_xml)?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AppError::EmptyContent);
    }

    Ok(ExtractedText::single(trimmed.to_string()))
}

fn collect_text_runs(xml: &str) -> Result<String, AppError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut out = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) => {
                if element.local_name().as_ref() == b"t" {
                    in_text_run = true;
                }
            }
            Ok(Event::End(element)) => match element.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(element)) => {
                // Self-closing breaks and tabs separate words.
                if matches!(element.local_name().as_ref(), b"br" | b"tab") {
                    out.push(' ');
                }
            }
            Ok(Event::Text(text)) if in_text_run => {
                out.push_str(&text.unescape().unwrap_or_default());
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(AppError::UnsupportedFormat(format!(
                    "malformed DOCX XML: {err}"
                )))
            }
            _ => {}
        }
    }

    Ok(out)
}
