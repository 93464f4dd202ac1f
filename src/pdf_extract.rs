// src/pdf_extract.rs

use lopdf::{Dictionary, Document};
use tracing::{debug, info, warn};

/// What a scheme letter PDF yielded.
#[derive(Debug)]
pub enum PdfContent {
    /// Letter text, ready for cleaning.
    Text(String),
    /// Image-only pages; the letter would need OCR.
    ScannedImage,
    /// The bytes are not a readable PDF.
    Error(String),
}

/// Non-whitespace characters below which the letter counts as scanned.
const MIN_TEXT_CHARS: usize = 30;

/// Share of image-only pages at which the whole file counts as scanned.
const SCANNED_PAGE_RATIO: f64 = 0.8;

/// Text of a scheme letter PDF.
///
/// Page resources are checked first so image-only letters are reported as
/// scanned without running text extraction on them.
pub fn extract_text_from_pdf(pdf_bytes: &[u8]) -> PdfContent {
    let doc = match Document::load_mem(pdf_bytes) {
        Ok(d) => d,
        Err(e) => return PdfContent::Error(format!("unreadable PDF: {e}")),
    };

    let (image_only, pages) = image_only_pages(&doc);
    if pages > 0 && image_only as f64 / pages as f64 >= SCANNED_PAGE_RATIO {
        info!(pages, image_only, "Scheme letter is image-only");
        return PdfContent::ScannedImage;
    }

    let text = match pdf_extract::extract_text_from_mem(pdf_bytes) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, pages, "No text layer recovered, treating letter as scanned");
            return PdfContent::ScannedImage;
        }
    };

    let chars = text.chars().filter(|c| !c.is_whitespace()).count();
    if chars < MIN_TEXT_CHARS {
        info!(chars, pages, "Text layer too thin, treating letter as scanned");
        return PdfContent::ScannedImage;
    }
    debug!(chars, pages, "Letter text extracted");
    PdfContent::Text(text)
}

/// Whether the page's `Resources` holds a non-empty `key` dictionary.
fn has_resource(doc: &Document, page: &Dictionary, key: &[u8]) -> bool {
    page.get(b"Resources")
        .ok()
        .and_then(|r| doc.dereference(r).ok())
        .and_then(|(_, resolved)| resolved.as_dict().ok())
        .and_then(|res| res.get(key).ok())
        .and_then(|x| doc.dereference(x).ok())
        .and_then(|(_, resolved)| resolved.as_dict().ok())
        .is_some_and(|dict| !dict.is_empty())
}

/// (pages carrying images but no fonts, total pages)
fn image_only_pages(doc: &Document) -> (usize, usize) {
    let pages = doc.get_pages();
    let image_only = pages
        .values()
        .filter_map(|id| doc.get_object(*id).ok())
        .filter_map(|obj| obj.as_dict().ok())
        .filter(|page| has_resource(doc, page, b"XObject") && !has_resource(doc, page, b"Font"))
        .count();
    (image_only, pages.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_bytes() {
        let result = extract_text_from_pdf(b"this is not a pdf");
        assert!(matches!(result, PdfContent::Error(_)));
    }

    #[test]
    fn test_empty_bytes() {
        assert!(matches!(extract_text_from_pdf(b""), PdfContent::Error(_)));
    }
}
