//! Evidence file loading and text extraction.
//!
//! Only `.txt` and `.pdf` files are recognized. Text files must be valid
//! UTF-8; PDFs are extracted page by page and a page that fails to extract
//! contributes nothing rather than failing the whole document.

use coldcase_core::{AppError, AppResult};
use std::fs;
use std::path::Path;

/// Recognized evidence formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Text,
    Pdf,
}

impl DocumentKind {
    /// Detect the kind from a file extension, case-insensitively.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" => Some(Self::Text),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Pdf => "pdf",
        }
    }
}

/// Load a single evidence file from disk and return its text.
///
/// The text may be blank; callers decide whether a blank document is kept.
pub fn load(path: &Path) -> AppResult<String> {
    if DocumentKind::from_path(path).is_none() {
        return Err(unsupported(path));
    }

    let bytes = fs::read(path).map_err(|e| AppError::unreadable(path, e))?;
    load_bytes(path, &bytes)
}

/// Decode already-read bytes using the kind implied by the name's extension.
pub fn load_bytes(name: &Path, bytes: &[u8]) -> AppResult<String> {
    match DocumentKind::from_path(name) {
        Some(DocumentKind::Text) => decode_text(name, bytes),
        Some(DocumentKind::Pdf) => extract_pdf(name, bytes),
        None => Err(unsupported(name)),
    }
}

fn unsupported(path: &Path) -> AppError {
    AppError::unreadable(path, "unsupported file type (expected .txt or .pdf)")
}

fn decode_text(path: &Path, bytes: &[u8]) -> AppResult<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let text = std::str::from_utf8(bytes)
        .map_err(|e| AppError::unreadable(path, format!("invalid UTF-8: {}", e)))?;
    Ok(text.to_string())
}

fn extract_pdf(path: &Path, bytes: &[u8]) -> AppResult<String> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| AppError::unreadable(path, format!("PDF parse failed: {}", e)))?;

    let mut pages = Vec::new();
    for page_number in doc.get_pages().keys() {
        match doc.extract_text(&[*page_number]) {
            Ok(text) => pages.push(text),
            Err(e) => {
                tracing::warn!(
                    "Page {} of {:?} could not be extracted: {}",
                    page_number,
                    path,
                    e
                );
                pages.push(String::new());
            }
        }
    }

    Ok(pages.join("\n"))
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_kind_detection_is_case_insensitive() {
        assert_eq!(
            DocumentKind::from_path(Path::new("a/NOTES.TXT")),
            Some(DocumentKind::Text)
        );
        assert_eq!(
            DocumentKind::from_path(Path::new("scan.Pdf")),
            Some(DocumentKind::Pdf)
        );
        assert_eq!(DocumentKind::from_path(Path::new("photo.jpg")), None);
        assert_eq!(DocumentKind::from_path(Path::new("README")), None);
    }

    #[test]
    fn test_load_text_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("case1.txt");
        fs::write(&path, "The suspect was seen near the river.").unwrap();

        let text = load(&path).unwrap();
        assert_eq!(text, "The suspect was seen near the river.");
    }

    #[test]
    fn test_bom_is_stripped() {
        let text = load_bytes(Path::new("bom.txt"), b"\xEF\xBB\xBFwitness").unwrap();
        assert_eq!(text, "witness");
    }

    #[test]
    fn test_invalid_utf8_is_unreadable() {
        let err = load_bytes(Path::new("bad.txt"), &[0x66, 0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, AppError::UnreadableDocument { .. }));
    }

    #[test]
    fn test_unrecognized_extension_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("photo.png");
        fs::write(&path, [0u8, 1, 2]).unwrap();

        let err = load(&path).unwrap_err();
        assert!(matches!(err, AppError::UnreadableDocument { .. }));
    }

    #[test]
    fn test_corrupt_pdf_is_unreadable() {
        let err = load_bytes(Path::new("broken.pdf"), b"this is not a pdf").unwrap_err();
        assert!(matches!(err, AppError::UnreadableDocument { .. }));
    }

    #[test]
    fn test_pdf_text_is_extracted() {
        let bytes = fixtures::pdf_with_text("ledger shows the missing payment");
        let text = load_bytes(Path::new("ledger.pdf"), &bytes).unwrap();
        assert!(text.contains("missing payment"));
    }

    #[test]
    fn test_failed_page_contributes_nothing() {
        use fixtures::FixturePage;

        let bytes = fixtures::pdf_with_pages(&[
            FixturePage::Text("alibi confirmed"),
            FixturePage::Garbled,
        ]);
        let text = load_bytes(Path::new("statement.pdf"), &bytes).unwrap();

        assert!(text.contains("alibi confirmed"));
        assert!(!text.contains("garbage"));
    }

    #[test]
    fn test_pages_are_joined_in_order() {
        use fixtures::FixturePage;

        let bytes = fixtures::pdf_with_pages(&[
            FixturePage::Text("first interview"),
            FixturePage::Text("second interview"),
        ]);
        let text = load_bytes(Path::new("interviews.pdf"), &bytes).unwrap();

        let first = text.find("first interview").unwrap();
        let second = text.find("second interview").unwrap();
        assert!(first < second);
    }
}
