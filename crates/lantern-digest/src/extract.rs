//! Document text extraction.
//!
//! Extraction is blocking; callers on the async side go through
//! [`extract_path`], which runs it on the blocking pool.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{DigestError, ExtractionError};

/// File extensions accepted as documents, lowercase and without the dot.
pub const DOCUMENT_EXTENSIONS: [&str; 4] = ["pdf", "docx", "txt", "csv"];

/// Kind of document, derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Text,
    Csv,
}

impl DocumentKind {
    /// Kind for a file name or path, matched case-insensitively on the extension.
    pub fn from_name(name: impl AsRef<Path>) -> Option<Self> {
        let ext = name.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" => Some(Self::Text),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

/// Whether a path names a supported document.
pub fn is_document(path: impl AsRef<Path>) -> bool {
    DocumentKind::from_name(path).is_some()
}

/// Turns documents into plain text.
pub trait TextExtractor: Send + Sync {
    /// Extract text from the raw bytes of a document called `name`.
    fn extract_bytes(&self, name: &str, bytes: &[u8]) -> Result<String, ExtractionError>;

    /// Extract text from a file on disk.
    fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !path.is_file() {
            return Err(ExtractionError::NotFound(name));
        }
        let bytes = std::fs::read(path)?;
        self.extract_bytes(&name, &bytes)
    }
}

/// A shared extractor reference.
pub type SharedExtractor = Arc<dyn TextExtractor>;

/// Built-in extractor for PDF, Word, plain text and CSV.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileExtractor;

impl TextExtractor for FileExtractor {
    fn extract_bytes(&self, name: &str, bytes: &[u8]) -> Result<String, ExtractionError> {
        let text = match DocumentKind::from_name(name) {
            Some(DocumentKind::Text) => String::from_utf8_lossy(bytes).into_owned(),
            Some(DocumentKind::Csv) => read_csv(bytes)?,
            Some(DocumentKind::Pdf) => read_pdf(bytes)?,
            Some(DocumentKind::Docx) => read_docx(bytes)?,
            None => {
                let ext = Path::new(name)
                    .extension()
                    .map(|e| format!(".{}", e.to_string_lossy()))
                    .unwrap_or_else(|| name.to_string());
                return Err(ExtractionError::UnsupportedFormat(ext));
            }
        };
        tracing::debug!(file = name, chars = text.chars().count(), "Extracted document text");
        Ok(text)
    }
}

/// CSV rows become lines with cells joined by `" | "`.
fn read_csv(bytes: &[u8]) -> Result<String, ExtractionError> {
    let text = String::from_utf8_lossy(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().collect::<Vec<_>>().join(" | "));
    }
    Ok(rows.join("\n"))
}

/// Page texts joined by blank lines.
fn read_pdf(bytes: &[u8]) -> Result<String, ExtractionError> {
    // The PDF parser panics on some malformed inputs.
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|_| ExtractionError::Pdf("malformed document".to_string()))?
        .map_err(|e| ExtractionError::Pdf(e.to_string()))?;
    let text = pages.iter().map(|page| page.trim()).collect::<Vec<_>>().join("\n\n");
    Ok(text.trim().to_string())
}

fn word_error(e: impl std::fmt::Display) -> ExtractionError {
    ExtractionError::Word(e.to_string())
}

/// Paragraph texts of `word/document.xml` joined by blank lines.
fn read_docx(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(word_error)?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(word_error)?
        .read_to_string(&mut xml)?;
    Ok(docx_paragraphs(&xml)?.join("\n\n"))
}

fn docx_paragraphs(xml: &str) -> Result<Vec<String>, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_run = false;
    let mut in_text = false;

    loop {
        match reader.read_event().map_err(word_error)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"r" => in_run = true,
                b"t" => in_text = true,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"r" => in_run = false,
                b"t" => in_text = false,
                b"p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"p" => paragraphs.push(String::new()),
                b"tab" if in_run => current.push('\t'),
                b"br" | b"cr" if in_run => current.push('\n'),
                _ => {}
            },
            Event::Text(text) if in_text => current.push_str(&String::from_utf8_lossy(&text)),
            Event::GeneralRef(entity) if in_text => {
                if let Some(ch) = entity.resolve_char_ref().map_err(word_error)? {
                    current.push(ch);
                } else {
                    let name = entity.decode().map_err(word_error)?;
                    if let Some(value) = quick_xml::escape::resolve_xml_entity(&name) {
                        current.push_str(value);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(paragraphs)
}

/// Run `extractor` on a file using the blocking pool.
pub async fn extract_path(extractor: SharedExtractor, path: PathBuf) -> Result<String, DigestError> {
    tokio::task::spawn_blocking(move || extractor.extract(&path))
        .await
        .map_err(|e| DigestError::Worker(e.to_string()))?
        .map_err(DigestError::from)
}

/// Run `extractor` on in-memory bytes using the blocking pool.
pub async fn extract_upload(
    extractor: SharedExtractor,
    name: String,
    bytes: Vec<u8>,
) -> Result<String, DigestError> {
    tokio::task::spawn_blocking(move || extractor.extract_bytes(&name, &bytes))
        .await
        .map_err(|e| DigestError::Worker(e.to_string()))?
        .map_err(DigestError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_document_kind() {
        assert_eq!(DocumentKind::from_name("Report.PDF"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_name("a/b/notes.txt"), Some(DocumentKind::Text));
        assert_eq!(DocumentKind::from_name("data.csv"), Some(DocumentKind::Csv));
        assert_eq!(DocumentKind::from_name("image.png"), None);
        assert_eq!(DocumentKind::from_name("README"), None);
        assert!(is_document("x.docx"));
    }

    #[test]
    fn test_text_is_lossy_utf8() {
        let text = FileExtractor.extract_bytes("a.txt", b"caf\xe9 ok").unwrap();
        assert_eq!(text, "caf\u{fffd} ok");
    }

    #[test]
    fn test_csv_rows_joined() {
        let text = FileExtractor
            .extract_bytes("t.csv", b"name,qty\napple,3\n\"b, c\",4,extra\n")
            .unwrap();
        assert_eq!(text, "name | qty\napple | 3\nb, c | 4 | extra");
    }

    #[test]
    fn test_unsupported_format() {
        assert!(matches!(
            FileExtractor.extract_bytes("x.png", b""),
            Err(ExtractionError::UnsupportedFormat(ext)) if ext == ".png"
        ));
    }

    /// A PDF with one Helvetica text line per page.
    fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
        let kids = (0..pages.len())
            .map(|i| format!("{} 0 R", 4 + 2 * i))
            .collect::<Vec<_>>()
            .join(" ");
        let mut objects = vec![
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids, pages.len()),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
                .to_string(),
        ];
        for (i, text) in pages.iter().enumerate() {
            let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
                 /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
                5 + 2 * i
            ));
            objects.push(format!(
                "<< /Length {} >>\nstream\n{}\nendstream",
                content.len(),
                content
            ));
        }

        let mut pdf = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref = pdf.len();
        let mut tail = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for offset in offsets {
            tail.push_str(&format!("{:010} 00000 n \n", offset));
        }
        tail.push_str(&format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref
        ));
        pdf.extend_from_slice(tail.as_bytes());
        pdf
    }

    /// A minimal .docx archive holding `body` as the document body.
    fn docx_with_body(body: &str) -> Vec<u8> {
        use std::io::Write;

        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            body
        );
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_pdf_pages_joined() {
        let pdf = pdf_with_pages(&["Quarterly", "Forecast"]);
        let text = FileExtractor.extract_bytes("report.pdf", &pdf).unwrap();

        let first = text.find("Quarterly").unwrap();
        let second = text.find("Forecast").unwrap();
        assert!(first < second);
        assert!(text[first..second].contains("\n\n"));
    }

    #[test]
    fn test_corrupt_pdf_is_an_error() {
        assert!(matches!(
            FileExtractor.extract_bytes("broken.pdf", b"%PDF-1.4"),
            Err(ExtractionError::Pdf(_))
        ));
    }

    #[test]
    fn test_docx_paragraphs_joined() {
        let docx = docx_with_body(
            "<w:p><w:pPr><w:tabs><w:tab w:val=\"left\" w:pos=\"720\"/></w:tabs></w:pPr>\
             <w:r><w:t>Meeting</w:t></w:r><w:r><w:t xml:space=\"preserve\"> notes</w:t></w:r></w:p>\
             <w:p/>\
             <w:p><w:r><w:t>R&amp;D</w:t><w:tab/><w:t>budget</w:t></w:r></w:p>",
        );
        let text = FileExtractor.extract_bytes("notes.docx", &docx).unwrap();
        assert_eq!(text, "Meeting notes\n\n\n\nR&D\tbudget");
    }

    #[test]
    fn test_corrupt_docx_is_an_error() {
        assert!(matches!(
            FileExtractor.extract_bytes("broken.docx", b"not a zip"),
            Err(ExtractionError::Word(_))
        ));
    }

    #[test]
    fn test_extract_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello world").unwrap();
        assert_eq!(FileExtractor.extract(&path).unwrap(), "hello world");

        let missing = dir.path().join("gone.txt");
        assert!(matches!(
            FileExtractor.extract(&missing),
            Err(ExtractionError::NotFound(name)) if name == "gone.txt"
        ));
    }

    #[tokio::test]
    async fn test_extract_upload_runs_off_thread() {
        let extractor: SharedExtractor = Arc::new(FileExtractor);
        let text = extract_upload(extractor, "a.txt".to_string(), b"abc".to_vec())
            .await
            .unwrap();
        assert_eq!(text, "abc");
    }
}
