//! Text extraction from uploaded contract documents.
//!
//! Dispatches on file extension (`pdf`, `docx`, `txt`) and returns plain
//! UTF-8 text or an explicit [`Error::Extraction`], never silently
//! partial output. Extraction is a thin adapter in front of the analysis
//! core; the core only ever sees the extracted text.

use crate::error::{Error, Result};
use std::io::Read;
use std::path::Path;

/// File extensions accepted for upload.
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["pdf", "docx", "txt"];

/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Check whether a filename carries an allowed extension.
pub fn allowed_file(path: &Path) -> bool {
    extension_of(path)
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Extract the text of a contract document.
///
/// Guarantees non-empty text on success; an empty or whitespace-only
/// extraction is reported as an error rather than passed downstream.
pub fn extract_text(path: &Path) -> Result<String> {
    let ext = extension_of(path).ok_or_else(|| {
        Error::Extraction(format!("{} has no file extension", path.display()))
    })?;

    let bytes = std::fs::read(path)
        .map_err(|e| Error::Extraction(format!("failed to read {}: {e}", path.display())))?;

    let text = match ext.as_str() {
        "txt" => String::from_utf8(bytes)
            .map_err(|_| Error::Extraction("text file is not valid UTF-8".to_string()))?,
        "pdf" => pdf_extract::extract_text_from_mem(&bytes)
            .map_err(|e| Error::Extraction(format!("PDF extraction failed: {e}")))?,
        "docx" => extract_docx(&bytes)?,
        other => {
            return Err(Error::Extraction(format!(
                "unsupported file extension: {other}"
            )))
        }
    };

    if text.trim().is_empty() {
        return Err(Error::Extraction(format!(
            "no text extracted from {}",
            path.display()
        )));
    }
    Ok(text)
}

/// Pull paragraph text out of a DOCX archive's `word/document.xml`,
/// harvesting `w:t` runs and separating paragraphs with newlines.
fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| Error::Extraction(format!("not a DOCX archive: {e}")))?;

    let mut xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|_| Error::Extraction("word/document.xml not found".to_string()))?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut xml)
            .map_err(|e| Error::Extraction(format!("failed to read document.xml: {e}")))?;
        if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
            return Err(Error::Extraction(
                "word/document.xml exceeds size limit".to_string(),
            ));
        }
    }

    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());

    let mut out = String::new();
    let mut in_text_run = false;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(ref e)) if e.local_name().as_ref() == b"t" => {
                in_text_run = true;
            }
            Ok(quick_xml::events::Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => {
                    if !out.ends_with('\n') {
                        out.push('\n');
                    }
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(ref t)) if in_text_run => {
                let piece = t
                    .unescape()
                    .map_err(|e| Error::Extraction(format!("bad XML text: {e}")))?;
                out.push_str(&piece);
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(Error::Extraction(format!("malformed document.xml: {e}"))),
        }
        buf.clear();
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn extension_allow_list() {
        assert!(allowed_file(Path::new("contract.pdf")));
        assert!(allowed_file(Path::new("contract.DOCX")));
        assert!(allowed_file(Path::new("notes.txt")));
        assert!(!allowed_file(Path::new("contract.exe")));
        assert!(!allowed_file(Path::new("no_extension")));
    }

    #[test]
    fn txt_extraction_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("c.txt");
        std::fs::write(&path, "The term is two years.").unwrap();
        assert_eq!(extract_text(&path).unwrap(), "The term is two years.");
    }

    #[test]
    fn empty_txt_is_an_extraction_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("empty.txt");
        std::fs::write(&path, "   \n").unwrap();
        assert!(matches!(extract_text(&path), Err(Error::Extraction(_))));
    }

    #[test]
    fn docx_extraction_reads_w_t_runs() {
        let document_xml = r#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>First clause.</w:t></w:r></w:p>
    <w:p><w:r><w:t>Second clause.</w:t></w:r></w:p>
  </w:body>
</w:document>"#;

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("c.docx");
        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file(
            "word/document.xml",
            zip::write::SimpleFileOptions::default(),
        )
        .unwrap();
        zip.write_all(document_xml.as_bytes()).unwrap();
        zip.finish().unwrap();

        let text = extract_text(&path).unwrap();
        assert!(text.contains("First clause."));
        assert!(text.contains("Second clause."));
    }

    #[test]
    fn unsupported_extension_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("c.exe");
        std::fs::write(&path, "x").unwrap();
        assert!(matches!(extract_text(&path), Err(Error::Extraction(_))));
    }
}
