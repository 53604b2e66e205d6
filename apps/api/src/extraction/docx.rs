//! Word-document text extraction.
//!
//! The upload is written to a uniquely named temporary file and parsed from
//! there. `NamedTempFile` removes the file when dropped, so the scratch copy is
//! gone once `extract_word` returns, whether parsing succeeded or not.

use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

use super::ExtractionError;

const DOCUMENT_PART: &str = "word/document.xml";
const SCRATCH_PREFIX: &str = "resume_";

pub fn extract_word(bytes: &[u8], scratch_dir: Option<&Path>) -> Result<String, ExtractionError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(SCRATCH_PREFIX).suffix(".docx");
    let mut scratch = match scratch_dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };

    scratch.write_all(bytes)?;
    scratch.flush()?;

    let file = File::open(scratch.path())?;
    document_text(BufReader::new(file))
}

/// Reads the main document part of a `.docx` archive as plain text.
pub fn document_text<R: Read + Seek>(reader: R) -> Result<String, ExtractionError> {
    let mut archive = ZipArchive::new(reader)?;
    let mut xml = String::new();
    archive.by_name(DOCUMENT_PART)?.read_to_string(&mut xml)?;
    document_xml_to_text(&xml)
}

/// `w:t` runs become text, `w:tab` a tab, `w:br`/`w:cr` and paragraph ends a newline.
fn document_xml_to_text(xml: &str) -> Result<String, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut out = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_text_run = true,
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                _ => {}
            },
            Event::Text(e) if in_text_run => out.push_str(&e.unescape()?),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;
    use zip::write::SimpleFileOptions;

    /// Builds a minimal `.docx` archive with the given paragraphs.
    pub(crate) fn make_docx(paragraphs: &[&str]) -> Vec<u8> {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t xml:space=\"preserve\">{p}</w:t></w:r></w:p>"))
            .collect();
        let xml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
             <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
             <w:body>{body}</w:body></w:document>"
        );

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(DOCUMENT_PART, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    fn scratch_entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_paragraphs_become_lines() {
        let bytes = make_docx(&["Jane Doe", "Experience", "Built &amp; shipped"]);
        let text = document_text(Cursor::new(bytes)).unwrap();
        assert_eq!(text, "Jane Doe\nExperience\nBuilt & shipped\n");
    }

    #[test]
    fn test_tabs_and_breaks() {
        let xml = "<w:document xmlns:w=\"w\"><w:body><w:p><w:r><w:t>a</w:t><w:tab/>\
                   <w:t>b</w:t><w:br/><w:t>c</w:t></w:r></w:p></w:body></w:document>";
        assert_eq!(document_xml_to_text(xml).unwrap(), "a\tb\nc\n");
    }

    #[test]
    fn test_scratch_file_removed_after_success() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = make_docx(&["Skills", "Rust"]);

        let text = extract_word(&bytes, Some(dir.path())).unwrap();

        assert!(text.contains("Rust"));
        assert_eq!(scratch_entries(dir.path()), 0);
    }

    #[test]
    fn test_scratch_file_removed_after_failure() {
        let dir = tempfile::tempdir().unwrap();

        let result = extract_word(b"PK but not really a zip", Some(dir.path()));

        assert!(result.is_err());
        assert_eq!(scratch_entries(dir.path()), 0);
    }

    #[test]
    fn test_archive_without_document_part_fails() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/styles.xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<styles/>").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        assert!(matches!(
            document_text(Cursor::new(bytes)),
            Err(ExtractionError::Zip(_))
        ));
    }
}
