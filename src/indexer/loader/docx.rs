use super::Section;
use anyhow::{Context, Result};
use regex::Regex;
use std::io::{Cursor, Read};

const DOCUMENT_XML: &str = "word/document.xml";

/// Extract paragraph text from a Word (OOXML) document
///
/// Legacy binary `.doc` files are not zip archives and fail here.
pub(super) fn load(bytes: &[u8]) -> Result<Vec<Section>> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).context("Not a Word document archive")?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_XML)
        .with_context(|| format!("Archive has no {}", DOCUMENT_XML))?
        .read_to_string(&mut xml)
        .context("Failed to read document body")?;

    Ok(vec![Section::new(document_text(&xml)?)])
}

/// Concatenate `<w:t>` runs, breaking lines at paragraph ends
fn document_text(xml: &str) -> Result<String> {
    let token = Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>|</w:p>|<w:tab\s*/>|<w:br\s*/>")?;

    let mut text = String::new();
    for caps in token.captures_iter(xml) {
        match caps.get(1) {
            Some(run) => text.push_str(&unescape_xml(run.as_str())),
            None => match caps.get(0).map(|m| m.as_str()) {
                Some("</w:p>") => text.push('\n'),
                Some(tag) if tag.starts_with("<w:tab") => text.push('\t'),
                _ => text.push('\n'),
            },
        }
    }

    Ok(text)
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_bytes(body: &str) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buffer);
            let options = zip::write::SimpleFileOptions::default();
            writer.start_file(DOCUMENT_XML, options).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
            writer.finish().unwrap();
        }
        buffer.into_inner()
    }

    #[test]
    fn test_document_text() {
        let xml = r#"<w:document><w:body>
            <w:p><w:r><w:t>Enzymes</w:t></w:r><w:r><w:t xml:space="preserve"> lower activation energy</w:t></w:r></w:p>
            <w:p><w:r><w:t>A &amp; B &lt;C&gt;</w:t></w:r><w:r><w:tab/><w:t>tabbed</w:t></w:r></w:p>
        </w:body></w:document>"#;

        let text = document_text(xml).unwrap();
        assert_eq!(text, "Enzymes lower activation energy\nA & B <C>\ttabbed\n");
    }

    #[test]
    fn test_table_element_is_not_text() {
        let xml = "<w:p><w:tbl><w:t>cell</w:t></w:tbl></w:p>";
        assert_eq!(document_text(xml).unwrap(), "cell\n");
    }

    #[test]
    fn test_load_docx_archive() {
        let bytes = docx_bytes("<w:p><w:r><w:t>Hello docx</w:t></w:r></w:p>");
        let sections = load(&bytes).unwrap();
        assert_eq!(sections[0].text, "Hello docx\n");
    }

    #[test]
    fn test_archive_without_body() {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buffer);
            writer
                .start_file("other.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"<x/>").unwrap();
            writer.finish().unwrap();
        }

        let err = load(&buffer.into_inner()).unwrap_err();
        assert!(format!("{:#}", err).contains(DOCUMENT_XML));
    }

    #[test]
    fn test_not_a_zip() {
        assert!(load(b"plain bytes").is_err());
    }
}
