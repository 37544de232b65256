use crate::error::IngestError;
use lopdf::Document;
use std::fs::File;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    /// Returns every page in page order, including blank ones; filtering
    /// short pages is the loader's job.
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let document =
            Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(error.to_string()))?;
            pages.push(PageText {
                number: page_no,
                text,
            });
        }

        Ok(pages)
    }
}

pub fn extract_page_texts(path: &Path) -> Result<Vec<PageText>, IngestError> {
    LopdfExtractor.extract_pages(path)
}

/// Reads `word/document.xml` out of the archive and returns one line per
/// paragraph.
pub fn extract_docx_text(path: &Path) -> Result<String, IngestError> {
    let file = File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|error| IngestError::DocxParse(format!("invalid archive: {error}")))?;

    let mut entry = archive
        .by_name("word/document.xml")
        .map_err(|_| IngestError::DocxParse("no word/document.xml in archive".to_string()))?;

    let mut xml = String::new();
    entry.read_to_string(&mut xml)?;

    Ok(docx_xml_to_text(&xml))
}

pub fn read_text_file(path: &Path) -> Result<String, IngestError> {
    Ok(std::fs::read_to_string(path)?)
}

fn docx_xml_to_text(xml: &str) -> String {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut chars = xml.chars();

    while let Some(character) = chars.next() {
        if character != '<' {
            if in_text {
                current.push(character);
            }
            continue;
        }

        let mut tag = String::new();
        for tag_char in chars.by_ref() {
            if tag_char == '>' {
                break;
            }
            tag.push(tag_char);
        }

        let self_closing = tag.ends_with('/');
        let name = tag
            .trim_end_matches('/')
            .split_whitespace()
            .next()
            .unwrap_or_default();

        match name {
            "w:t" if !self_closing => in_text = true,
            "/w:t" => in_text = false,
            "w:tab" => current.push('\t'),
            "w:br" => current.push('\n'),
            "/w:p" => paragraphs.push(std::mem::take(&mut current)),
            "w:p" if self_closing => paragraphs.push(String::new()),
            _ => {}
        }
    }

    if !current.is_empty() {
        paragraphs.push(current);
    }

    decode_entities(&paragraphs.join("\n"))
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
