use crate::extractor::{extract_docx_text, extract_page_texts, read_text_file};
use crate::models::{Chunk, DocumentType, IngestionOptions};
use crate::text::clean;
use crate::IngestError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Loads supported files into cleaned, metadata-tagged documents ready for
/// chunking.
#[derive(Debug, Clone)]
pub struct DocumentLoader {
    min_content_chars: usize,
}

impl Default for DocumentLoader {
    fn default() -> Self {
        Self::new(&IngestionOptions::default())
    }
}

impl DocumentLoader {
    pub fn new(options: &IngestionOptions) -> Self {
        Self {
            min_content_chars: options.min_content_chars,
        }
    }

    /// PDFs yield one document per page with enough text, the other types
    /// one document per file.
    pub fn load_file(&self, path: &Path) -> Result<Vec<Chunk>, IngestError> {
        if !path.exists() {
            return Err(IngestError::NotFound(path.display().to_string()));
        }

        let document_type = DocumentType::from_path(path).ok_or_else(|| {
            let extension = path
                .extension()
                .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
                .unwrap_or_default();
            IngestError::UnsupportedType(extension)
        })?;

        let source = file_name(path)?;
        debug!(path = %path.display(), %document_type, "loading document");

        let documents = match document_type {
            DocumentType::Pdf => self.load_pdf(path, &source)?,
            DocumentType::Docx => {
                let text = clean(&extract_docx_text(path)?);
                vec![Chunk::for_source(text, &source, DocumentType::Docx)]
            }
            DocumentType::Txt => {
                let text = clean(&read_text_file(path)?);
                vec![Chunk::for_source(text, &source, DocumentType::Txt)]
            }
        };

        if documents.is_empty() {
            return Err(IngestError::EmptyContent(source));
        }
        for document in &documents {
            self.validate_document(document)?;
        }

        info!(source = %source, documents = documents.len(), "loaded document");
        Ok(documents)
    }

    fn load_pdf(&self, path: &Path, source: &str) -> Result<Vec<Chunk>, IngestError> {
        let pages = extract_page_texts(path)?;
        let total = pages.len();

        let documents = pages
            .into_iter()
            .filter_map(|page| {
                let text = clean(&page.text);
                if self.is_substantive(&text) {
                    Some(Chunk::for_source(text, source, DocumentType::Pdf).with_page(page.number))
                } else {
                    None
                }
            })
            .collect::<Vec<_>>();

        if documents.len() < total {
            debug!(
                source,
                skipped = total - documents.len(),
                "skipped pdf pages without substantive text"
            );
        }
        Ok(documents)
    }

    /// Rejects documents without required metadata or with too little text.
    pub fn validate_document(&self, document: &Chunk) -> Result<(), IngestError> {
        document.validate_metadata()?;
        if !self.is_substantive(&document.content) {
            return Err(IngestError::EmptyContent(
                document.source().unwrap_or("document").to_string(),
            ));
        }
        Ok(())
    }

    fn is_substantive(&self, text: &str) -> bool {
        text.trim().chars().count() >= self.min_content_chars
    }
}

fn file_name(path: &Path) -> Result<String, IngestError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))
}

pub fn discover_documents(folder: &Path) -> Vec<PathBuf> {
    let mut files = WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| DocumentType::from_path(entry.path()).is_some())
        .map(|entry| entry.path().to_path_buf())
        .collect::<Vec<_>>();

    files.sort_unstable();
    files
}
