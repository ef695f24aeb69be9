//! Sources of corpus text for ingestion.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::document::Document;
use crate::error::{RagError, Result};

/// Supplies the raw text an index is built from.
pub trait CorpusSource: Send + Sync {
    /// Return every document of the corpus in a stable order.
    fn documents(&self) -> Result<Vec<Document>>;

    /// Return the whole corpus as one string, documents joined by newlines.
    fn concatenated_text(&self) -> Result<String> {
        let documents = self.documents()?;
        let mut text = String::with_capacity(documents.iter().map(|d| d.text.len() + 1).sum());
        for document in &documents {
            text.push_str(&document.text);
            text.push('\n');
        }
        Ok(text)
    }
}

/// Extracted text files (`.txt` and `.md`) under a directory tree.
///
/// Files are visited recursively and ordered by path so repeated ingestion
/// runs see the same text.
#[derive(Debug, Clone)]
pub struct DirectoryCorpus {
    root: PathBuf,
}

impl DirectoryCorpus {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn files(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            error!(root = %self.root.display(), "corpus directory does not exist");
            return Err(RagError::Corpus(format!(
                "corpus directory '{}' does not exist",
                self.root.display()
            )));
        }

        let mut files = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| is_text_file(entry.path()))
            .map(|entry| entry.into_path())
            .collect::<Vec<_>>();

        files.sort();
        Ok(files)
    }
}

fn is_text_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "txt" || ext == "md")
}

impl CorpusSource for DirectoryCorpus {
    fn documents(&self) -> Result<Vec<Document>> {
        let files = self.files()?;
        if files.is_empty() {
            warn!(root = %self.root.display(), "corpus directory contains no text files");
        }

        let mut documents = Vec::with_capacity(files.len());
        for path in files {
            let text = fs::read_to_string(&path).map_err(|e| {
                error!(path = %path.display(), error = %e, "failed to read corpus file");
                RagError::Corpus(format!("failed to read '{}': {e}", path.display()))
            })?;
            let source = path
                .strip_prefix(&self.root)
                .unwrap_or(&path)
                .to_string_lossy()
                .into_owned();
            debug!(source = %source, chars = text.chars().count(), "read corpus file");
            documents.push(Document { source, text });
        }

        info!(root = %self.root.display(), documents = documents.len(), "read corpus");
        Ok(documents)
    }
}

/// A corpus held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticCorpus {
    documents: Vec<Document>,
}

impl StaticCorpus {
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    /// A corpus consisting of a single unnamed document.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(vec![Document { source: "inline".to_string(), text: text.into() }])
    }
}

impl CorpusSource for StaticCorpus {
    fn documents(&self) -> Result<Vec<Document>> {
        Ok(self.documents.clone())
    }
}
