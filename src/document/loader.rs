use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use super::Document;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),
    #[error("Failed to read {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("Failed to extract text from {path}: {message}")]
    Extraction { path: PathBuf, message: String },
}

/// Loads every file with a matching extension under a directory, recursively,
/// as one `Document` per file.
#[derive(Debug, Clone)]
pub struct DirectoryLoader {
    dir: PathBuf,
    extension: String,
    silent_errors: bool,
}

impl DirectoryLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            extension: "pdf".to_string(),
            silent_errors: false,
        }
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    /// Log and skip unreadable files instead of failing the whole load.
    pub fn silent_errors(mut self, silent: bool) -> Self {
        self.silent_errors = silent;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Paths of all matching files, sorted by file name at every level.
    pub fn matching_files(&self) -> Result<Vec<PathBuf>, DocumentError> {
        if !self.dir.is_dir() {
            return Err(DocumentError::DirectoryNotFound(self.dir.clone()));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.dir).follow_links(true).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if self.silent_errors => {
                    log::warn!("Skipping unreadable entry under {}: {}", self.dir.display(), e);
                    continue;
                }
                Err(e) => {
                    return Err(DocumentError::Walk {
                        path: self.dir.clone(),
                        source: e,
                    })
                }
            };

            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let matches = path
                .extension()
                .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(&self.extension))
                .unwrap_or(false);
            if matches {
                files.push(path.to_path_buf());
            }
        }

        Ok(files)
    }

    pub async fn load(&self) -> Result<Vec<Document>, DocumentError> {
        let files = self.matching_files()?;
        log::info!(
            "Found {} .{} file(s) in {}",
            files.len(),
            self.extension,
            self.dir.display()
        );

        let mut documents = Vec::with_capacity(files.len());
        for path in files {
            log::debug!("Extracting text from {}", path.display());
            match extract_pdf_text(path.clone()).await {
                Ok(text) => {
                    documents.push(Document::new(text, path.to_string_lossy()));
                }
                Err(message) if self.silent_errors => {
                    log::warn!("Skipping {}: {}", path.display(), message);
                }
                Err(message) => return Err(DocumentError::Extraction { path, message }),
            }
        }

        log::info!("Loaded {} document(s)", documents.len());
        Ok(documents)
    }
}

async fn extract_pdf_text(path: PathBuf) -> Result<String, String> {
    // pdf-extract is blocking and can panic on malformed input; the blocking
    // pool turns a panic into a JoinError.
    tokio::task::spawn_blocking(move || pdf_extract::extract_text(&path).map_err(|e| e.to_string()))
        .await
        .map_err(|e| format!("extraction task failed: {}", e))?
}
