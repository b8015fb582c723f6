//! Folder and multi-document digests.
//!
//! Results are produced lazily, one document at a time, so a consumer can
//! forward each summary as soon as it is ready.

use std::path::{Path, PathBuf};

use futures::Stream;
use serde::Serialize;
use walkdir::WalkDir;

use crate::error::{DigestError, Result};
use crate::extract::{SharedExtractor, extract_path, is_document};
use crate::summarize::{SourceDocument, SummarizationPipeline};

/// Reported when a folder holds no supported documents.
pub const NO_DOCUMENTS_MESSAGE: &str = "No supported files (.pdf, .docx, .txt, .csv) in this folder.";

/// Outcome for one document in a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DigestItem {
    pub name: String,
    #[serde(skip)]
    pub path: Option<PathBuf>,
    pub summary: String,
    pub error: Option<String>,
}

impl DigestItem {
    fn failed(name: impl Into<String>, path: Option<PathBuf>, error: String) -> Self {
        Self {
            name: name.into(),
            path,
            summary: String::new(),
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Resolve and check a user-supplied folder path.
///
/// When `allowed_bases` is non-empty the folder must be one of them or lie
/// beneath one.
pub fn validate_folder(raw: &str, allowed_bases: &[PathBuf]) -> Result<PathBuf> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(DigestError::MissingFolder);
    }

    let path = match std::fs::canonicalize(raw) {
        Ok(path) => path,
        Err(_) => {
            let shown = std::path::absolute(raw).unwrap_or_else(|_| PathBuf::from(raw));
            return Err(DigestError::FolderNotFound(shown));
        }
    };
    if !path.is_dir() {
        return Err(DigestError::NotADirectory(path));
    }

    if !allowed_bases.is_empty() {
        let allowed = allowed_bases.iter().any(|base| {
            let base = std::fs::canonicalize(base).unwrap_or_else(|_| base.clone());
            path.starts_with(&base)
        });
        if !allowed {
            return Err(DigestError::FolderNotAllowed(path));
        }
    }
    Ok(path)
}

/// Supported documents under `folder`, sorted by path.
pub fn collect_documents(folder: &Path, recursive: bool) -> Vec<PathBuf> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut paths: Vec<PathBuf> = WalkDir::new(folder)
        .min_depth(1)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_document(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    paths.sort();
    paths
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Item reported when the folder walk itself died.
fn scan_failure(folder: PathBuf, e: &tokio::task::JoinError) -> DigestItem {
    let error = format!("Folder scan failed: {}", e);
    tracing::error!(folder = %folder.display(), %error);
    DigestItem::failed(file_name(&folder), Some(folder), error)
}

/// Summarizes documents one by one.
#[derive(Clone)]
pub struct BatchSummarizer {
    pipeline: SummarizationPipeline,
    extractor: SharedExtractor,
}

impl BatchSummarizer {
    pub fn new(pipeline: SummarizationPipeline, extractor: SharedExtractor) -> Self {
        Self {
            pipeline,
            extractor,
        }
    }

    pub fn pipeline(&self) -> &SummarizationPipeline {
        &self.pipeline
    }

    /// Summarize every document in an already validated folder.
    ///
    /// An empty folder yields a single item carrying
    /// [`NO_DOCUMENTS_MESSAGE`]. Per-file failures are reported on that
    /// file's item and the batch continues.
    pub fn summarize_folder(
        &self,
        folder: PathBuf,
        recursive: bool,
        model: String,
    ) -> impl Stream<Item = DigestItem> + Send + use<> {
        let this = self.clone();
        async_stream::stream! {
            let scan = {
                let folder = folder.clone();
                tokio::task::spawn_blocking(move || collect_documents(&folder, recursive)).await
            };
            let paths = match scan {
                Ok(paths) => paths,
                Err(e) => {
                    yield scan_failure(folder, &e);
                    return;
                }
            };

            if paths.is_empty() {
                tracing::info!(folder = %folder.display(), "{}", NO_DOCUMENTS_MESSAGE);
                yield DigestItem::failed(file_name(&folder), Some(folder), NO_DOCUMENTS_MESSAGE.to_string());
                return;
            }

            tracing::info!(
                folder = %folder.display(),
                files = paths.len(),
                recursive,
                "Summarizing folder"
            );

            for path in paths {
                let name = file_name(&path);
                let text = match extract_path(this.extractor.clone(), path.clone()).await {
                    Ok(text) => text,
                    Err(e) => {
                        let error = format!("Failed to read file: {}", e);
                        tracing::warn!(file = %path.display(), %error);
                        yield DigestItem::failed(name, Some(path), error);
                        continue;
                    }
                };
                yield this.summarize_one(name, Some(path), &text, &model).await;
            }
        }
    }

    /// Summarize already extracted documents in the given order.
    pub fn summarize_documents(
        &self,
        documents: Vec<SourceDocument>,
        model: String,
    ) -> impl Stream<Item = DigestItem> + Send + use<> {
        let this = self.clone();
        async_stream::stream! {
            for doc in documents {
                yield this.summarize_one(doc.name, None, &doc.text, &model).await;
            }
        }
    }

    async fn summarize_one(
        &self,
        name: String,
        path: Option<PathBuf>,
        text: &str,
        model: &str,
    ) -> DigestItem {
        match self.pipeline.summarize(text, model).await {
            Ok(summary) => DigestItem {
                name,
                path,
                summary: summary.trim().to_string(),
                error: None,
            },
            Err(e) => {
                let error = format!("Summarization failed: {}", e);
                tracing::warn!(file = %name, %error);
                DigestItem::failed(name, path, error)
            }
        }
    }
}
