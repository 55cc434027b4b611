use domain::backend::AgentBackend;
use domain::models::{Document, DocumentKind, DocumentUpload};
use domain::store::{Action, Store};
use futures::future::join_all;
use shared::telemetry::Telemetry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Documents a session may hold unless configured otherwise.
pub const DEFAULT_MAX_FILES: usize = 10;

/// Local reasons to refuse a file before it reaches the network.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UploadRejection {
    #[error("no active session")]
    NoSession,
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("{name} is {size} bytes, the limit is {max}")]
    TooLarge { name: String, size: u64, max: u64 },
    #[error("the session already holds the maximum of {max} documents")]
    TooManyFiles { max: usize },
    #[error("could not read {0}")]
    Unreadable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Indexed(Document),
    /// Stored by the backend but not indexed.
    IndexedWithWarning { document: Document, warning: String },
    Failed { file_name: String, error: String },
}

impl UploadOutcome {
    pub fn document(&self) -> Option<&Document> {
        match self {
            Self::Indexed(document) | Self::IndexedWithWarning { document, .. } => Some(document),
            Self::Failed { .. } => None,
        }
    }

    fn failed(file_name: &str, error: impl std::fmt::Display) -> Self {
        Self::Failed {
            file_name: file_name.to_string(),
            error: error.to_string(),
        }
    }
}

pub struct UploadService<B> {
    backend: Arc<B>,
    store: Store,
    max_bytes: u64,
    max_files: usize,
}

impl<B: AgentBackend> UploadService<B> {
    pub fn new(backend: Arc<B>, store: Store, max_bytes: u64) -> Self {
        Self {
            backend,
            store,
            max_bytes,
            max_files: DEFAULT_MAX_FILES,
        }
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    pub fn validate(&self, file_name: &str, size: u64) -> Result<DocumentKind, UploadRejection> {
        let kind = DocumentKind::detect(file_name)
            .filter(|k| *k != DocumentKind::Site)
            .ok_or_else(|| UploadRejection::UnsupportedType(file_name.to_string()))?;
        if size > self.max_bytes {
            return Err(UploadRejection::TooLarge {
                name: file_name.to_string(),
                size,
                max: self.max_bytes,
            });
        }
        Ok(kind)
    }

    /// Uploads still in flight count against the limit.
    fn check_capacity(&self) -> Result<(), UploadRejection> {
        let held = self
            .store
            .select(|s| s.documents.len() + s.upload_count);
        if held >= self.max_files {
            return Err(UploadRejection::TooManyFiles {
                max: self.max_files,
            });
        }
        Ok(())
    }

    /// Reads `path` from disk and uploads it. Kind and size are checked from
    /// the file metadata before any byte is read.
    pub async fn upload_path(&self, path: &Path) -> UploadOutcome {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let size = match tokio::fs::metadata(path).await {
            Ok(meta) => meta.len(),
            Err(err) => {
                tracing::warn!(target: "oraculo::upload", path = %path.display(), error = %err, "cannot stat file");
                return UploadOutcome::failed(&file_name, UploadRejection::Unreadable(path.display().to_string()));
            }
        };
        if let Err(rejection) = self.validate(&file_name, size) {
            tracing::warn!(target: "oraculo::upload", file = %file_name, %rejection, "upload rejected");
            return UploadOutcome::failed(&file_name, rejection);
        }
        match tokio::fs::read(path).await {
            Ok(bytes) => self.upload(DocumentUpload::new(file_name, bytes)).await,
            Err(err) => {
                tracing::warn!(target: "oraculo::upload", path = %path.display(), error = %err, "cannot read file");
                UploadOutcome::failed(&file_name, UploadRejection::Unreadable(path.display().to_string()))
            }
        }
    }

    /// Uploads several files at once. Results come back in input order.
    pub async fn upload_many(&self, paths: &[PathBuf]) -> Vec<UploadOutcome> {
        join_all(paths.iter().map(|path| self.upload_path(path))).await
    }

    pub async fn upload(&self, upload: DocumentUpload) -> UploadOutcome {
        let file_name = upload.file_name.clone();
        let size = upload.size_bytes();

        let Some(session_id) = self.store.select(|s| s.session_id.clone()) else {
            return UploadOutcome::failed(&file_name, UploadRejection::NoSession);
        };
        let kind = match self
            .validate(&file_name, size)
            .and_then(|kind| self.check_capacity().map(|()| kind))
        {
            Ok(kind) => kind,
            Err(rejection) => {
                tracing::warn!(target: "oraculo::upload", file = %file_name, %rejection, "upload rejected");
                return UploadOutcome::failed(&file_name, rejection);
            }
        };

        let telemetry = Telemetry::new();
        let in_flight = self
            .store
            .hold(Action::IncrementUpload, Action::DecrementUpload);
        let result = self.backend.upload_document(&session_id, upload).await;
        drop(in_flight);

        let result = match result {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(target: "oraculo::upload", file = %file_name, error = %format!("{err:#}"), "upload failed");
                return UploadOutcome::failed(&file_name, format!("{err:#}"));
            }
        };

        if let Some(stats) = result.rag_stats {
            self.store.dispatch(Action::SetRagStats(Some(stats)));
        }
        let document = Document::new(&file_name, kind, size);
        self.store.dispatch(Action::AddDocument(document.clone()));
        tracing::info!(
            target: "oraculo::upload",
            file = %file_name,
            elapsed_ms = telemetry.elapsed_ms() as u64,
            indexed = result.rag_error.is_none(),
            "document uploaded"
        );

        match result.rag_error {
            Some(warning) => UploadOutcome::IndexedWithWarning { document, warning },
            None => UploadOutcome::Indexed(document),
        }
    }

    /// Drops a document from the local list. Returns whether it was there.
    pub fn remove(&self, document_id: &str) -> bool {
        let present = self
            .store
            .select(|s| s.documents.iter().any(|d| d.id == document_id));
        self.store.dispatch(Action::RemoveDocument(document_id.to_string()));
        present
    }
}
