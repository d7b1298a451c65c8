//! File catalog — durable material-list snapshots under the upload directory.
//!
//! The session core never touches this: a client saves explicitly over HTTP,
//! and in-memory edits that were never saved are gone when the last viewer
//! leaves.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use matlist_protocol::Row;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::parser::parse_rows;

/// Extensions the catalog will read or write.
const ALLOWED_EXTENSIONS: [&str; 2] = ["csv", "mtl"];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid filename: {0}")]
    InvalidFilename(String),

    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("failed to parse {name}: {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Listing entry for one stored file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub filename: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// The material-list file store.
pub struct Catalog {
    upload_dir: PathBuf,
}

impl Catalog {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
        }
    }

    /// Ensure the upload directory exists. Called once at startup.
    pub async fn init(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        info!("Upload directory ready: {}", self.upload_dir.display());
        Ok(())
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Strip a caller-supplied filename down to a safe basename and check the
    /// extension. Rejecting everything but a known character set also kills
    /// path traversal — separators are not in the set.
    fn resolve(&self, name: &str) -> Result<PathBuf, CatalogError> {
        let sanitized = sanitize_filename(name);
        if sanitized.is_empty() {
            return Err(CatalogError::InvalidFilename(name.to_string()));
        }
        if !has_allowed_extension(&sanitized) {
            return Err(CatalogError::UnsupportedType(sanitized));
        }
        Ok(self.upload_dir.join(sanitized))
    }

    /// List stored material-list files.
    pub async fn list(&self) -> Result<Vec<FileEntry>, CatalogError> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.upload_dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let filename = entry.file_name().to_string_lossy().to_string();
            if !has_allowed_extension(&filename) {
                continue;
            }
            let meta = entry.metadata().await?;
            entries.push(FileEntry {
                filename,
                size: meta.len(),
                modified: meta.modified().ok().map(DateTime::<Utc>::from),
            });
        }
        entries.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(entries)
    }

    /// Read and parse a stored file into rows.
    pub async fn load(&self, name: &str) -> Result<Vec<Row>, CatalogError> {
        let path = self.resolve(name)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CatalogError::NotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        parse_rows(&content).map_err(|source| CatalogError::Parse {
            name: name.to_string(),
            source,
        })
    }

    /// Write rows as a `.mtl` snapshot (record-form JSON). A `.csv` name is
    /// rewritten to `.mtl` — saves always normalize.
    pub async fn save(&self, name: &str, rows: &[Row]) -> Result<FileEntry, CatalogError> {
        let path = self.resolve(name)?.with_extension("mtl");
        let json = serde_json::to_string_pretty(rows).map_err(|source| CatalogError::Parse {
            name: name.to_string(),
            source,
        })?;
        tokio::fs::write(&path, json).await?;

        let meta = tokio::fs::metadata(&path).await?;
        let filename = path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| name.to_string());
        info!("Saved {} ({} rows)", filename, rows.len());
        Ok(FileEntry {
            filename,
            size: meta.len(),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    /// Store a raw uploaded body under `name` and return its parsed rows.
    /// A body that fails to parse is not kept.
    pub async fn import(&self, name: &str, body: &str) -> Result<Vec<Row>, CatalogError> {
        let path = self.resolve(name)?;
        let rows = parse_rows(body).map_err(|source| {
            warn!("Rejected upload {name}: unparseable body");
            CatalogError::Parse {
                name: name.to_string(),
                source,
            }
        })?;
        tokio::fs::write(&path, body).await?;
        info!("Imported {} ({} rows)", name, rows.len());
        Ok(rows)
    }

    /// Delete a stored file.
    pub async fn delete(&self, name: &str) -> Result<(), CatalogError> {
        let path = self.resolve(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted {name}");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CatalogError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Keep alphanumerics plus space, dot, underscore, and dash; drop the rest.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '.' | '_' | '-'))
        .collect::<String>()
        .trim_end()
        .to_string()
}

fn has_allowed_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}
