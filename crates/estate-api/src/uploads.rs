//! # Upload Storage
//!
//! Image uploads arrive as `multipart/form-data`. Each file is written under
//! the configured upload directory and served back at `/uploads/{name}`.
//!
//! Client file names are reduced to their last path component and a safe
//! character set, then prefixed with a timestamp and sequence number, so a
//! stored file can neither leave the upload directory nor replace another.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::Multipart;
use axum::http::StatusCode;
use chrono::Utc;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::AppError;

/// Largest accepted upload request.
pub const MAX_UPLOAD_BYTES: usize = 8 * 1024 * 1024;

/// URL prefix stored files are served under.
pub const PUBLIC_PREFIX: &str = "/uploads";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

const MAX_NAME_BYTES: usize = 128;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("must have a file name")]
    InvalidName,

    #[error("must be a jpg, jpeg, png, gif or webp image")]
    UnsupportedType,

    #[error("writing upload: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// Client mistakes become a field error on `field`; I/O failures are 500s.
    pub fn for_field(self, field: &str) -> AppError {
        match self {
            Self::Io(e) => AppError::Internal(format!("upload storage: {e}")),
            other => AppError::field(field, &other.to_string()),
        }
    }
}

/// Where uploaded files go.
#[async_trait]
pub trait UploadStore: Send + Sync {
    /// Persist `bytes` and return the public path the file is served at.
    async fn store(&self, file_name: &str, bytes: Bytes) -> Result<String, UploadError>;
}

/// Files on local disk under `root`.
#[derive(Debug)]
pub struct DiskUploads {
    root: PathBuf,
    sequence: AtomicU64,
}

impl DiskUploads {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl UploadStore for DiskUploads {
    async fn store(&self, file_name: &str, bytes: Bytes) -> Result<String, UploadError> {
        let clean = sanitize_file_name(file_name)?;
        let stored = format!(
            "{}-{}-{clean}",
            Utc::now().format("%Y%m%d%H%M%S"),
            self.sequence.fetch_add(1, Ordering::Relaxed)
        );

        fs::create_dir_all(&self.root).await?;
        let path = self.root.join(&stored);
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(&bytes).await?;
        file.flush().await?;

        tracing::debug!(file = %stored, size = bytes.len(), "stored upload");
        Ok(format!("{PUBLIC_PREFIX}/{stored}"))
    }
}

/// Reduce a client-supplied file name to a safe, single path component with
/// an image extension.
pub fn sanitize_file_name(raw: &str) -> Result<String, UploadError> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() || cleaned.len() > MAX_NAME_BYTES {
        return Err(UploadError::InvalidName);
    }

    let extension = Path::new(cleaned)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension {
        Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => Ok(cleaned.to_owned()),
        _ => Err(UploadError::UnsupportedType),
    }
}

/// A file part of a multipart form.
#[derive(Debug)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Bytes,
}

/// Collect every file sent under `field`. Other form fields are rejected.
pub async fn read_files(
    form: Result<Multipart, MultipartRejection>,
    field: &str,
) -> Result<Vec<UploadedFile>, AppError> {
    let mut form = form.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let mut files = Vec::new();
    while let Some(part) = form.next_field().await.map_err(multipart_error)? {
        let name = part.name().unwrap_or_default().to_owned();
        if name != field {
            return Err(AppError::BadRequest(format!("form has unknown field \"{name}\"")));
        }
        let Some(file_name) = part.file_name().map(str::to_owned) else {
            return Err(AppError::field(field, "must be a file upload"));
        };
        let bytes = part.bytes().await.map_err(multipart_error)?;
        files.push(UploadedFile { file_name, bytes });
    }
    Ok(files)
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::BadRequest(format!(
            "upload must not be larger than {MAX_UPLOAD_BYTES} bytes"
        ))
    } else {
        AppError::BadRequest(err.body_text())
    }
}
