use std::io::{Cursor, ErrorKind};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use image::ImageReader;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::media_ingestion::validation::{ImageKind, is_valid_image_id};

pub mod models;

pub use models::UploadedImage;

const MAX_ID_ATTEMPTS: usize = 4;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Image with ID '{0}' not found")]
    NotFound(String),

    #[error("Image '{id}' could not be decoded")]
    Undecodable {
        id: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Corrupt metadata for image '{id}'")]
    Metadata {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Storage I/O failed")]
    Io(#[from] std::io::Error),
}

/// Write-once image store on the local filesystem.
///
/// Each image is a payload file `{id}.{ext}` plus a `{id}.json` metadata
/// sidecar. The sidecar is written last, so an image exists only once both
/// files are in place.
#[derive(Debug, Clone)]
pub struct ImageStore {
    base_dir: PathBuf,
}

impl ImageStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub async fn init(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.base_dir).await?;
        Ok(())
    }

    pub async fn store(
        &self,
        file_data: &[u8],
        file_name: &str,
        kind: ImageKind,
        uploaded_at: DateTime<Utc>,
    ) -> Result<UploadedImage, StorageError> {
        fs::create_dir_all(&self.base_dir).await?;

        let record = UploadedImage {
            image_id: String::new(),
            filename: file_name.to_string(),
            size: file_data.len(),
            content_type: kind.mime_type().to_string(),
            uploaded_at,
        };

        for _ in 0..MAX_ID_ATTEMPTS {
            let image_id = Uuid::new_v4().simple().to_string();
            let payload_path = self.payload_path(&image_id, kind);
            let meta_path = self.meta_path(&image_id);

            let record = UploadedImage {
                image_id: image_id.clone(),
                ..record.clone()
            };

            match self
                .write_artifacts(&payload_path, &meta_path, file_data, &record)
                .await
            {
                Ok(()) => return Ok(record),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    tracing::warn!("Image id collision on {}, regenerating", image_id);
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(std::io::Error::new(
            ErrorKind::AlreadyExists,
            "could not allocate a unique image id",
        )
        .into())
    }

    pub async fn exists(&self, image_id: &str) -> Result<bool, StorageError> {
        match self.metadata(image_id).await {
            Ok(record) => Ok(path_exists(&self.payload_path_for(&record)).await?),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub async fn metadata(&self, image_id: &str) -> Result<UploadedImage, StorageError> {
        if !is_valid_image_id(image_id) {
            return Err(StorageError::NotFound(image_id.to_string()));
        }

        let raw = match fs::read(self.meta_path(image_id)).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(image_id.to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        serde_json::from_slice(&raw).map_err(|source| StorageError::Metadata {
            id: image_id.to_string(),
            source,
        })
    }

    pub async fn fetch(&self, image_id: &str) -> Result<Vec<u8>, StorageError> {
        let record = self.metadata(image_id).await?;
        match fs::read(self.payload_path_for(&record)).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(image_id.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Pixel size read from the stored image header.
    pub async fn dimensions(&self, image_id: &str) -> Result<(u32, u32), StorageError> {
        let bytes = self.fetch(image_id).await?;
        let undecodable = |source| StorageError::Undecodable {
            id: image_id.to_string(),
            source,
        };

        ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .into_dimensions()
            .map_err(undecodable)
    }

    async fn write_artifacts(
        &self,
        payload_path: &Path,
        meta_path: &Path,
        file_data: &[u8],
        record: &UploadedImage,
    ) -> std::io::Result<()> {
        let meta = serde_json::to_vec_pretty(record)?;

        write_new_file(payload_path, file_data).await?;
        if let Err(err) = write_new_file(meta_path, &meta).await {
            remove_quietly(payload_path).await;
            return Err(err);
        }
        Ok(())
    }

    fn payload_path(&self, image_id: &str, kind: ImageKind) -> PathBuf {
        self.base_dir.join(format!("{image_id}.{}", kind.extension()))
    }

    fn payload_path_for(&self, record: &UploadedImage) -> PathBuf {
        let kind = ImageKind::from_mime_type(&record.content_type).unwrap_or(ImageKind::Jpeg);
        self.payload_path(&record.image_id, kind)
    }

    fn meta_path(&self, image_id: &str) -> PathBuf {
        self.base_dir.join(format!("{image_id}.json"))
    }
}

/// Write to `{path}.part` and rename into place; the temp file never outlives
/// a failure.
async fn write_new_file(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if path_exists(path).await? {
        return Err(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("{} already exists", path.display()),
        ));
    }

    let mut part = path.as_os_str().to_owned();
    part.push(".part");
    let part_path = PathBuf::from(part);

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&part_path)
        .await?;

    let result = async {
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&part_path, path).await
    }
    .await;

    if result.is_err() {
        remove_quietly(&part_path).await;
    }
    result
}

async fn path_exists(path: &Path) -> std::io::Result<bool> {
    match fs::metadata(path).await {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(err) = fs::remove_file(path).await {
        if err.kind() != ErrorKind::NotFound {
            tracing::error!("Failed to remove partial file {}: {}", path.display(), err);
        }
    }
}
