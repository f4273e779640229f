//! Local media storage
//!
//! Guest uploads land under `images/` and `videos/`; QR tickets are read
//! from `qr-codes/`; broadcast samples from `samples/`.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Media file not found: {0}")]
    NotFound(String),
    #[error("Invalid media file name: {0}")]
    InvalidName(String),
    #[error("Media I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type MediaResult<T> = Result<T, MediaError>;

/// Folder within media storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFolder {
    Images,
    Videos,
    QrCodes,
    Samples,
}

impl MediaFolder {
    pub fn dir_name(self) -> &'static str {
        match self {
            MediaFolder::Images => "images",
            MediaFolder::Videos => "videos",
            MediaFolder::QrCodes => "qr-codes",
            MediaFolder::Samples => "samples",
        }
    }
}

#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Persist bytes under a fresh name; returns the stored file name
    async fn save(&self, folder: MediaFolder, mime_type: &str, data: &[u8]) -> MediaResult<String>;

    async fn load(&self, folder: MediaFolder, file_name: &str) -> MediaResult<Vec<u8>>;
}

#[async_trait]
impl<T: MediaStorage + ?Sized> MediaStorage for Arc<T> {
    async fn save(&self, folder: MediaFolder, mime_type: &str, data: &[u8]) -> MediaResult<String> {
        (**self).save(folder, mime_type, data).await
    }

    async fn load(&self, folder: MediaFolder, file_name: &str) -> MediaResult<Vec<u8>> {
        (**self).load(folder, file_name).await
    }
}

/// File extension for a MIME type; the subtype wins when it is a known extension
pub fn extension_for(mime_type: &str) -> String {
    let subtype = mime_type
        .split('/')
        .nth(1)
        .map(|sub| sub.split(';').next().unwrap_or(sub).trim())
        .filter(|sub| !sub.is_empty());
    let known = mime_guess::get_mime_extensions_str(mime_type).unwrap_or(&[]);

    match subtype {
        Some(sub) if known.is_empty() || known.iter().any(|ext| *ext == sub) => sub.to_string(),
        _ => known
            .first()
            .map_or_else(|| "bin".to_string(), |ext| (*ext).to_string()),
    }
}

/// MIME type guessed from a file name
pub fn mime_for(file_name: &str) -> String {
    mime_guess::from_path(file_name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Filesystem media storage rooted at a directory
#[derive(Debug, Clone)]
pub struct FsMediaStorage {
    root: PathBuf,
}

impl FsMediaStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn dir(&self, folder: MediaFolder) -> PathBuf {
        self.root.join(folder.dir_name())
    }

    fn resolve(&self, folder: MediaFolder, file_name: &str) -> MediaResult<PathBuf> {
        let name = Path::new(file_name);
        let mut components = name.components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.dir(folder).join(name)),
            _ => Err(MediaError::InvalidName(file_name.to_string())),
        }
    }
}

#[async_trait]
impl MediaStorage for FsMediaStorage {
    async fn save(&self, folder: MediaFolder, mime_type: &str, data: &[u8]) -> MediaResult<String> {
        let dir = self.dir(folder);
        tokio::fs::create_dir_all(&dir).await?;

        let kind = match folder {
            MediaFolder::Videos => "video",
            _ => "image",
        };
        let file_name = format!(
            "{}-{kind}.{}",
            uuid::Uuid::new_v4(),
            extension_for(mime_type)
        );
        tokio::fs::write(dir.join(&file_name), data).await?;
        tracing::debug!(folder = folder.dir_name(), file = %file_name, bytes = data.len(), "Stored media");
        Ok(file_name)
    }

    async fn load(&self, folder: MediaFolder, file_name: &str) -> MediaResult<Vec<u8>> {
        let path = self.resolve(folder, file_name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(MediaError::NotFound(file_name.to_string()))
            }
            Err(e) => Err(MediaError::Io(e)),
        }
    }
}
