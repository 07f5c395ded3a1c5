use std::path::{Path, PathBuf};

use thiserror::Error;

use super::ReceiptImage;

#[derive(Error, Debug)]
pub enum ImageStoreError {
    #[error("Receipt image {0} not found")]
    NotFound(i64),

    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Source of previously stored receipt images.
pub trait ImageStore: Send + Sync {
    fn load(&self, receipt_image_id: i64) -> Result<ReceiptImage, ImageStoreError>;
}

/// Images stored as `<root>/<id>.<ext>`.
#[derive(Debug, Clone)]
pub struct FsImageStore {
    root: PathBuf,
}

impl FsImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes an image under the given id, replacing nothing else.
    pub fn save(&self, receipt_image_id: i64, image: &ReceiptImage) -> Result<PathBuf, ImageStoreError> {
        std::fs::create_dir_all(&self.root).map_err(|e| ImageStoreError::Io {
            path: self.root.clone(),
            source: e,
        })?;
        let path = self
            .root
            .join(format!("{}.{}", receipt_image_id, image.extension()));
        std::fs::write(&path, &image.bytes).map_err(|e| ImageStoreError::Io {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }

    fn find(&self, receipt_image_id: i64) -> Result<PathBuf, ImageStoreError> {
        let wanted = receipt_image_id.to_string();
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ImageStoreError::NotFound(receipt_image_id))
            }
            Err(e) => {
                return Err(ImageStoreError::Io {
                    path: self.root.clone(),
                    source: e,
                })
            }
        };

        entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .find(|path| path.file_stem().and_then(|s| s.to_str()) == Some(wanted.as_str()))
            .ok_or(ImageStoreError::NotFound(receipt_image_id))
    }
}

impl ImageStore for FsImageStore {
    fn load(&self, receipt_image_id: i64) -> Result<ReceiptImage, ImageStoreError> {
        let path = self.find(receipt_image_id)?;
        log::debug!(
            "Loading receipt image {} from {}",
            receipt_image_id,
            crate::sanitize::redact_path(&path)
        );
        ReceiptImage::from_path(&path).map_err(|e| ImageStoreError::Io { path, source: e })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsImageStore::new(dir.path().join("images"));

        let image = ReceiptImage::new(vec![0x89, 0x50, 0x4e, 0x47], "image/png");
        let path = store.save(42, &image).unwrap();
        assert!(path.ends_with("42.png"));

        let loaded = store.load(42).unwrap();
        assert_eq!(loaded.bytes, image.bytes);
        assert_eq!(loaded.mime_type, "image/png");
        assert_eq!(loaded.file_name.as_deref(), Some("42.png"));
    }

    #[test]
    fn test_missing_image() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsImageStore::new(dir.path());
        std::fs::write(dir.path().join("420.png"), b"x").unwrap();

        assert!(matches!(store.load(42), Err(ImageStoreError::NotFound(42))));
    }

    #[test]
    fn test_missing_root_is_not_found() {
        let store = FsImageStore::new("/nonexistent/receiptflow-images");
        assert!(matches!(store.load(1), Err(ImageStoreError::NotFound(1))));
    }
}
