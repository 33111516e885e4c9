/// Disk-based attachment backend
use crate::{
    attachment_store::{
        attachment_file_name, public_path, AttachmentBackend, AttachmentLocation,
        PosterExtension, PreservedAttachment, WriteMode,
    },
    error::{CatalogError, CatalogResult},
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

/// Disk storage backend
///
/// Posters live flat in `base_path` as `<id-hex><ext>`. Uploads are first
/// written completely under `tmp_path` and only then moved into place, so
/// the derived path never holds a partially written poster.
#[derive(Clone)]
pub struct DiskAttachmentBackend {
    base_path: PathBuf,
    tmp_path: PathBuf,
}

impl DiskAttachmentBackend {
    /// Create a new disk storage backend
    pub fn new(base_path: PathBuf, tmp_path: PathBuf) -> Self {
        Self {
            base_path,
            tmp_path,
        }
    }

    /// Get the file path for a film's poster
    fn get_attachment_path(&self, film_id: Uuid, extension: PosterExtension) -> PathBuf {
        self.base_path
            .join(attachment_file_name(film_id, extension))
    }

    /// Ensure the attachment and staging directories exist
    async fn ensure_dirs(&self) -> CatalogResult<()> {
        for dir in [&self.base_path, &self.tmp_path] {
            fs::create_dir_all(dir).await.map_err(|e| {
                CatalogError::Storage(format!("Failed to create directory {:?}: {}", dir, e))
            })?;
        }
        Ok(())
    }

    /// Write the upload in full to a unique staging file
    async fn stage(&self, file_name: &str, data: &[u8]) -> CatalogResult<PathBuf> {
        let staged = self
            .tmp_path
            .join(format!("{}.{}.partial", file_name, Uuid::new_v4().simple()));

        let result = async {
            let mut file = fs::File::create(&staged).await?;
            file.write_all(data).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = result {
            discard(&staged).await;
            return Err(CatalogError::Storage(format!(
                "Failed to stage attachment {}: {}",
                file_name, e
            )));
        }

        Ok(staged)
    }
}

/// Best-effort removal of a staging file
async fn discard(staged: &Path) {
    if let Err(e) = fs::remove_file(staged).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Failed to remove staged upload {:?}: {}", staged, e);
        }
    }
}

#[async_trait]
impl AttachmentBackend for DiskAttachmentBackend {
    async fn write(
        &self,
        film_id: Uuid,
        data: &[u8],
        extension: PosterExtension,
        mode: WriteMode,
    ) -> CatalogResult<AttachmentLocation> {
        self.ensure_dirs().await?;

        let file_name = attachment_file_name(film_id, extension);
        let target = self.get_attachment_path(film_id, extension);
        let staged = self.stage(&file_name, data).await?;

        match mode {
            WriteMode::CreateNew => {
                // Linking fails instead of clobbering an existing poster
                let linked = fs::hard_link(&staged, &target).await;
                discard(&staged).await;
                match linked {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                        return Err(CatalogError::Storage(format!(
                            "Attachment {} already exists",
                            file_name
                        )));
                    }
                    Err(e) => {
                        return Err(CatalogError::Storage(format!(
                            "Failed to store attachment {}: {}",
                            file_name, e
                        )));
                    }
                }
            }
            WriteMode::Replace => {
                if let Err(e) = fs::rename(&staged, &target).await {
                    discard(&staged).await;
                    return Err(CatalogError::Storage(format!(
                        "Failed to replace attachment {}: {}",
                        file_name, e
                    )));
                }
            }
        }

        let location = AttachmentLocation {
            storage_path: target,
            public_path: public_path(film_id, extension),
        };
        tracing::debug!(
            "Stored attachment {:?} as {} ({} bytes)",
            location.storage_path,
            location.public_path,
            data.len()
        );

        Ok(location)
    }

    async fn delete(&self, film_id: Uuid, extension: PosterExtension) -> CatalogResult<()> {
        let path = self.get_attachment_path(film_id, extension);

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!("Removed attachment {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CatalogError::Storage(format!(
                "Failed to delete attachment {:?}: {}",
                path, e
            ))),
        }
    }

    async fn exists(&self, film_id: Uuid, extension: PosterExtension) -> CatalogResult<bool> {
        let path = self.get_attachment_path(film_id, extension);

        fs::try_exists(&path).await.map_err(|e| {
            CatalogError::Storage(format!("Failed to stat attachment {:?}: {}", path, e))
        })
    }

    async fn preserve(
        &self,
        film_id: Uuid,
        extension: PosterExtension,
    ) -> CatalogResult<Option<PreservedAttachment>> {
        self.ensure_dirs().await?;

        let file_name = attachment_file_name(film_id, extension);
        let target = self.get_attachment_path(film_id, extension);
        let backup_path = self
            .tmp_path
            .join(format!("{}.{}.previous", file_name, Uuid::new_v4().simple()));

        // A second link keeps the live poster in place while it is replaced
        match fs::hard_link(&target, &backup_path).await {
            Ok(()) => Ok(Some(PreservedAttachment {
                film_id,
                extension,
                backup_path,
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CatalogError::Storage(format!(
                "Failed to preserve attachment {}: {}",
                file_name, e
            ))),
        }
    }

    async fn restore(&self, preserved: PreservedAttachment) -> CatalogResult<()> {
        let target = self.get_attachment_path(preserved.film_id, preserved.extension);

        fs::rename(&preserved.backup_path, &target)
            .await
            .map_err(|e| {
                CatalogError::Storage(format!(
                    "Failed to restore attachment {:?}: {}",
                    target, e
                ))
            })?;

        tracing::debug!("Restored attachment {:?}", target);
        Ok(())
    }

    async fn release(&self, preserved: PreservedAttachment) -> CatalogResult<()> {
        match fs::remove_file(&preserved.backup_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CatalogError::Storage(format!(
                "Failed to release preserved attachment {:?}: {}",
                preserved.backup_path, e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn png() -> PosterExtension {
        PosterExtension::from_extension(".png").unwrap()
    }

    fn backend(dir: &Path) -> DiskAttachmentBackend {
        DiskAttachmentBackend::new(dir.join("attachments"), dir.join("tmp"))
    }

    #[tokio::test]
    async fn test_write_and_exists() {
        let dir = tempdir().unwrap();
        let backend = backend(dir.path());
        let id = Uuid::new_v4();

        let location = backend
            .write(id, b"poster bytes", png(), WriteMode::CreateNew)
            .await
            .unwrap();

        assert_eq!(location.public_path, format!("/attachments/{}.png", id.simple()));
        assert_eq!(fs::read(&location.storage_path).await.unwrap(), b"poster bytes");
        assert!(backend.exists(id, png()).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_new_refuses_collision() {
        let dir = tempdir().unwrap();
        let backend = backend(dir.path());
        let id = Uuid::new_v4();

        backend.write(id, b"first", png(), WriteMode::CreateNew).await.unwrap();
        let result = backend.write(id, b"second", png(), WriteMode::CreateNew).await;

        match result {
            Err(CatalogError::Storage(msg)) => assert!(msg.contains("already exists")),
            other => panic!("unexpected result: {:?}", other),
        }

        // The existing poster is untouched
        let path = backend.get_attachment_path(id, png());
        assert_eq!(fs::read(&path).await.unwrap(), b"first");
    }

    #[tokio::test]
    async fn test_replace_overwrites() {
        let dir = tempdir().unwrap();
        let backend = backend(dir.path());
        let id = Uuid::new_v4();

        backend.write(id, b"old", png(), WriteMode::CreateNew).await.unwrap();
        let location = backend.write(id, b"new", png(), WriteMode::Replace).await.unwrap();

        assert_eq!(fs::read(&location.storage_path).await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_no_staging_files_left_behind() {
        let dir = tempdir().unwrap();
        let backend = backend(dir.path());
        let id = Uuid::new_v4();

        backend.write(id, b"a", png(), WriteMode::CreateNew).await.unwrap();
        backend.write(id, b"b", png(), WriteMode::Replace).await.unwrap();
        let _ = backend.write(id, b"c", png(), WriteMode::CreateNew).await;

        let mut entries = fs::read_dir(dir.path().join("tmp")).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let backend = backend(dir.path());
        let id = Uuid::new_v4();

        backend.write(id, b"bye", png(), WriteMode::CreateNew).await.unwrap();
        backend.delete(id, png()).await.unwrap();
        assert!(!backend.exists(id, png()).await.unwrap());

        // Second delete of a missing poster still succeeds
        backend.delete(id, png()).await.unwrap();
    }

    #[tokio::test]
    async fn test_extension_is_part_of_path() {
        let dir = tempdir().unwrap();
        let backend = backend(dir.path());
        let id = Uuid::new_v4();
        let gif = PosterExtension::from_extension(".gif").unwrap();

        backend.write(id, b"png", png(), WriteMode::CreateNew).await.unwrap();

        assert!(!backend.exists(id, gif).await.unwrap());
        backend.delete(id, gif).await.unwrap();
        assert!(backend.exists(id, png()).await.unwrap());
    }

    #[tokio::test]
    async fn test_preserve_and_restore_undo_a_replace() {
        let dir = tempdir().unwrap();
        let backend = backend(dir.path());
        let id = Uuid::new_v4();

        backend.write(id, b"old", png(), WriteMode::CreateNew).await.unwrap();
        let preserved = backend.preserve(id, png()).await.unwrap().unwrap();
        let location = backend.write(id, b"new", png(), WriteMode::Replace).await.unwrap();
        assert_eq!(fs::read(&location.storage_path).await.unwrap(), b"new");

        backend.restore(preserved).await.unwrap();

        assert_eq!(fs::read(&location.storage_path).await.unwrap(), b"old");
        let mut entries = fs::read_dir(dir.path().join("tmp")).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_release_keeps_replacement() {
        let dir = tempdir().unwrap();
        let backend = backend(dir.path());
        let id = Uuid::new_v4();

        backend.write(id, b"old", png(), WriteMode::CreateNew).await.unwrap();
        let preserved = backend.preserve(id, png()).await.unwrap().unwrap();
        let backup = preserved.backup_path.clone();
        let location = backend.write(id, b"new", png(), WriteMode::Replace).await.unwrap();

        backend.release(preserved).await.unwrap();

        assert!(!backup.exists());
        assert_eq!(fs::read(&location.storage_path).await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_preserve_missing_poster() {
        let dir = tempdir().unwrap();
        let backend = backend(dir.path());

        assert!(backend.preserve(Uuid::new_v4(), png()).await.unwrap().is_none());
    }
}
