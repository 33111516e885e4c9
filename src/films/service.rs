/// Film use cases
///
/// Each use case is a linear pipeline that stops at the first failure.
/// The poster file is always written before the record that points at it
/// and removed again if that record cannot be persisted, so a stored
/// `poster_path` never names a missing or partially written file.
use crate::{
    attachment_store::{self, AttachmentBackend, PosterExtension, PreservedAttachment, WriteMode},
    error::{CatalogError, CatalogResult},
    films::{Film, FilmFields, FilmPage, FilmRepository},
    permissions::PermissionGuard,
};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// An uploaded poster as received from the client
#[derive(Debug, Clone)]
pub struct PosterUpload {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Orchestrates the repository, the attachment store and the permission guard
#[derive(Clone)]
pub struct FilmService {
    repository: Arc<dyn FilmRepository>,
    attachments: Arc<dyn AttachmentBackend>,
    guard: Arc<dyn PermissionGuard>,
}

impl FilmService {
    pub fn new(
        repository: Arc<dyn FilmRepository>,
        attachments: Arc<dyn AttachmentBackend>,
        guard: Arc<dyn PermissionGuard>,
    ) -> Self {
        Self {
            repository,
            attachments,
            guard,
        }
    }

    /// One page of the catalog; `page` is 1-based
    pub async fn list(&self, page: u32, page_size: u32) -> CatalogResult<FilmPage> {
        if page == 0 {
            return Err(CatalogError::validation("page", "Page numbers start at 1"));
        }
        if page_size == 0 {
            return Err(CatalogError::validation("pageSize", "Page size must be positive"));
        }

        self.repository.get_page(page, page_size).await
    }

    pub async fn get(&self, id: Uuid) -> CatalogResult<Film> {
        self.repository
            .get_by_id(id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("Film {} not found", id)))
    }

    pub fn can_mutate(&self, caller_id: Option<&str>, film: &Film) -> bool {
        self.guard.can_mutate(caller_id, film)
    }

    pub async fn create(
        &self,
        caller_id: &str,
        fields: FilmFields,
        poster: Option<PosterUpload>,
    ) -> CatalogResult<Film> {
        let fields = fields.normalized();
        fields.validate()?;
        let poster = validate_poster(poster)?;

        let mut film = Film::new(caller_id, fields);

        let written = match poster {
            Some((upload, extension)) => {
                // A fresh id never has a poster yet, so a collision is fatal
                let location = self
                    .attachments
                    .write(film.id, &upload.data, extension, WriteMode::CreateNew)
                    .await?;
                film.poster_path = Some(location.public_path);
                Some(extension)
            }
            None => None,
        };

        match self.repository.create(&film).await {
            Ok(created) => {
                tracing::info!("Film {} created by {}", created.id, caller_id);
                Ok(created)
            }
            Err(e) => {
                if let Some(extension) = written {
                    self.discard_poster(film.id, extension).await;
                }
                Err(e)
            }
        }
    }

    /// Load a film and check that the caller may change it. Runs before any
    /// edit input is read so unknown and foreign films fail first.
    pub async fn authorize_edit(&self, caller_id: Option<&str>, id: Uuid) -> CatalogResult<Film> {
        let film = self.get(id).await?;
        self.authorize(caller_id, &film)?;
        Ok(film)
    }

    pub async fn edit(
        &self,
        caller_id: Option<&str>,
        id: Uuid,
        fields: FilmFields,
        poster: Option<PosterUpload>,
    ) -> CatalogResult<Film> {
        let mut film = self.authorize_edit(caller_id, id).await?;

        let fields = fields.normalized();
        fields.validate()?;
        let poster = validate_poster(poster)?;

        let previous = film.poster_extension();

        let mut preserved = None;
        let written = match poster {
            Some((upload, extension)) => {
                // Same path as the live poster: keep it until the record is saved
                if Some(extension) == previous {
                    preserved = self.attachments.preserve(film.id, extension).await?;
                }

                let location = match self
                    .attachments
                    .write(film.id, &upload.data, extension, WriteMode::Replace)
                    .await
                {
                    Ok(location) => location,
                    Err(e) => {
                        if let Some(preserved) = preserved {
                            self.release_poster(preserved).await;
                        }
                        return Err(e);
                    }
                };
                film.poster_path = Some(location.public_path);
                Some(extension)
            }
            None => None,
        };

        film.apply(fields);

        if let Err(e) = self.repository.update(&film).await {
            match (preserved, written) {
                (Some(preserved), _) => self.restore_poster(preserved).await,
                (None, Some(extension)) => self.discard_poster(film.id, extension).await,
                (None, None) => {}
            }
            return Err(e);
        }

        if let Some(preserved) = preserved {
            self.release_poster(preserved).await;
        }

        if let (Some(new), Some(old)) = (written, previous) {
            if new != old {
                self.attachments.delete(film.id, old).await?;
            }
        }

        tracing::info!("Film {} updated", film.id);

        Ok(film)
    }

    pub async fn delete(&self, caller_id: Option<&str>, id: Uuid) -> CatalogResult<()> {
        let film = self.get(id).await?;
        self.authorize(caller_id, &film)?;

        // Poster first: a record left pointing at a missing file heals on the
        // next edit, an unreferenced file would leak.
        if let Some(path) = &film.poster_path {
            let extension = PosterExtension::from_public_path(path).ok_or_else(|| {
                CatalogError::Internal(format!("Film {} has unrecognized poster {}", id, path))
            })?;
            self.attachments.delete(id, extension).await?;
        }

        self.repository.delete(id).await?;

        tracing::info!("Film {} deleted", id);

        Ok(())
    }

    fn authorize(&self, caller_id: Option<&str>, film: &Film) -> CatalogResult<()> {
        if self.guard.can_mutate(caller_id, film) {
            Ok(())
        } else {
            tracing::warn!(
                "Rejected mutation of film {} by {}",
                film.id,
                caller_id.unwrap_or("anonymous")
            );
            Err(CatalogError::Forbidden(format!(
                "Film {} may only be changed by its creator",
                film.id
            )))
        }
    }

    /// Undo a poster replacement whose record was never persisted
    async fn restore_poster(&self, preserved: PreservedAttachment) {
        let film_id = preserved.film_id;
        match self.attachments.restore(preserved).await {
            Ok(()) => tracing::warn!("Restored previous poster for film {}", film_id),
            Err(e) => tracing::error!(
                "Failed to restore previous poster for film {}: {}",
                film_id,
                e
            ),
        }
    }

    async fn release_poster(&self, preserved: PreservedAttachment) {
        let film_id = preserved.film_id;
        if let Err(e) = self.attachments.release(preserved).await {
            tracing::warn!("Failed to drop previous poster copy for film {}: {}", film_id, e);
        }
    }

    /// Compensating removal of a poster whose record was never persisted
    async fn discard_poster(&self, film_id: Uuid, extension: PosterExtension) {
        match self.attachments.delete(film_id, extension).await {
            Ok(()) => tracing::warn!("Rolled back poster for film {}", film_id),
            Err(e) => tracing::error!(
                "Failed to roll back poster for film {}: {}",
                film_id,
                e
            ),
        }
    }
}

fn validate_poster(
    poster: Option<PosterUpload>,
) -> CatalogResult<Option<(PosterUpload, PosterExtension)>> {
    poster
        .map(|upload| {
            let extension = attachment_store::validate(&upload.file_name)?;
            Ok((upload, extension))
        })
        .transpose()
}
