use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::domain::{
    ImageId, ListingCategory, ListingImageRecord, ListingRecord, ListingType, SubscriptionTier,
};
use super::draft::{ImagePolicy, ImageRejection, ImageUpload, ListingDraft};
use super::repository::{ImageStorage, ListingRepository, StorageError};
use super::validation::{
    validate_draft, validate_step, PublishStep, ValidationErrors, MISSING_IMAGES,
};
use crate::workflows::shared::{CallerIdentity, ErrorKind, ListingId, RepositoryError, UserId};

/// Outcome of a successful publish or edit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishReceipt {
    pub listing_id: ListingId,
    pub images: Vec<ListingImageRecord>,
}

/// What to undo when an image cannot be attached.
#[derive(Debug, Clone, Copy)]
enum Rollback {
    /// New listing: drop the listing row and every image row.
    Listing,
    /// Edit: drop only the images added in this attempt.
    AddedImages,
}

/// Turns a complete draft into a listing row plus its image rows and blobs.
///
/// The listing is written first, then images are uploaded one at a time in
/// draft order. Any image failure removes everything written so far.
pub struct ListingPublisher<R, S> {
    repository: Arc<R>,
    storage: Arc<S>,
    policy: ImagePolicy,
}

impl<R, S> ListingPublisher<R, S>
where
    R: ListingRepository + 'static,
    S: ImageStorage + 'static,
{
    pub fn new(repository: Arc<R>, storage: Arc<S>, policy: ImagePolicy) -> Self {
        Self {
            repository,
            storage,
            policy,
        }
    }

    pub fn policy(&self) -> ImagePolicy {
        self.policy
    }

    pub fn publish(
        &self,
        caller: &CallerIdentity,
        draft: &ListingDraft,
    ) -> Result<PublishReceipt, PublishError> {
        let owner_id = caller.user_id().ok_or(PublishError::Unauthenticated)?;
        let (category, listing_type) = checked_draft(draft)?;
        // only uploads count toward a new listing's images
        if draft.images.is_empty() {
            let mut errors = ValidationErrors::new();
            errors.insert("images", MISSING_IMAGES);
            return Err(PublishError::Incomplete {
                step: PublishStep::Images,
                errors,
            });
        }
        self.check_images(draft)?;
        self.check_quota(owner_id)?;

        let record = listing_row(
            ListingId(Uuid::new_v4().to_string()),
            owner_id.clone(),
            category,
            listing_type,
            draft,
            Utc::now(),
        );
        let listing = self.repository.insert_listing(record).map_err(|err| {
            error!(owner_id = %owner_id, error = %err, "failed to create listing");
            PublishError::CreateFailed(err)
        })?;
        info!(
            listing_id = %listing.id,
            owner_id = %owner_id,
            category = category.label(),
            "listing created"
        );

        let images = self.attach_images(&listing.id, &draft.images, 0, Rollback::Listing)?;
        info!(listing_id = %listing.id, images = images.len(), "listing published");

        Ok(PublishReceipt {
            listing_id: listing.id,
            images,
        })
    }

    /// Saves an edited draft over a listing the caller owns.
    ///
    /// `existing_image_ids` lists the kept images in their new order; stored
    /// images missing from it are deleted, and new uploads follow the kept ones.
    pub fn update(
        &self,
        caller: &CallerIdentity,
        listing_id: &ListingId,
        draft: &ListingDraft,
    ) -> Result<PublishReceipt, PublishError> {
        let editor_id = caller.user_id().ok_or(PublishError::Unauthenticated)?;
        let current = self
            .repository
            .fetch_listing(listing_id)
            .map_err(|err| self.update_failed(listing_id, "load listing", err))?
            .ok_or(PublishError::ListingNotFound)?;
        if &current.owner_id != editor_id {
            warn!(listing_id = %listing_id, editor_id = %editor_id, "edit by non-owner rejected");
            return Err(PublishError::NotOwner);
        }
        let (category, listing_type) = checked_draft(draft)?;
        self.check_images(draft)?;

        let stored = self
            .repository
            .listing_images(listing_id)
            .map_err(|err| self.update_failed(listing_id, "load images", err))?;
        let mut kept: Vec<ListingImageRecord> =
            Vec::with_capacity(draft.existing_image_ids.len());
        for id in &draft.existing_image_ids {
            if kept.iter().any(|image| &image.id == id) {
                continue;
            }
            let image = stored
                .iter()
                .find(|image| &image.id == id)
                .cloned()
                .ok_or_else(|| PublishError::UnknownImage(id.clone()))?;
            kept.push(image);
        }
        let dropped: Vec<ListingImageRecord> = stored
            .into_iter()
            .filter(|image| !kept.iter().any(|keep| keep.id == image.id))
            .collect();

        let added =
            self.attach_images(listing_id, &draft.images, kept.len(), Rollback::AddedImages)?;

        let record = ListingRecord {
            is_active: current.is_active,
            is_featured: current.is_featured,
            views_count: current.views_count,
            created_at: current.created_at,
            ..listing_row(
                current.id.clone(),
                current.owner_id.clone(),
                category,
                listing_type,
                draft,
                Utc::now(),
            )
        };
        if let Err(err) = self.repository.update_listing(record) {
            let paths: Vec<String> = added
                .iter()
                .map(|image| image.storage_path.clone())
                .collect();
            self.roll_back(listing_id, &paths, &added, Rollback::AddedImages);
            return Err(self.update_failed(listing_id, "save listing", err));
        }

        for (index, image) in kept.iter_mut().enumerate() {
            let position = image_position(index);
            if image.position != position {
                self.repository
                    .set_image_position(&image.id, position)
                    .map_err(|err| self.update_failed(listing_id, "reorder images", err))?;
                image.position = position;
            }
        }
        for image in &dropped {
            self.repository
                .delete_image(&image.id)
                .map_err(|err| self.update_failed(listing_id, "delete image", err))?;
        }
        if !dropped.is_empty() {
            let paths: Vec<String> = dropped
                .iter()
                .map(|image| image.storage_path.clone())
                .collect();
            if let Err(err) = self.storage.remove(&paths) {
                warn!(listing_id = %listing_id, error = %err, "failed to remove dropped images");
            }
        }

        info!(
            listing_id = %listing_id,
            kept = kept.len(),
            added = added.len(),
            dropped = dropped.len(),
            "listing updated"
        );
        kept.extend(added);
        Ok(PublishReceipt {
            listing_id: listing_id.clone(),
            images: kept,
        })
    }

    fn update_failed(
        &self,
        listing_id: &ListingId,
        stage: &str,
        err: RepositoryError,
    ) -> PublishError {
        error!(listing_id = %listing_id, stage, error = %err, "failed to update listing");
        PublishError::UpdateFailed(err)
    }

    fn check_quota(&self, owner_id: &UserId) -> Result<(), PublishError> {
        let tier = self
            .repository
            .subscription_tier(owner_id)
            .map_err(|err| {
                error!(owner_id = %owner_id, error = %err, "failed to load subscription tier");
                PublishError::CreateFailed(err)
            })?
            .unwrap_or_default();
        let Some(limit) = tier.active_listing_limit() else {
            return Ok(());
        };
        let active = self
            .repository
            .count_active_listings(owner_id)
            .map_err(|err| {
                error!(owner_id = %owner_id, error = %err, "failed to count active listings");
                PublishError::CreateFailed(err)
            })?;
        if active >= limit {
            warn!(
                owner_id = %owner_id,
                tier = tier.code(),
                active,
                limit,
                "active listing quota reached"
            );
            return Err(PublishError::QuotaExceeded { tier, limit });
        }
        Ok(())
    }

    fn check_images(&self, draft: &ListingDraft) -> Result<(), PublishError> {
        let max = self.policy.max_images;
        if draft.image_count() > max {
            let file_name = draft
                .images
                .get(max.saturating_sub(draft.existing_image_ids.len()))
                .map(|image| image.file_name.clone())
                .unwrap_or_default();
            return Err(PublishError::ImageRejected {
                file_name,
                reason: ImageRejection::LimitReached { max },
            });
        }
        for image in &draft.images {
            self.policy
                .check_file(image)
                .map_err(|reason| PublishError::ImageRejected {
                    file_name: image.file_name.clone(),
                    reason,
                })?;
        }
        Ok(())
    }

    fn attach_images(
        &self,
        listing_id: &ListingId,
        images: &[ImageUpload],
        first_position: usize,
        rollback: Rollback,
    ) -> Result<Vec<ListingImageRecord>, PublishError> {
        let mut uploaded = Vec::with_capacity(images.len());
        let mut records = Vec::with_capacity(images.len());

        for (offset, image) in images.iter().enumerate() {
            let position = first_position + offset;
            let path = format!(
                "{listing_id}/{position:02}-{}.{}",
                Uuid::new_v4(),
                image.extension()
            );
            match self.store_image(listing_id, position, &path, image, &mut uploaded) {
                Ok(record) => records.push(record),
                Err(cause) => {
                    error!(
                        listing_id = %listing_id,
                        file_name = %image.file_name,
                        error = %cause,
                        ?rollback,
                        "image upload failed; rolling back"
                    );
                    self.roll_back(listing_id, &uploaded, &records, rollback);
                    return Err(PublishError::ImageUploadFailed {
                        file_name: image.file_name.clone(),
                        cause,
                    });
                }
            }
        }

        Ok(records)
    }

    fn store_image(
        &self,
        listing_id: &ListingId,
        position: usize,
        path: &str,
        image: &ImageUpload,
        uploaded: &mut Vec<String>,
    ) -> Result<ListingImageRecord, ImageFailure> {
        let url = self.storage.upload(path, image)?;
        uploaded.push(path.to_string());

        let record = ListingImageRecord {
            id: ImageId(Uuid::new_v4().to_string()),
            listing_id: listing_id.clone(),
            url,
            storage_path: path.to_string(),
            position: image_position(position),
            created_at: Utc::now(),
        };
        Ok(self.repository.insert_image(record)?)
    }

    fn roll_back(
        &self,
        listing_id: &ListingId,
        uploaded: &[String],
        records: &[ListingImageRecord],
        rollback: Rollback,
    ) {
        if !uploaded.is_empty() {
            if let Err(err) = self.storage.remove(uploaded) {
                warn!(listing_id = %listing_id, error = %err, "failed to remove uploaded images");
            }
        }
        match rollback {
            Rollback::Listing => {
                if let Err(err) = self.repository.delete_images(listing_id) {
                    warn!(listing_id = %listing_id, error = %err, "failed to delete image rows");
                }
                if let Err(err) = self.repository.delete_listing(listing_id) {
                    error!(listing_id = %listing_id, error = %err, "failed to delete listing after image failure");
                }
            }
            Rollback::AddedImages => {
                for record in records {
                    if let Err(err) = self.repository.delete_image(&record.id) {
                        warn!(listing_id = %listing_id, image_id = %record.id, error = %err, "failed to delete added image row");
                    }
                }
            }
        }
    }
}

fn checked_draft(draft: &ListingDraft) -> Result<(ListingCategory, ListingType), PublishError> {
    validate_draft(draft).map_err(|(step, errors)| PublishError::Incomplete { step, errors })?;
    match (draft.category, draft.listing_type) {
        (Some(category), Some(listing_type)) => Ok((category, listing_type)),
        _ => Err(PublishError::Incomplete {
            step: PublishStep::Category,
            errors: validate_step(draft, PublishStep::Category),
        }),
    }
}

fn listing_row(
    id: ListingId,
    owner_id: UserId,
    category: ListingCategory,
    listing_type: ListingType,
    draft: &ListingDraft,
    now: DateTime<Utc>,
) -> ListingRecord {
    ListingRecord {
        id,
        owner_id,
        title: draft.title.trim().to_string(),
        description: draft.description.trim().to_string(),
        category,
        listing_type,
        price: draft.price,
        currency: draft.currency,
        city: draft.city.trim().to_string(),
        state: draft.state.trim().to_string(),
        address: draft.address().map(str::to_string),
        details: draft
            .details
            .clone()
            .filter(|details| category.admits(details)),
        is_active: true,
        is_featured: false,
        views_count: 0,
        created_at: now,
        updated_at: now,
    }
}

fn image_position(index: usize) -> u32 {
    u32::try_from(index).unwrap_or(u32::MAX)
}

fn quota_noun(limit: &u64) -> &'static str {
    if *limit == 1 {
        "anuncio activo"
    } else {
        "anuncios activos"
    }
}

/// Storage or row failure while attaching one image.
#[derive(Debug, thiserror::Error)]
pub enum ImageFailure {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Record(#[from] RepositoryError),
}

/// Error raised by publishing. `Display` is the message shown to the user.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Debes iniciar sesión para publicar")]
    Unauthenticated,
    #[error("Por favor completa todos los campos requeridos")]
    Incomplete {
        step: PublishStep,
        errors: ValidationErrors,
    },
    #[error("{file_name}: {reason}")]
    ImageRejected {
        file_name: String,
        #[source]
        reason: ImageRejection,
    },
    #[error(
        "Has alcanzado el límite de {limit} {} para tu plan {}. Mejora tu plan para publicar más.",
        quota_noun(.limit),
        .tier.code()
    )]
    QuotaExceeded { tier: SubscriptionTier, limit: u64 },
    #[error("Anuncio no encontrado")]
    ListingNotFound,
    #[error("No tienes permiso para editar este anuncio")]
    NotOwner,
    #[error("Imagen no encontrada")]
    UnknownImage(ImageId),
    #[error("Error al crear el anuncio")]
    CreateFailed(#[source] RepositoryError),
    #[error("Error al actualizar el anuncio")]
    UpdateFailed(#[source] RepositoryError),
    #[error("Error al subir la imagen {file_name}; el anuncio no fue publicado")]
    ImageUploadFailed {
        file_name: String,
        #[source]
        cause: ImageFailure,
    },
}

impl PublishError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PublishError::Unauthenticated => ErrorKind::Unauthenticated,
            PublishError::Incomplete { .. } | PublishError::ImageRejected { .. } => {
                ErrorKind::ValidationFailed
            }
            PublishError::QuotaExceeded { .. } | PublishError::NotOwner => ErrorKind::Forbidden,
            PublishError::ListingNotFound | PublishError::UnknownImage(_) => ErrorKind::NotFound,
            PublishError::CreateFailed(_)
            | PublishError::UpdateFailed(_)
            | PublishError::ImageUploadFailed { .. } => ErrorKind::PersistenceFailure,
        }
    }
}
