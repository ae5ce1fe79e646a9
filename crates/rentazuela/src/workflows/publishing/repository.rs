use thiserror::Error;

use super::domain::{ImageId, ListingImageRecord, ListingRecord, SubscriptionTier};
use super::draft::ImageUpload;
use crate::workflows::shared::{ListingId, RepositoryError, UserId};

/// Relational storage for `listings` and `listing_images` rows.
pub trait ListingRepository: Send + Sync {
    fn insert_listing(&self, listing: ListingRecord) -> Result<ListingRecord, RepositoryError>;

    fn fetch_listing(&self, listing_id: &ListingId)
        -> Result<Option<ListingRecord>, RepositoryError>;

    /// Overwrites the stored row with the same id.
    fn update_listing(&self, listing: ListingRecord) -> Result<ListingRecord, RepositoryError>;

    fn delete_listing(&self, listing_id: &ListingId) -> Result<(), RepositoryError>;

    fn count_active_listings(&self, owner_id: &UserId) -> Result<u64, RepositoryError>;

    /// Plan on the owner's profile; `None` when the profile has no tier.
    fn subscription_tier(
        &self,
        owner_id: &UserId,
    ) -> Result<Option<SubscriptionTier>, RepositoryError>;

    fn insert_image(&self, image: ListingImageRecord)
        -> Result<ListingImageRecord, RepositoryError>;

    /// Image rows of the listing ordered by position.
    fn listing_images(
        &self,
        listing_id: &ListingId,
    ) -> Result<Vec<ListingImageRecord>, RepositoryError>;

    fn set_image_position(&self, image_id: &ImageId, position: u32)
        -> Result<(), RepositoryError>;

    fn delete_image(&self, image_id: &ImageId) -> Result<(), RepositoryError>;

    /// Removes every image row of the listing, returning how many were deleted.
    fn delete_images(&self, listing_id: &ListingId) -> Result<usize, RepositoryError>;
}

/// Blob storage for listing images.
pub trait ImageStorage: Send + Sync {
    /// Stores the bytes at `path` and returns the public URL.
    fn upload(&self, path: &str, image: &ImageUpload) -> Result<String, StorageError>;

    fn remove(&self, paths: &[String]) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("object rejected: {0}")]
    Rejected(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
