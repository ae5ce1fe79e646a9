use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;

use crate::workflows::publishing::domain::{
    ImageId, ListingCategory, ListingDetails, ListingImageRecord, ListingRecord, ListingType,
    PropertyDetails, PropertyType, SubscriptionTier,
};
use crate::workflows::publishing::draft::{DraftUpdate, ImagePolicy, ImageUpload};
use crate::workflows::publishing::repository::{ImageStorage, ListingRepository, StorageError};
use crate::workflows::publishing::{ListingPublisher, PublishWorkflow};
use crate::workflows::shared::{CallerIdentity, ListingId, RepositoryError, UserId};

pub(super) const OWNER: &str = "seller-9";

pub(super) fn owner() -> CallerIdentity {
    CallerIdentity::user(OWNER)
}

pub(super) fn jpeg(name: &str) -> ImageUpload {
    ImageUpload::new(name, "image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3])
}

pub(super) fn png(name: &str) -> ImageUpload {
    ImageUpload::new(name, "image/png", vec![0x89, b'P', b'N', b'G', 4, 5])
}

pub(super) fn apartment_update() -> DraftUpdate {
    DraftUpdate {
        category: Some(ListingCategory::PropertyLongTerm),
        listing_type: Some(ListingType::Rent),
        title: Some("Apartamento en Altamira".to_string()),
        description: Some(
            "Amplio apartamento de tres habitaciones con vista al Ávila".to_string(),
        ),
        price: Some(850.0),
        city: Some("Caracas".to_string()),
        state: Some("Miranda".to_string()),
        ..DraftUpdate::default()
    }
}

pub(super) fn apartment_details() -> ListingDetails {
    ListingDetails::Property(PropertyDetails {
        bedrooms: Some(3),
        bathrooms: Some(2),
        ..PropertyDetails::new(PropertyType::Apartment)
    })
}

/// Workflow holding a draft that passes every step, with two images.
pub(super) fn complete_workflow() -> PublishWorkflow {
    let mut workflow = PublishWorkflow::new(ImagePolicy::default());
    workflow.update_data(apartment_update());
    workflow.set_details(Some(apartment_details()));
    workflow.add_image(jpeg("sala.jpg")).expect("jpeg accepted");
    workflow.add_image(png("cocina.png")).expect("png accepted");
    workflow
}

#[derive(Default)]
pub(super) struct MemoryListings {
    listings: Mutex<Vec<ListingRecord>>,
    images: Mutex<Vec<ListingImageRecord>>,
    tiers: Mutex<Vec<(UserId, SubscriptionTier)>>,
    pub(super) fail_listing_insert: AtomicBool,
    pub(super) fail_listing_update: AtomicBool,
    pub(super) fail_image_insert: AtomicBool,
}

impl MemoryListings {
    pub(super) fn set_tier(&self, user: &str, tier: SubscriptionTier) {
        self.tiers
            .lock()
            .expect("tier mutex poisoned")
            .push((UserId(user.to_string()), tier));
    }

    pub(super) fn listings(&self) -> Vec<ListingRecord> {
        self.listings.lock().expect("listing mutex poisoned").clone()
    }

    pub(super) fn images(&self) -> Vec<ListingImageRecord> {
        self.images.lock().expect("image mutex poisoned").clone()
    }
}

impl ListingRepository for MemoryListings {
    fn insert_listing(&self, listing: ListingRecord) -> Result<ListingRecord, RepositoryError> {
        if self.fail_listing_insert.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("listings offline".to_string()));
        }
        self.listings
            .lock()
            .expect("listing mutex poisoned")
            .push(listing.clone());
        Ok(listing)
    }

    fn fetch_listing(
        &self,
        listing_id: &ListingId,
    ) -> Result<Option<ListingRecord>, RepositoryError> {
        Ok(self
            .listings()
            .into_iter()
            .find(|listing| &listing.id == listing_id))
    }

    fn update_listing(&self, listing: ListingRecord) -> Result<ListingRecord, RepositoryError> {
        if self.fail_listing_update.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("listings offline".to_string()));
        }
        let mut guard = self.listings.lock().expect("listing mutex poisoned");
        let stored = guard
            .iter_mut()
            .find(|existing| existing.id == listing.id)
            .ok_or(RepositoryError::NotFound)?;
        *stored = listing.clone();
        Ok(listing)
    }

    fn delete_listing(&self, listing_id: &ListingId) -> Result<(), RepositoryError> {
        self.listings
            .lock()
            .expect("listing mutex poisoned")
            .retain(|listing| &listing.id != listing_id);
        Ok(())
    }

    fn count_active_listings(&self, owner_id: &UserId) -> Result<u64, RepositoryError> {
        Ok(self
            .listings()
            .iter()
            .filter(|listing| &listing.owner_id == owner_id && listing.is_active)
            .count() as u64)
    }

    fn subscription_tier(
        &self,
        owner_id: &UserId,
    ) -> Result<Option<SubscriptionTier>, RepositoryError> {
        Ok(self
            .tiers
            .lock()
            .expect("tier mutex poisoned")
            .iter()
            .rev()
            .find(|(user, _)| user == owner_id)
            .map(|(_, tier)| *tier))
    }

    fn insert_image(
        &self,
        image: ListingImageRecord,
    ) -> Result<ListingImageRecord, RepositoryError> {
        if self.fail_image_insert.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("images offline".to_string()));
        }
        self.images
            .lock()
            .expect("image mutex poisoned")
            .push(image.clone());
        Ok(image)
    }

    fn listing_images(
        &self,
        listing_id: &ListingId,
    ) -> Result<Vec<ListingImageRecord>, RepositoryError> {
        let mut images: Vec<ListingImageRecord> = self
            .images()
            .into_iter()
            .filter(|image| &image.listing_id == listing_id)
            .collect();
        images.sort_by_key(|image| image.position);
        Ok(images)
    }

    fn set_image_position(&self, image_id: &ImageId, position: u32) -> Result<(), RepositoryError> {
        let mut guard = self.images.lock().expect("image mutex poisoned");
        let image = guard
            .iter_mut()
            .find(|image| &image.id == image_id)
            .ok_or(RepositoryError::NotFound)?;
        image.position = position;
        Ok(())
    }

    fn delete_image(&self, image_id: &ImageId) -> Result<(), RepositoryError> {
        self.images
            .lock()
            .expect("image mutex poisoned")
            .retain(|image| &image.id != image_id);
        Ok(())
    }

    fn delete_images(&self, listing_id: &ListingId) -> Result<usize, RepositoryError> {
        let mut guard = self.images.lock().expect("image mutex poisoned");
        let before = guard.len();
        guard.retain(|image| &image.listing_id != listing_id);
        Ok(before - guard.len())
    }
}

/// Blob store that refuses uploads for one file name when configured.
#[derive(Default)]
pub(super) struct MemoryStorage {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    uploads: Mutex<Vec<String>>,
    pub(super) reject_file: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub(super) fn rejecting(file_name: &str) -> Self {
        let storage = Self::default();
        *storage.reject_file.lock().expect("storage mutex poisoned") = Some(file_name.to_string());
        storage
    }

    pub(super) fn object_paths(&self) -> Vec<String> {
        self.objects
            .lock()
            .expect("storage mutex poisoned")
            .keys()
            .cloned()
            .collect()
    }

    pub(super) fn upload_attempts(&self) -> Vec<String> {
        self.uploads.lock().expect("storage mutex poisoned").clone()
    }
}

impl ImageStorage for MemoryStorage {
    fn upload(&self, path: &str, image: &ImageUpload) -> Result<String, StorageError> {
        self.uploads
            .lock()
            .expect("storage mutex poisoned")
            .push(image.file_name.clone());
        let rejected = self.reject_file.lock().expect("storage mutex poisoned");
        if rejected.as_deref() == Some(image.file_name.as_str()) {
            return Err(StorageError::Rejected(image.file_name.clone()));
        }
        self.objects
            .lock()
            .expect("storage mutex poisoned")
            .insert(path.to_string(), image.bytes.clone());
        Ok(format!("https://cdn.test/listing-images/{path}"))
    }

    fn remove(&self, paths: &[String]) -> Result<(), StorageError> {
        let mut guard = self.objects.lock().expect("storage mutex poisoned");
        for path in paths {
            guard.remove(path);
        }
        Ok(())
    }
}

pub(super) type TestPublisher = ListingPublisher<MemoryListings, MemoryStorage>;

pub(super) fn build_publisher(
    storage: MemoryStorage,
) -> (TestPublisher, Arc<MemoryListings>, Arc<MemoryStorage>) {
    let repository = Arc::new(MemoryListings::default());
    let storage = Arc::new(storage);
    let publisher = ListingPublisher::new(
        Arc::clone(&repository),
        Arc::clone(&storage),
        ImagePolicy::default(),
    );
    (publisher, repository, storage)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("valid json")
}
