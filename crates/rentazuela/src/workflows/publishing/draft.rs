use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::domain::{ImageId, ListingCategory, ListingDetails, ListingType};
use crate::workflows::shared::Currency;

pub const DEFAULT_MAX_IMAGES: usize = 10;
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

const ACCEPTED_CONTENT_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// In-progress listing owned by a single publication session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingDraft {
    pub category: Option<ListingCategory>,
    pub listing_type: Option<ListingType>,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub currency: Currency,
    pub city: String,
    pub state: String,
    pub address: String,
    pub details: Option<ListingDetails>,
    pub images: Vec<ImageUpload>,
    pub existing_image_ids: Vec<ImageId>,
}

impl ListingDraft {
    pub fn image_count(&self) -> usize {
        self.images.len() + self.existing_image_ids.len()
    }

    pub fn address(&self) -> Option<&str> {
        let trimmed = self.address.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }

    /// Merges `update`. Switching to a different category discards the
    /// listing type and details chosen for the previous one.
    pub(crate) fn apply(&mut self, update: DraftUpdate) {
        if let Some(category) = update.category {
            if self.category != Some(category) {
                self.listing_type = None;
                self.details = None;
            }
            self.category = Some(category);
        }
        if let Some(listing_type) = update.listing_type {
            self.listing_type = Some(listing_type);
        }
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(price) = update.price {
            self.price = price;
        }
        if let Some(currency) = update.currency {
            self.currency = currency;
        }
        if let Some(city) = update.city {
            self.city = city;
        }
        if let Some(state) = update.state {
            self.state = state;
        }
        if let Some(address) = update.address {
            self.address = address;
        }
        if let Some(ids) = update.existing_image_ids {
            self.existing_image_ids = ids;
        }
    }
}

/// Partial draft fields merged by `update_data`; `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DraftUpdate {
    #[serde(default)]
    pub category: Option<ListingCategory>,
    #[serde(default)]
    pub listing_type: Option<ListingType>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub currency: Option<Currency>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub existing_image_ids: Option<Vec<ImageId>>,
}

/// Image picked by the user, held in memory until publish.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Lowercased file extension, falling back to `jpg`.
    pub fn extension(&self) -> String {
        std::path::Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| "jpg".to_string())
    }
}

impl fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageUpload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Limits applied to pending images, both when added and before publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImagePolicy {
    pub max_images: usize,
    pub max_image_bytes: u64,
}

impl Default for ImagePolicy {
    fn default() -> Self {
        Self {
            max_images: DEFAULT_MAX_IMAGES,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

impl ImagePolicy {
    /// Checks one file's content type and size.
    pub fn check_file(&self, image: &ImageUpload) -> Result<(), ImageRejection> {
        let accepted = image
            .content_type
            .parse::<mime::Mime>()
            .map(|parsed| ACCEPTED_CONTENT_TYPES.contains(&parsed.essence_str()))
            .unwrap_or(false);
        if !accepted {
            return Err(ImageRejection::UnsupportedType {
                content_type: image.content_type.clone(),
            });
        }
        if image.size() > self.max_image_bytes {
            return Err(ImageRejection::TooLarge {
                max_megabytes: self.max_image_bytes.div_ceil(1024 * 1024),
            });
        }
        Ok(())
    }

    /// Checks whether one more image fits next to `current` ones.
    pub fn check_capacity(&self, current: usize) -> Result<(), ImageRejection> {
        if current >= self.max_images {
            return Err(ImageRejection::LimitReached {
                max: self.max_images,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ImageRejection {
    #[error("Tipo de archivo no permitido ({content_type}). Usa JPEG, PNG o WebP")]
    UnsupportedType { content_type: String },
    #[error("El archivo es muy grande. Máximo {max_megabytes}MB")]
    TooLarge { max_megabytes: u64 },
    #[error("Máximo {max} imágenes por anuncio")]
    LimitReached { max: usize },
}
