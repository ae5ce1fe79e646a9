//! Listing publication: a six-step draft form and the publisher that writes
//! the listing row, uploads its images and rolls back when an upload fails.
//! The same form edits a stored listing for its owner.

pub mod domain;
pub mod draft;
pub mod publisher;
pub mod repository;
pub mod router;
pub mod validation;
pub mod workflow;

#[cfg(test)]
mod tests;

pub use domain::{
    CommercialDetails, CommercialType, FuelType, ImageId, ListingCategory, ListingDetails,
    ListingImageRecord, ListingRecord, ListingType, PropertyDetails, PropertyType,
    SubscriptionTier, Transmission, VehicleDetails, VehicleType,
};
pub use draft::{DraftUpdate, ImagePolicy, ImageRejection, ImageUpload, ListingDraft};
pub use publisher::{ImageFailure, ListingPublisher, PublishError, PublishReceipt};
pub use repository::{ImageStorage, ListingRepository, StorageError};
pub use router::publishing_router;
pub use validation::{validate_draft, validate_step, PublishStep, ValidationErrors};
pub use workflow::PublishWorkflow;
