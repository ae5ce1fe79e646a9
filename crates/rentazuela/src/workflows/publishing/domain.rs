use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::shared::{Currency, ListingId, UserId};

/// Marketplace section a listing is published under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListingCategory {
    #[serde(rename = "property_longterm")]
    PropertyLongTerm,
    #[serde(rename = "property_shortterm")]
    PropertyShortTerm,
    #[serde(rename = "vehicle")]
    Vehicle,
    #[serde(rename = "commercial")]
    Commercial,
    #[serde(rename = "investment")]
    Investment,
}

impl ListingCategory {
    pub const ALL: [ListingCategory; 5] = [
        ListingCategory::PropertyLongTerm,
        ListingCategory::PropertyShortTerm,
        ListingCategory::Vehicle,
        ListingCategory::Commercial,
        ListingCategory::Investment,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ListingCategory::PropertyLongTerm => "Propiedad",
            ListingCategory::PropertyShortTerm => "Alquiler Vacacional",
            ListingCategory::Vehicle => "Vehículo",
            ListingCategory::Commercial => "Local Comercial",
            ListingCategory::Investment => "Inversión",
        }
    }

    pub const fn is_property(self) -> bool {
        matches!(
            self,
            ListingCategory::PropertyLongTerm | ListingCategory::PropertyShortTerm
        )
    }

    /// Offer types the category step presents for this category.
    pub const fn listing_types(self) -> &'static [ListingType] {
        match self {
            ListingCategory::PropertyLongTerm
            | ListingCategory::Vehicle
            | ListingCategory::Commercial => &[ListingType::Sale, ListingType::Rent],
            ListingCategory::PropertyShortTerm => &[ListingType::Vacation],
            ListingCategory::Investment => &[ListingType::Sale],
        }
    }

    pub fn accepts(self, listing_type: ListingType) -> bool {
        self.listing_types().contains(&listing_type)
    }

    /// Whether a details block of this variant belongs on the category.
    /// Investment listings carry no structured details.
    pub fn admits(self, details: &ListingDetails) -> bool {
        match details {
            ListingDetails::Property(_) => self.is_property(),
            ListingDetails::Vehicle(_) => self == ListingCategory::Vehicle,
            ListingDetails::Commercial(_) => self == ListingCategory::Commercial,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingType {
    Sale,
    Rent,
    Vacation,
}

impl ListingType {
    pub const fn label(self) -> &'static str {
        match self {
            ListingType::Sale => "Venta",
            ListingType::Rent => "Alquiler",
            ListingType::Vacation => "Alquiler vacacional",
        }
    }
}

/// Category-specific structured data. The type field each category requires
/// is mandatory in its variant, so a present block is always complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ListingDetails {
    Property(PropertyDetails),
    Vehicle(VehicleDetails),
    Commercial(CommercialDetails),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDetails {
    pub property_type: PropertyType,
    pub bedrooms: Option<u8>,
    pub bathrooms: Option<u8>,
    pub square_meters: Option<u32>,
    pub parking_spaces: Option<u8>,
}

impl PropertyDetails {
    pub fn new(property_type: PropertyType) -> Self {
        Self {
            property_type,
            bedrooms: None,
            bathrooms: None,
            square_meters: None,
            parking_spaces: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Apartment,
    House,
    Townhouse,
    Penthouse,
    Land,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleDetails {
    pub vehicle_type: VehicleType,
    pub year: Option<u16>,
    pub mileage: Option<u32>,
    pub transmission: Option<Transmission>,
    pub fuel_type: Option<FuelType>,
}

impl VehicleDetails {
    pub fn new(vehicle_type: VehicleType) -> Self {
        Self {
            vehicle_type,
            year: None,
            mileage: None,
            transmission: None,
            fuel_type: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    Sedan,
    Suv,
    Truck,
    Luxury,
    Economy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transmission {
    Automatic,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuelType {
    Gasoline,
    Diesel,
    Electric,
    Hybrid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommercialDetails {
    pub commercial_type: CommercialType,
    pub square_meters: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommercialType {
    Office,
    Retail,
    Warehouse,
    Coworking,
    Restaurant,
}

/// Identifier of a persisted listing image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(pub String);

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Seller plan stored on the profile; decides how many listings may be active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Pro,
    Business,
    Developer,
}

impl SubscriptionTier {
    pub const fn code(self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Pro => "pro",
            SubscriptionTier::Business => "business",
            SubscriptionTier::Developer => "developer",
        }
    }

    /// Maximum simultaneously active listings; `None` is unlimited.
    pub const fn active_listing_limit(self) -> Option<u64> {
        match self {
            SubscriptionTier::Free => Some(1),
            SubscriptionTier::Pro => Some(25),
            SubscriptionTier::Business | SubscriptionTier::Developer => None,
        }
    }
}

/// Row written to `listings` when a draft is published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub id: ListingId,
    pub owner_id: UserId,
    pub title: String,
    pub description: String,
    pub category: ListingCategory,
    pub listing_type: ListingType,
    pub price: f64,
    pub currency: Currency,
    pub city: String,
    pub state: String,
    pub address: Option<String>,
    pub details: Option<ListingDetails>,
    pub is_active: bool,
    pub is_featured: bool,
    pub views_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row written to `listing_images`; position 0 is the primary image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingImageRecord {
    pub id: ImageId,
    pub listing_id: ListingId,
    pub url: String,
    pub storage_path: String,
    pub position: u32,
    pub created_at: DateTime<Utc>,
}
