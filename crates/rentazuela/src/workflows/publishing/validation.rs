use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{ListingCategory, ListingDetails};
use super::draft::ListingDraft;

const MIN_TITLE_CHARS: usize = 10;
const MIN_DESCRIPTION_CHARS: usize = 30;

pub(crate) const MISSING_IMAGES: &str = "Agrega al menos una imagen";

/// Form steps in display order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PublishStep {
    #[default]
    Category,
    BasicInfo,
    Location,
    Details,
    Images,
    Preview,
}

impl PublishStep {
    pub const ALL: [PublishStep; 6] = [
        PublishStep::Category,
        PublishStep::BasicInfo,
        PublishStep::Location,
        PublishStep::Details,
        PublishStep::Images,
        PublishStep::Preview,
    ];

    pub const LAST: PublishStep = PublishStep::Preview;

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Step at `index`, clamped to the last step.
    pub fn clamped(index: usize) -> Self {
        Self::ALL[index.min(Self::LAST.index())]
    }

    pub fn next(self) -> Self {
        Self::clamped(self.index() + 1)
    }

    pub fn previous(self) -> Self {
        Self::clamped(self.index().saturating_sub(1))
    }

    pub const fn title(self) -> &'static str {
        match self {
            PublishStep::Category => "Categoría",
            PublishStep::BasicInfo => "Información básica",
            PublishStep::Location => "Ubicación",
            PublishStep::Details => "Detalles",
            PublishStep::Images => "Imágenes",
            PublishStep::Preview => "Vista previa",
        }
    }
}

/// Field name to user-facing message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.insert(field.into(), message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ValidationErrors {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Runs the rules of a single step against the draft.
pub fn validate_step(draft: &ListingDraft, step: PublishStep) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    match step {
        PublishStep::Category => category_rules(draft, &mut errors),
        PublishStep::BasicInfo => basic_info_rules(draft, &mut errors),
        PublishStep::Location => location_rules(draft, &mut errors),
        PublishStep::Details => details_rules(draft, &mut errors),
        PublishStep::Images => {
            if draft.image_count() == 0 {
                errors.insert("images", MISSING_IMAGES);
            }
        }
        PublishStep::Preview => {}
    }
    errors
}

/// Validates every step before preview; returns the first failing step.
pub fn validate_draft(draft: &ListingDraft) -> Result<(), (PublishStep, ValidationErrors)> {
    PublishStep::ALL
        .into_iter()
        .filter(|step| *step < PublishStep::Preview)
        .map(|step| (step, validate_step(draft, step)))
        .find(|(_, errors)| !errors.is_empty())
        .map_or(Ok(()), Err)
}

fn category_rules(draft: &ListingDraft, errors: &mut ValidationErrors) {
    if draft.category.is_none() {
        errors.insert("category", "Selecciona una categoría");
    }
    match (draft.category, draft.listing_type) {
        (_, None) => errors.insert("listingType", "Selecciona el tipo de anuncio"),
        (Some(category), Some(listing_type)) if !category.accepts(listing_type) => errors.insert(
            "listingType",
            "Este tipo de anuncio no está disponible para la categoría",
        ),
        _ => {}
    }
}

fn basic_info_rules(draft: &ListingDraft, errors: &mut ValidationErrors) {
    let title = draft.title.trim();
    if title.is_empty() {
        errors.insert("title", "El título es requerido");
    } else if title.chars().count() < MIN_TITLE_CHARS {
        errors.insert("title", "El título debe tener al menos 10 caracteres");
    }

    let description = draft.description.trim();
    if description.is_empty() {
        errors.insert("description", "La descripción es requerida");
    } else if description.chars().count() < MIN_DESCRIPTION_CHARS {
        errors.insert(
            "description",
            "La descripción debe tener al menos 30 caracteres",
        );
    }

    if !(draft.price.is_finite() && draft.price > 0.0) {
        errors.insert("price", "Ingresa un precio válido");
    }
}

fn location_rules(draft: &ListingDraft, errors: &mut ValidationErrors) {
    if draft.city.trim().is_empty() {
        errors.insert("city", "La ciudad es requerida");
    }
    if draft.state.trim().is_empty() {
        errors.insert("state", "El estado es requerido");
    }
}

fn details_rules(draft: &ListingDraft, errors: &mut ValidationErrors) {
    let Some(category) = draft.category else {
        return;
    };
    let details = draft.details.as_ref();
    match category {
        ListingCategory::PropertyLongTerm | ListingCategory::PropertyShortTerm => {
            if !matches!(details, Some(ListingDetails::Property(_))) {
                errors.insert("property_type", "Selecciona el tipo de propiedad");
            }
        }
        ListingCategory::Vehicle => {
            if !matches!(details, Some(ListingDetails::Vehicle(_))) {
                errors.insert("vehicle_type", "Selecciona el tipo de vehículo");
            }
        }
        ListingCategory::Commercial => {
            if !matches!(details, Some(ListingDetails::Commercial(_))) {
                errors.insert("commercial_type", "Selecciona el tipo de local");
            }
        }
        ListingCategory::Investment => {}
    }
}
