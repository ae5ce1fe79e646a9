use tracing::debug;

use super::domain::{ImageId, ListingDetails, ListingImageRecord, ListingRecord};
use super::draft::{DraftUpdate, ImagePolicy, ImageRejection, ImageUpload, ListingDraft};
use super::publisher::{ListingPublisher, PublishError, PublishReceipt};
use super::repository::{ImageStorage, ListingRepository};
use super::validation::{validate_draft, validate_step, PublishStep, ValidationErrors};
use crate::workflows::shared::{CallerIdentity, ListingId};

/// Six-step publication form: one draft, one cursor and the errors of the
/// last validation. When `editing` is set, submit saves over that listing.
#[derive(Debug, Clone, Default)]
pub struct PublishWorkflow {
    draft: ListingDraft,
    current_step: PublishStep,
    errors: ValidationErrors,
    policy: ImagePolicy,
    editing: Option<ListingId>,
}

impl PublishWorkflow {
    pub fn new(policy: ImagePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Blank form whose submit edits `listing_id`.
    pub fn editing(policy: ImagePolicy, listing_id: ListingId) -> Self {
        Self {
            editing: Some(listing_id),
            ..Self::new(policy)
        }
    }

    /// Edit form prefilled from a stored listing and its images.
    pub fn from_listing(
        policy: ImagePolicy,
        listing: &ListingRecord,
        images: &[ListingImageRecord],
    ) -> Self {
        let mut ordered: Vec<&ListingImageRecord> = images.iter().collect();
        ordered.sort_by_key(|image| image.position);

        let mut workflow = Self::editing(policy, listing.id.clone());
        workflow.draft = ListingDraft {
            category: Some(listing.category),
            listing_type: Some(listing.listing_type),
            title: listing.title.clone(),
            description: listing.description.clone(),
            price: listing.price,
            currency: listing.currency,
            city: listing.city.clone(),
            state: listing.state.clone(),
            address: listing.address.clone().unwrap_or_default(),
            details: listing.details.clone(),
            images: Vec::new(),
            existing_image_ids: ordered.into_iter().map(|image| image.id.clone()).collect(),
        };
        workflow
    }

    pub fn editing_listing(&self) -> Option<&ListingId> {
        self.editing.as_ref()
    }

    pub fn draft(&self) -> &ListingDraft {
        &self.draft
    }

    pub fn current_step(&self) -> PublishStep {
        self.current_step
    }

    pub fn total_steps(&self) -> usize {
        PublishStep::ALL.len()
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn set_errors(&mut self, errors: ValidationErrors) {
        self.errors = errors;
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    pub fn update_data(&mut self, update: DraftUpdate) {
        self.draft.apply(update);
    }

    pub fn set_details(&mut self, details: Option<ListingDetails>) {
        self.draft.details = details;
    }

    /// Appends an image, leaving the draft unchanged when the policy rejects it.
    pub fn add_image(&mut self, image: ImageUpload) -> Result<(), ImageRejection> {
        self.policy.check_file(&image)?;
        self.policy.check_capacity(self.draft.image_count())?;
        self.draft.images.push(image);
        Ok(())
    }

    pub fn remove_image(&mut self, index: usize) -> Option<ImageUpload> {
        (index < self.draft.images.len()).then(|| self.draft.images.remove(index))
    }

    /// Drops a stored image from the edit; it is deleted on submit.
    pub fn remove_existing_image(&mut self, id: &ImageId) -> bool {
        let before = self.draft.existing_image_ids.len();
        self.draft.existing_image_ids.retain(|existing| existing != id);
        self.draft.existing_image_ids.len() != before
    }

    /// Moves the image at `from` to `to`; `to` is clamped to the end.
    pub fn reorder_images(&mut self, from: usize, to: usize) {
        let images = &mut self.draft.images;
        if from >= images.len() {
            return;
        }
        let image = images.remove(from);
        let to = to.min(images.len());
        images.insert(to, image);
    }

    /// Runs one step's rules and stores the result as the current errors.
    pub fn validate_step(&mut self, step: PublishStep) -> bool {
        self.errors = validate_step(&self.draft, step);
        self.errors.is_empty()
    }

    pub fn next_step(&mut self) -> bool {
        if !self.validate_step(self.current_step) {
            debug!(step = ?self.current_step, errors = self.errors.len(), "step validation failed");
            return false;
        }
        self.current_step = self.current_step.next();
        true
    }

    pub fn prev_step(&mut self) {
        self.current_step = self.current_step.previous();
    }

    pub fn go_to_step(&mut self, index: usize) {
        self.current_step = PublishStep::clamped(index);
    }

    /// Discards the draft and returns to an empty create form.
    pub fn reset(&mut self) {
        self.draft = ListingDraft::default();
        self.current_step = PublishStep::Category;
        self.errors.clear();
        self.editing = None;
    }

    /// Re-validates every step, then hands the draft to the publisher.
    /// The draft is kept on failure and reset on success.
    pub fn submit<R, S>(
        &mut self,
        caller: &CallerIdentity,
        publisher: &ListingPublisher<R, S>,
    ) -> Result<PublishReceipt, PublishError>
    where
        R: ListingRepository + 'static,
        S: ImageStorage + 'static,
    {
        if caller.user_id().is_none() {
            return Err(PublishError::Unauthenticated);
        }
        if let Err((step, errors)) = validate_draft(&self.draft) {
            return Err(self.rewind(step, errors));
        }
        self.errors.clear();

        let outcome = match &self.editing {
            Some(listing_id) => publisher.update(caller, listing_id, &self.draft),
            None => publisher.publish(caller, &self.draft),
        };
        match outcome {
            Ok(receipt) => {
                self.reset();
                Ok(receipt)
            }
            Err(PublishError::Incomplete { step, errors }) => Err(self.rewind(step, errors)),
            Err(err) => Err(err),
        }
    }

    fn rewind(&mut self, step: PublishStep, errors: ValidationErrors) -> PublishError {
        self.current_step = step;
        self.errors = errors.clone();
        PublishError::Incomplete { step, errors }
    }
}
