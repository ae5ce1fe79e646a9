use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{post, put},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::domain::{ImageId, ListingCategory, ListingDetails, ListingType};
use super::draft::{DraftUpdate, ImageUpload};
use super::publisher::{ListingPublisher, PublishError, PublishReceipt};
use super::repository::{ImageStorage, ListingRepository};
use super::validation::PublishStep;
use super::workflow::PublishWorkflow;
use crate::workflows::http::{caller_from_headers, status_for};
use crate::workflows::shared::{Currency, ListingId};

/// Complete draft posted in one request; image bytes are base64 encoded.
#[derive(Debug, Deserialize)]
pub(crate) struct PublishListingRequest {
    pub(crate) category: Option<ListingCategory>,
    pub(crate) listing_type: Option<ListingType>,
    #[serde(default)]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) description: String,
    #[serde(default)]
    pub(crate) price: f64,
    #[serde(default)]
    pub(crate) currency: Currency,
    #[serde(default)]
    pub(crate) city: String,
    #[serde(default)]
    pub(crate) state: String,
    #[serde(default)]
    pub(crate) address: Option<String>,
    #[serde(default)]
    pub(crate) details: Option<ListingDetails>,
    #[serde(default)]
    pub(crate) images: Vec<EncodedImage>,
    #[serde(default)]
    pub(crate) existing_image_ids: Vec<ImageId>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EncodedImage {
    pub(crate) file_name: String,
    pub(crate) content_type: String,
    pub(crate) data: String,
}

/// Router builder exposing the listing publish and edit endpoints.
pub fn publishing_router<R, S>(publisher: Arc<ListingPublisher<R, S>>) -> Router
where
    R: ListingRepository + 'static,
    S: ImageStorage + 'static,
{
    Router::new()
        .route("/api/v1/listings", post(publish_handler::<R, S>))
        .route("/api/v1/listings/:listing_id", put(update_handler::<R, S>))
        .with_state(publisher)
}

pub(crate) async fn publish_handler<R, S>(
    State(publisher): State<Arc<ListingPublisher<R, S>>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<PublishListingRequest>,
) -> Response
where
    R: ListingRepository + 'static,
    S: ImageStorage + 'static,
{
    let caller = caller_from_headers(&headers);
    if caller.user_id().is_none() {
        return publish_failure(&PublishError::Unauthenticated);
    }
    let workflow = PublishWorkflow::new(publisher.policy());
    let mut workflow = match filled_workflow(workflow, request, false) {
        Ok(workflow) => workflow,
        Err(response) => return response,
    };
    match workflow.submit(&caller, publisher.as_ref()) {
        Ok(receipt) => saved(StatusCode::CREATED, receipt),
        Err(error) => publish_failure(&error),
    }
}

pub(crate) async fn update_handler<R, S>(
    State(publisher): State<Arc<ListingPublisher<R, S>>>,
    Path(listing_id): Path<String>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<PublishListingRequest>,
) -> Response
where
    R: ListingRepository + 'static,
    S: ImageStorage + 'static,
{
    let caller = caller_from_headers(&headers);
    if caller.user_id().is_none() {
        return publish_failure(&PublishError::Unauthenticated);
    }
    let workflow = PublishWorkflow::editing(publisher.policy(), ListingId(listing_id));
    let mut workflow = match filled_workflow(workflow, request, true) {
        Ok(workflow) => workflow,
        Err(response) => return response,
    };
    match workflow.submit(&caller, publisher.as_ref()) {
        Ok(receipt) => saved(StatusCode::OK, receipt),
        Err(error) => publish_failure(&error),
    }
}

/// Loads the request into the form and parks it on the preview step.
/// Stored image ids are only honoured for edits.
fn filled_workflow(
    mut workflow: PublishWorkflow,
    request: PublishListingRequest,
    keep_existing_images: bool,
) -> Result<PublishWorkflow, Response> {
    workflow.update_data(DraftUpdate {
        category: request.category,
        listing_type: request.listing_type,
        title: Some(request.title),
        description: Some(request.description),
        price: Some(request.price),
        currency: Some(request.currency),
        city: Some(request.city),
        state: Some(request.state),
        address: request.address,
        existing_image_ids: keep_existing_images.then_some(request.existing_image_ids),
    });
    workflow.set_details(request.details);

    for image in request.images {
        let bytes = match STANDARD.decode(image.data.as_bytes()) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(file_name = %image.file_name, error = %err, "image payload is not valid base64");
                return Err(rejected(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    format!("Imagen inválida: {}", image.file_name),
                ));
            }
        };
        let upload = ImageUpload::new(image.file_name, image.content_type, bytes);
        let file_name = upload.file_name.clone();
        if let Err(reason) = workflow.add_image(upload) {
            return Err(rejected(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("{file_name}: {reason}"),
            ));
        }
    }

    workflow.go_to_step(PublishStep::Preview.index());
    Ok(workflow)
}

fn saved(status: StatusCode, receipt: PublishReceipt) -> Response {
    let payload = json!({
        "success": true,
        "listing_id": receipt.listing_id,
        "images": receipt.images,
    });
    (status, axum::Json(payload)).into_response()
}

fn publish_failure(error: &PublishError) -> Response {
    match error {
        PublishError::Incomplete { step, errors } => {
            let payload = json!({
                "success": false,
                "error": error.to_string(),
                "step": step.index(),
                "fields": errors,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        _ => rejected(status_for(error.kind()), error.to_string()),
    }
}

fn rejected(status: StatusCode, message: String) -> Response {
    let payload = json!({
        "success": false,
        "error": message,
    });
    (status, axum::Json(payload)).into_response()
}
