use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::ConversationId;
use super::repository::{MarketplaceDirectory, MessagingRepository};
use super::service::{MessagingError, MessagingService};
use crate::workflows::http::{caller_from_headers, status_for};
use crate::workflows::shared::ListingId;

#[derive(Debug, Deserialize)]
pub(crate) struct CreateConversationRequest {
    pub(crate) listing_id: ListingId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SendMessageRequest {
    pub(crate) content: String,
}

/// Router builder exposing the inbox, thread and messaging endpoints.
pub fn messaging_router<R, D>(service: Arc<MessagingService<R, D>>) -> Router
where
    R: MessagingRepository + 'static,
    D: MarketplaceDirectory + 'static,
{
    Router::new()
        .route(
            "/api/v1/conversations",
            get(list_handler::<R, D>).post(create_handler::<R, D>),
        )
        .route(
            "/api/v1/conversations/:conversation_id",
            get(thread_handler::<R, D>),
        )
        .route(
            "/api/v1/conversations/:conversation_id/messages",
            post(send_handler::<R, D>),
        )
        .route(
            "/api/v1/conversations/:conversation_id/read",
            post(mark_read_handler::<R, D>),
        )
        .route(
            "/api/v1/messages/unread-count",
            get(unread_count_handler::<R, D>),
        )
        .with_state(service)
}

pub(crate) async fn list_handler<R, D>(
    State(service): State<Arc<MessagingService<R, D>>>,
    headers: HeaderMap,
) -> Response
where
    R: MessagingRepository + 'static,
    D: MarketplaceDirectory + 'static,
{
    let caller = caller_from_headers(&headers);
    let summaries = service.conversations(&caller);
    (StatusCode::OK, axum::Json(summaries)).into_response()
}

pub(crate) async fn thread_handler<R, D>(
    State(service): State<Arc<MessagingService<R, D>>>,
    Path(conversation_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: MessagingRepository + 'static,
    D: MarketplaceDirectory + 'static,
{
    let caller = caller_from_headers(&headers);
    match service.conversation(&caller, &ConversationId(conversation_id)) {
        Some(thread) => (StatusCode::OK, axum::Json(thread)).into_response(),
        None => {
            let payload = json!({
                "conversation": serde_json::Value::Null,
                "messages": [],
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn create_handler<R, D>(
    State(service): State<Arc<MessagingService<R, D>>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<CreateConversationRequest>,
) -> Response
where
    R: MessagingRepository + 'static,
    D: MarketplaceDirectory + 'static,
{
    let caller = caller_from_headers(&headers);
    match service.create_conversation(&caller, &request.listing_id) {
        Ok(conversation_id) => {
            let payload = json!({
                "success": true,
                "conversation_id": conversation_id,
            });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(error) => failure(error),
    }
}

pub(crate) async fn send_handler<R, D>(
    State(service): State<Arc<MessagingService<R, D>>>,
    Path(conversation_id): Path<String>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<SendMessageRequest>,
) -> Response
where
    R: MessagingRepository + 'static,
    D: MarketplaceDirectory + 'static,
{
    let caller = caller_from_headers(&headers);
    let id = ConversationId(conversation_id);
    match service.send_message(&caller, &id, &request.content) {
        Ok(message) => {
            let payload = json!({
                "success": true,
                "message": message,
            });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(error) => failure(error),
    }
}

pub(crate) async fn mark_read_handler<R, D>(
    State(service): State<Arc<MessagingService<R, D>>>,
    Path(conversation_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: MessagingRepository + 'static,
    D: MarketplaceDirectory + 'static,
{
    let caller = caller_from_headers(&headers);
    match service.mark_messages_as_read(&caller, &ConversationId(conversation_id)) {
        Ok(updated) => {
            let payload = json!({
                "success": true,
                "updated": updated,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => failure(error),
    }
}

pub(crate) async fn unread_count_handler<R, D>(
    State(service): State<Arc<MessagingService<R, D>>>,
    headers: HeaderMap,
) -> Response
where
    R: MessagingRepository + 'static,
    D: MarketplaceDirectory + 'static,
{
    let caller = caller_from_headers(&headers);
    let count = service.unread_messages_count(&caller);
    (StatusCode::OK, axum::Json(json!({ "count": count }))).into_response()
}

fn failure(error: MessagingError) -> Response {
    let payload = json!({
        "success": false,
        "error": error.to_string(),
    });
    (status_for(error.kind()), axum::Json(payload)).into_response()
}
