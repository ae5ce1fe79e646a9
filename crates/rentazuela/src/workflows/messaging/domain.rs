use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::shared::{Currency, ListingId, UserId};

/// Identifier wrapper for buyer/seller threads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Thread between the buyer and the owner of one listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub listing_id: ListingId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn is_participant(&self, user_id: &UserId) -> bool {
        &self.buyer_id == user_id || &self.seller_id == user_id
    }

    /// The participant that is not `user_id`. Callers check membership first.
    pub fn counterpart_of(&self, user_id: &UserId) -> &UserId {
        if &self.buyer_id == user_id {
            &self.seller_id
        } else {
            &self.buyer_id
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields of a listing shown next to a thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingSummary {
    pub title: String,
    pub price: f64,
    pub currency: Currency,
    pub city: String,
    pub state: String,
}

/// Public profile of a participant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Inbox row computed fresh for every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub listing_id: ListingId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub listing_title: Option<String>,
    pub listing_price: Option<f64>,
    pub listing_currency: Option<Currency>,
    pub other_user_name: Option<String>,
    pub other_user_avatar: Option<String>,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_count: u32,
    pub is_buyer: bool,
}

impl ConversationSummary {
    pub(crate) fn build(
        conversation: &Conversation,
        caller: &UserId,
        listing: Option<&ListingSummary>,
        counterpart: Option<&ProfileSummary>,
    ) -> Self {
        Self {
            id: conversation.id.clone(),
            listing_id: conversation.listing_id.clone(),
            buyer_id: conversation.buyer_id.clone(),
            seller_id: conversation.seller_id.clone(),
            created_at: conversation.created_at,
            updated_at: conversation.updated_at,
            listing_title: listing.map(|listing| listing.title.clone()),
            listing_price: listing.map(|listing| listing.price),
            listing_currency: listing.map(|listing| listing.currency),
            other_user_name: counterpart.and_then(|profile| profile.full_name.clone()),
            other_user_avatar: counterpart.and_then(|profile| profile.avatar_url.clone()),
            last_message: None,
            last_message_at: None,
            unread_count: 0,
            is_buyer: &conversation.buyer_id == caller,
        }
    }
}

/// One thread with its complete history, oldest message first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationThread {
    pub conversation: ConversationSummary,
    pub listing_city: Option<String>,
    pub listing_state: Option<String>,
    pub messages: Vec<Message>,
}
