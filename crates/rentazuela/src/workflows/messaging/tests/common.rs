use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::messaging::domain::{
    Conversation, ConversationId, ListingSummary, Message, MessageId, ProfileSummary,
};
use crate::workflows::messaging::repository::{MarketplaceDirectory, MessagingRepository};
use crate::workflows::messaging::{messaging_router, MessagingPolicy, MessagingService};
use crate::workflows::shared::{CallerIdentity, Currency, ListingId, RepositoryError, UserId};

pub(super) const BUYER: &str = "buyer-7";
pub(super) const SECOND_BUYER: &str = "buyer-8";
pub(super) const SELLER: &str = "seller-9";
pub(super) const LISTING: &str = "listing-42";
pub(super) const SECOND_LISTING: &str = "listing-43";

pub(super) fn caller(id: &str) -> CallerIdentity {
    CallerIdentity::user(id)
}

pub(super) fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes)
}

#[derive(Default, Clone)]
pub(super) struct MemoryMessaging {
    pub(super) conversations: Arc<Mutex<Vec<Conversation>>>,
    pub(super) messages: Arc<Mutex<Vec<Message>>>,
}

impl MemoryMessaging {
    pub(super) fn seed_conversation(
        &self,
        id: &str,
        listing: &str,
        buyer: &str,
        seller: &str,
        updated_minutes: i64,
    ) -> ConversationId {
        let conversation = Conversation {
            id: ConversationId(id.to_string()),
            listing_id: ListingId(listing.to_string()),
            buyer_id: UserId(buyer.to_string()),
            seller_id: UserId(seller.to_string()),
            created_at: at(0),
            updated_at: at(updated_minutes),
        };
        self.conversations
            .lock()
            .expect("conversation mutex poisoned")
            .push(conversation);
        ConversationId(id.to_string())
    }

    pub(super) fn seed_message(
        &self,
        conversation: &str,
        sender: &str,
        content: &str,
        minutes: i64,
        is_read: bool,
    ) {
        let mut guard = self.messages.lock().expect("message mutex poisoned");
        let id = MessageId(format!("msg-{}", guard.len() + 1));
        guard.push(Message {
            id,
            conversation_id: ConversationId(conversation.to_string()),
            sender_id: UserId(sender.to_string()),
            content: content.to_string(),
            is_read,
            created_at: at(minutes),
        });
    }

    pub(super) fn conversation_count(&self) -> usize {
        self.conversations
            .lock()
            .expect("conversation mutex poisoned")
            .len()
    }

    pub(super) fn stored_messages(&self) -> Vec<Message> {
        self.messages.lock().expect("message mutex poisoned").clone()
    }
}

impl MessagingRepository for MemoryMessaging {
    fn insert_conversation(
        &self,
        conversation: Conversation,
    ) -> Result<Conversation, RepositoryError> {
        let mut guard = self.conversations.lock().expect("conversation mutex poisoned");
        if guard.iter().any(|existing| {
            existing.listing_id == conversation.listing_id
                && existing.buyer_id == conversation.buyer_id
        }) {
            return Err(RepositoryError::Conflict);
        }
        guard.push(conversation.clone());
        Ok(conversation)
    }

    fn fetch_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let guard = self.conversations.lock().expect("conversation mutex poisoned");
        Ok(guard.iter().find(|conversation| &conversation.id == id).cloned())
    }

    fn find_conversation(
        &self,
        listing_id: &ListingId,
        buyer_id: &UserId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let guard = self.conversations.lock().expect("conversation mutex poisoned");
        Ok(guard
            .iter()
            .find(|conversation| {
                &conversation.listing_id == listing_id && &conversation.buyer_id == buyer_id
            })
            .cloned())
    }

    fn conversations_for(&self, user_id: &UserId) -> Result<Vec<Conversation>, RepositoryError> {
        let guard = self.conversations.lock().expect("conversation mutex poisoned");
        Ok(guard
            .iter()
            .filter(|conversation| conversation.is_participant(user_id))
            .cloned()
            .collect())
    }

    fn touch_conversation(
        &self,
        id: &ConversationId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.conversations.lock().expect("conversation mutex poisoned");
        let conversation = guard
            .iter_mut()
            .find(|conversation| &conversation.id == id)
            .ok_or(RepositoryError::NotFound)?;
        conversation.updated_at = at;
        Ok(())
    }

    fn insert_message(&self, message: Message) -> Result<Message, RepositoryError> {
        self.messages
            .lock()
            .expect("message mutex poisoned")
            .push(message.clone());
        Ok(message)
    }

    fn thread_messages(&self, id: &ConversationId) -> Result<Vec<Message>, RepositoryError> {
        let guard = self.messages.lock().expect("message mutex poisoned");
        let mut messages: Vec<Message> = guard
            .iter()
            .filter(|message| &message.conversation_id == id)
            .cloned()
            .collect();
        messages.sort_by_key(|message| message.created_at);
        Ok(messages)
    }

    fn latest_messages(
        &self,
        ids: &[ConversationId],
    ) -> Result<HashMap<ConversationId, Message>, RepositoryError> {
        let guard = self.messages.lock().expect("message mutex poisoned");
        let mut latest: HashMap<ConversationId, Message> = HashMap::new();
        for message in guard.iter().filter(|message| ids.contains(&message.conversation_id)) {
            let newer = latest
                .get(&message.conversation_id)
                .map_or(true, |current| message.created_at >= current.created_at);
            if newer {
                latest.insert(message.conversation_id.clone(), message.clone());
            }
        }
        Ok(latest)
    }

    fn unread_counts(
        &self,
        ids: &[ConversationId],
        reader: &UserId,
    ) -> Result<HashMap<ConversationId, u32>, RepositoryError> {
        let guard = self.messages.lock().expect("message mutex poisoned");
        let mut counts = HashMap::new();
        for message in guard.iter().filter(|message| {
            ids.contains(&message.conversation_id) && !message.is_read && &message.sender_id != reader
        }) {
            *counts.entry(message.conversation_id.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn mark_read(&self, id: &ConversationId, reader: &UserId) -> Result<usize, RepositoryError> {
        let mut guard = self.messages.lock().expect("message mutex poisoned");
        let mut updated = 0;
        for message in guard.iter_mut().filter(|message| {
            &message.conversation_id == id && !message.is_read && &message.sender_id != reader
        }) {
            message.is_read = true;
            updated += 1;
        }
        Ok(updated)
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryDirectory {
    listings: Arc<Mutex<HashMap<ListingId, (UserId, ListingSummary)>>>,
    profiles: Arc<Mutex<HashMap<UserId, ProfileSummary>>>,
}

impl MemoryDirectory {
    pub(super) fn with_listing(self, id: &str, owner: &str, title: &str, price: f64) -> Self {
        self.listings.lock().expect("listing mutex poisoned").insert(
            ListingId(id.to_string()),
            (
                UserId(owner.to_string()),
                ListingSummary {
                    title: title.to_string(),
                    price,
                    currency: Currency::Usd,
                    city: "Caracas".to_string(),
                    state: "Distrito Capital".to_string(),
                },
            ),
        );
        self
    }

    pub(super) fn with_profile(self, id: &str, name: &str) -> Self {
        self.profiles.lock().expect("profile mutex poisoned").insert(
            UserId(id.to_string()),
            ProfileSummary {
                full_name: Some(name.to_string()),
                avatar_url: Some(format!("https://cdn.rentazuela.test/avatars/{id}.png")),
            },
        );
        self
    }
}

impl MarketplaceDirectory for MemoryDirectory {
    fn listing_owner(&self, id: &ListingId) -> Result<Option<UserId>, RepositoryError> {
        let guard = self.listings.lock().expect("listing mutex poisoned");
        Ok(guard.get(id).map(|(owner, _)| owner.clone()))
    }

    fn listing_summaries(
        &self,
        ids: &[ListingId],
    ) -> Result<HashMap<ListingId, ListingSummary>, RepositoryError> {
        let guard = self.listings.lock().expect("listing mutex poisoned");
        Ok(ids
            .iter()
            .filter_map(|id| guard.get(id).map(|(_, summary)| (id.clone(), summary.clone())))
            .collect())
    }

    fn profiles(&self, ids: &[UserId]) -> Result<HashMap<UserId, ProfileSummary>, RepositoryError> {
        let guard = self.profiles.lock().expect("profile mutex poisoned");
        Ok(ids
            .iter()
            .filter_map(|id| guard.get(id).map(|profile| (id.clone(), profile.clone())))
            .collect())
    }
}

/// Directory whose profile and listing lookups are offline.
pub(super) struct OfflineDirectory {
    pub(super) owners: HashMap<ListingId, UserId>,
}

impl MarketplaceDirectory for OfflineDirectory {
    fn listing_owner(&self, id: &ListingId) -> Result<Option<UserId>, RepositoryError> {
        Ok(self.owners.get(id).cloned())
    }

    fn listing_summaries(
        &self,
        _ids: &[ListingId],
    ) -> Result<HashMap<ListingId, ListingSummary>, RepositoryError> {
        Err(RepositoryError::Unavailable("catalog offline".to_string()))
    }

    fn profiles(
        &self,
        _ids: &[UserId],
    ) -> Result<HashMap<UserId, ProfileSummary>, RepositoryError> {
        Err(RepositoryError::Unavailable("profiles offline".to_string()))
    }
}

pub(super) struct UnavailableRepository;

impl MessagingRepository for UnavailableRepository {
    fn insert_conversation(
        &self,
        _conversation: Conversation,
    ) -> Result<Conversation, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_conversation(
        &self,
        _id: &ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_conversation(
        &self,
        _listing_id: &ListingId,
        _buyer_id: &UserId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn conversations_for(&self, _user_id: &UserId) -> Result<Vec<Conversation>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn touch_conversation(
        &self,
        _id: &ConversationId,
        _at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn insert_message(&self, _message: Message) -> Result<Message, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn thread_messages(&self, _id: &ConversationId) -> Result<Vec<Message>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn latest_messages(
        &self,
        _ids: &[ConversationId],
    ) -> Result<HashMap<ConversationId, Message>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn unread_counts(
        &self,
        _ids: &[ConversationId],
        _reader: &UserId,
    ) -> Result<HashMap<ConversationId, u32>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn mark_read(&self, _id: &ConversationId, _reader: &UserId) -> Result<usize, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Hides an existing thread from the first lookup, as if another request
/// inserted it between the lookup and the insert.
pub(super) struct RacingRepository {
    pub(super) inner: MemoryMessaging,
    pub(super) lookups: AtomicUsize,
}

impl MessagingRepository for RacingRepository {
    fn insert_conversation(
        &self,
        conversation: Conversation,
    ) -> Result<Conversation, RepositoryError> {
        self.inner.insert_conversation(conversation)
    }

    fn fetch_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        self.inner.fetch_conversation(id)
    }

    fn find_conversation(
        &self,
        listing_id: &ListingId,
        buyer_id: &UserId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        if self.lookups.fetch_add(1, Ordering::SeqCst) == 0 {
            return Ok(None);
        }
        self.inner.find_conversation(listing_id, buyer_id)
    }

    fn conversations_for(&self, user_id: &UserId) -> Result<Vec<Conversation>, RepositoryError> {
        self.inner.conversations_for(user_id)
    }

    fn touch_conversation(
        &self,
        id: &ConversationId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.inner.touch_conversation(id, at)
    }

    fn insert_message(&self, message: Message) -> Result<Message, RepositoryError> {
        self.inner.insert_message(message)
    }

    fn thread_messages(&self, id: &ConversationId) -> Result<Vec<Message>, RepositoryError> {
        self.inner.thread_messages(id)
    }

    fn latest_messages(
        &self,
        ids: &[ConversationId],
    ) -> Result<HashMap<ConversationId, Message>, RepositoryError> {
        self.inner.latest_messages(ids)
    }

    fn unread_counts(
        &self,
        ids: &[ConversationId],
        reader: &UserId,
    ) -> Result<HashMap<ConversationId, u32>, RepositoryError> {
        self.inner.unread_counts(ids, reader)
    }

    fn mark_read(&self, id: &ConversationId, reader: &UserId) -> Result<usize, RepositoryError> {
        self.inner.mark_read(id, reader)
    }
}

pub(super) fn directory() -> MemoryDirectory {
    MemoryDirectory::default()
        .with_listing(LISTING, SELLER, "Apartamento en Altamira", 120_000.0)
        .with_listing(SECOND_LISTING, SELLER, "Toyota Corolla 2018", 14_500.0)
        .with_profile(BUYER, "Ana Pérez")
        .with_profile(SECOND_BUYER, "Luis Rojas")
        .with_profile(SELLER, "Carlos Méndez")
}

pub(super) fn build_service() -> (
    MessagingService<MemoryMessaging, MemoryDirectory>,
    Arc<MemoryMessaging>,
) {
    let repository = Arc::new(MemoryMessaging::default());
    let service = MessagingService::new(
        repository.clone(),
        Arc::new(directory()),
        MessagingPolicy::default(),
    );
    (service, repository)
}

pub(super) fn router_with_service(
    service: MessagingService<MemoryMessaging, MemoryDirectory>,
) -> axum::Router {
    messaging_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
