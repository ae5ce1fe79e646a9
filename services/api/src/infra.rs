use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use rentazuela::workflows::messaging::{
    Conversation, ConversationId, ListingSummary, MarketplaceDirectory, Message,
    MessagingRepository, ProfileSummary,
};
use rentazuela::workflows::publishing::{
    ImageId, ImageStorage, ImageUpload, ListingImageRecord, ListingRecord, ListingRepository,
    StorageError, SubscriptionTier,
};
use rentazuela::workflows::shared::{ListingId, RepositoryError, UserId};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
struct Tables {
    listings: Vec<ListingRecord>,
    listing_images: Vec<ListingImageRecord>,
    conversations: Vec<Conversation>,
    messages: Vec<Message>,
    profiles: HashMap<UserId, ProfileSummary>,
    tiers: HashMap<UserId, SubscriptionTier>,
}

/// Single-process stand-in for the managed database: listings, images,
/// conversations, messages and profiles behind one lock.
#[derive(Default, Clone)]
pub(crate) struct InMemoryMarketplace {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryMarketplace {
    fn tables(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("marketplace store poisoned".to_string()))
    }

    pub(crate) fn upsert_profile(
        &self,
        user_id: &str,
        full_name: &str,
        avatar_url: Option<&str>,
    ) -> Result<(), RepositoryError> {
        self.tables()?.profiles.insert(
            UserId(user_id.to_string()),
            ProfileSummary {
                full_name: Some(full_name.to_string()),
                avatar_url: avatar_url.map(str::to_string),
            },
        );
        Ok(())
    }

    pub(crate) fn set_tier(
        &self,
        user_id: &str,
        tier: SubscriptionTier,
    ) -> Result<(), RepositoryError> {
        self.tables()?
            .tiers
            .insert(UserId(user_id.to_string()), tier);
        Ok(())
    }

    pub(crate) fn listing(&self, id: &ListingId) -> Result<Option<ListingRecord>, RepositoryError> {
        Ok(self
            .tables()?
            .listings
            .iter()
            .find(|listing| &listing.id == id)
            .cloned())
    }
}

impl ListingRepository for InMemoryMarketplace {
    fn insert_listing(&self, listing: ListingRecord) -> Result<ListingRecord, RepositoryError> {
        let mut tables = self.tables()?;
        if tables.listings.iter().any(|existing| existing.id == listing.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.listings.push(listing.clone());
        Ok(listing)
    }

    fn fetch_listing(
        &self,
        listing_id: &ListingId,
    ) -> Result<Option<ListingRecord>, RepositoryError> {
        self.listing(listing_id)
    }

    fn update_listing(&self, listing: ListingRecord) -> Result<ListingRecord, RepositoryError> {
        let mut tables = self.tables()?;
        let stored = tables
            .listings
            .iter_mut()
            .find(|existing| existing.id == listing.id)
            .ok_or(RepositoryError::NotFound)?;
        *stored = listing.clone();
        Ok(listing)
    }

    fn delete_listing(&self, listing_id: &ListingId) -> Result<(), RepositoryError> {
        self.tables()?
            .listings
            .retain(|listing| &listing.id != listing_id);
        Ok(())
    }

    fn count_active_listings(&self, owner_id: &UserId) -> Result<u64, RepositoryError> {
        let active = self
            .tables()?
            .listings
            .iter()
            .filter(|listing| &listing.owner_id == owner_id && listing.is_active)
            .count();
        Ok(u64::try_from(active).unwrap_or(u64::MAX))
    }

    fn subscription_tier(
        &self,
        owner_id: &UserId,
    ) -> Result<Option<SubscriptionTier>, RepositoryError> {
        Ok(self.tables()?.tiers.get(owner_id).copied())
    }

    fn insert_image(
        &self,
        image: ListingImageRecord,
    ) -> Result<ListingImageRecord, RepositoryError> {
        let mut tables = self.tables()?;
        if !tables
            .listings
            .iter()
            .any(|listing| listing.id == image.listing_id)
        {
            return Err(RepositoryError::NotFound);
        }
        tables.listing_images.push(image.clone());
        Ok(image)
    }

    fn listing_images(
        &self,
        listing_id: &ListingId,
    ) -> Result<Vec<ListingImageRecord>, RepositoryError> {
        let mut images: Vec<ListingImageRecord> = self
            .tables()?
            .listing_images
            .iter()
            .filter(|image| &image.listing_id == listing_id)
            .cloned()
            .collect();
        images.sort_by_key(|image| image.position);
        Ok(images)
    }

    fn set_image_position(&self, image_id: &ImageId, position: u32) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        let image = tables
            .listing_images
            .iter_mut()
            .find(|image| &image.id == image_id)
            .ok_or(RepositoryError::NotFound)?;
        image.position = position;
        Ok(())
    }

    fn delete_image(&self, image_id: &ImageId) -> Result<(), RepositoryError> {
        self.tables()?
            .listing_images
            .retain(|image| &image.id != image_id);
        Ok(())
    }

    fn delete_images(&self, listing_id: &ListingId) -> Result<usize, RepositoryError> {
        let mut tables = self.tables()?;
        let before = tables.listing_images.len();
        tables
            .listing_images
            .retain(|image| &image.listing_id != listing_id);
        Ok(before - tables.listing_images.len())
    }
}

impl MessagingRepository for InMemoryMarketplace {
    fn insert_conversation(
        &self,
        conversation: Conversation,
    ) -> Result<Conversation, RepositoryError> {
        let mut tables = self.tables()?;
        let duplicate = tables.conversations.iter().any(|existing| {
            existing.listing_id == conversation.listing_id
                && existing.buyer_id == conversation.buyer_id
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        tables.conversations.push(conversation.clone());
        Ok(conversation)
    }

    fn fetch_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        Ok(self
            .tables()?
            .conversations
            .iter()
            .find(|conversation| &conversation.id == id)
            .cloned())
    }

    fn find_conversation(
        &self,
        listing_id: &ListingId,
        buyer_id: &UserId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        Ok(self
            .tables()?
            .conversations
            .iter()
            .find(|conversation| {
                &conversation.listing_id == listing_id && &conversation.buyer_id == buyer_id
            })
            .cloned())
    }

    fn conversations_for(&self, user_id: &UserId) -> Result<Vec<Conversation>, RepositoryError> {
        Ok(self
            .tables()?
            .conversations
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
        let mut tables = self.tables()?;
        let conversation = tables
            .conversations
            .iter_mut()
            .find(|conversation| &conversation.id == id)
            .ok_or(RepositoryError::NotFound)?;
        conversation.updated_at = at;
        Ok(())
    }

    fn insert_message(&self, message: Message) -> Result<Message, RepositoryError> {
        self.tables()?.messages.push(message.clone());
        Ok(message)
    }

    fn thread_messages(&self, id: &ConversationId) -> Result<Vec<Message>, RepositoryError> {
        let mut thread: Vec<Message> = self
            .tables()?
            .messages
            .iter()
            .filter(|message| &message.conversation_id == id)
            .cloned()
            .collect();
        thread.sort_by_key(|message| message.created_at);
        Ok(thread)
    }

    fn latest_messages(
        &self,
        ids: &[ConversationId],
    ) -> Result<HashMap<ConversationId, Message>, RepositoryError> {
        let tables = self.tables()?;
        let mut latest: HashMap<ConversationId, Message> = HashMap::new();
        for message in tables
            .messages
            .iter()
            .filter(|message| ids.contains(&message.conversation_id))
        {
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
        let tables = self.tables()?;
        let mut counts = HashMap::new();
        for message in tables.messages.iter().filter(|message| {
            ids.contains(&message.conversation_id) && !message.is_read && &message.sender_id != reader
        }) {
            *counts.entry(message.conversation_id.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn mark_read(&self, id: &ConversationId, reader: &UserId) -> Result<usize, RepositoryError> {
        let mut tables = self.tables()?;
        let mut updated = 0;
        for message in tables.messages.iter_mut().filter(|message| {
            &message.conversation_id == id && !message.is_read && &message.sender_id != reader
        }) {
            message.is_read = true;
            updated += 1;
        }
        Ok(updated)
    }
}

impl MarketplaceDirectory for InMemoryMarketplace {
    fn listing_owner(&self, id: &ListingId) -> Result<Option<UserId>, RepositoryError> {
        Ok(self.listing(id)?.map(|listing| listing.owner_id))
    }

    fn listing_summaries(
        &self,
        ids: &[ListingId],
    ) -> Result<HashMap<ListingId, ListingSummary>, RepositoryError> {
        Ok(self
            .tables()?
            .listings
            .iter()
            .filter(|listing| ids.contains(&listing.id))
            .map(|listing| {
                (
                    listing.id.clone(),
                    ListingSummary {
                        title: listing.title.clone(),
                        price: listing.price,
                        currency: listing.currency,
                        city: listing.city.clone(),
                        state: listing.state.clone(),
                    },
                )
            })
            .collect())
    }

    fn profiles(&self, ids: &[UserId]) -> Result<HashMap<UserId, ProfileSummary>, RepositoryError> {
        let tables = self.tables()?;
        Ok(ids
            .iter()
            .filter_map(|id| {
                tables
                    .profiles
                    .get(id)
                    .map(|profile| (id.clone(), profile.clone()))
            })
            .collect())
    }
}

/// Object store keeping image metadata in memory under their storage path.
#[derive(Clone)]
pub(crate) struct InMemoryImageStorage {
    objects: Arc<Mutex<BTreeMap<String, StoredObject>>>,
    public_base_url: Arc<str>,
}

#[derive(Debug, Clone)]
pub(crate) struct StoredObject {
    pub(crate) content_type: String,
    pub(crate) size: usize,
}

impl InMemoryImageStorage {
    pub(crate) fn new(public_base_url: &str) -> Self {
        Self {
            objects: Arc::default(),
            public_base_url: Arc::from(public_base_url.trim_end_matches('/')),
        }
    }

    pub(crate) fn objects(&self) -> Vec<(String, StoredObject)> {
        self.objects
            .lock()
            .map(|guard| {
                guard
                    .iter()
                    .map(|(path, object)| (path.clone(), object.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn guard(&self) -> Result<MutexGuard<'_, BTreeMap<String, StoredObject>>, StorageError> {
        self.objects
            .lock()
            .map_err(|_| StorageError::Unavailable("image store poisoned".to_string()))
    }
}

impl ImageStorage for InMemoryImageStorage {
    fn upload(&self, path: &str, image: &ImageUpload) -> Result<String, StorageError> {
        let mut objects = self.guard()?;
        if objects.contains_key(path) {
            return Err(StorageError::Rejected(format!("{path} already exists")));
        }
        objects.insert(
            path.to_string(),
            StoredObject {
                content_type: image.content_type.clone(),
                size: image.bytes.len(),
            },
        );
        Ok(format!("{}/{path}", self.public_base_url))
    }

    fn remove(&self, paths: &[String]) -> Result<(), StorageError> {
        let mut objects = self.guard()?;
        for path in paths {
            objects.remove(path);
        }
        Ok(())
    }
}
