use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::domain::{Conversation, ConversationId, ListingSummary, Message, ProfileSummary};
use crate::workflows::shared::{ListingId, RepositoryError, UserId};

/// Storage for the `conversations` and `messages` tables.
///
/// The batch methods exist so the inbox can be assembled with a fixed number of
/// queries regardless of how many threads the caller has.
pub trait MessagingRepository: Send + Sync {
    /// Insert a thread, failing with [`RepositoryError::Conflict`] when one
    /// already exists for the same listing and buyer.
    fn insert_conversation(
        &self,
        conversation: Conversation,
    ) -> Result<Conversation, RepositoryError>;
    fn fetch_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError>;
    fn find_conversation(
        &self,
        listing_id: &ListingId,
        buyer_id: &UserId,
    ) -> Result<Option<Conversation>, RepositoryError>;
    /// Every thread where the user is buyer or seller, in any order.
    fn conversations_for(&self, user_id: &UserId) -> Result<Vec<Conversation>, RepositoryError>;
    fn touch_conversation(
        &self,
        id: &ConversationId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    fn insert_message(&self, message: Message) -> Result<Message, RepositoryError>;
    /// Messages of one thread ordered by `created_at` ascending.
    fn thread_messages(&self, id: &ConversationId) -> Result<Vec<Message>, RepositoryError>;
    /// Most recent message per thread; threads without messages are absent.
    fn latest_messages(
        &self,
        ids: &[ConversationId],
    ) -> Result<HashMap<ConversationId, Message>, RepositoryError>;
    /// Unread messages per thread not sent by `reader`; zero counts may be absent.
    fn unread_counts(
        &self,
        ids: &[ConversationId],
        reader: &UserId,
    ) -> Result<HashMap<ConversationId, u32>, RepositoryError>;
    /// Flip `is_read` on unread messages not sent by `reader`, returning how many changed.
    fn mark_read(&self, id: &ConversationId, reader: &UserId) -> Result<usize, RepositoryError>;
}

/// Read access to listings and profiles owned by other parts of the marketplace.
pub trait MarketplaceDirectory: Send + Sync {
    fn listing_owner(&self, id: &ListingId) -> Result<Option<UserId>, RepositoryError>;
    fn listing_summaries(
        &self,
        ids: &[ListingId],
    ) -> Result<HashMap<ListingId, ListingSummary>, RepositoryError>;
    fn profiles(&self, ids: &[UserId]) -> Result<HashMap<UserId, ProfileSummary>, RepositoryError>;
}
