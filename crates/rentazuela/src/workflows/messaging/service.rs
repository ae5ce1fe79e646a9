use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::domain::{
    Conversation, ConversationId, ConversationSummary, ConversationThread, Message, MessageId,
};
use super::repository::{MarketplaceDirectory, MessagingRepository};
use crate::workflows::shared::{CallerIdentity, ErrorKind, ListingId, RepositoryError, UserId};

/// Limits applied to inbound messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessagingPolicy {
    pub max_message_chars: usize,
}

impl Default for MessagingPolicy {
    fn default() -> Self {
        Self {
            max_message_chars: 5000,
        }
    }
}

/// Buyer/seller inbox backed by the messaging tables and the marketplace directory.
///
/// Reads never fail: anonymous callers and storage errors degrade to empty
/// results. Writes return a [`MessagingError`] whose message is user facing.
pub struct MessagingService<R, D> {
    repository: Arc<R>,
    directory: Arc<D>,
    policy: MessagingPolicy,
}

impl<R, D> MessagingService<R, D>
where
    R: MessagingRepository + 'static,
    D: MarketplaceDirectory + 'static,
{
    pub fn new(repository: Arc<R>, directory: Arc<D>, policy: MessagingPolicy) -> Self {
        Self {
            repository,
            directory,
            policy,
        }
    }

    pub fn policy(&self) -> MessagingPolicy {
        self.policy
    }

    /// Every thread the caller takes part in, most recently updated first.
    pub fn conversations(&self, caller: &CallerIdentity) -> Vec<ConversationSummary> {
        let Some(user_id) = caller.user_id() else {
            return Vec::new();
        };

        match self.load_inbox(user_id) {
            Ok(summaries) => summaries,
            Err(err) => {
                error!(user_id = %user_id, error = %err, "failed to load conversations");
                Vec::new()
            }
        }
    }

    /// One thread with its full history. Non-participants get `None`.
    pub fn conversation(
        &self,
        caller: &CallerIdentity,
        id: &ConversationId,
    ) -> Option<ConversationThread> {
        let user_id = caller.user_id()?;

        let conversation = match self.repository.fetch_conversation(id) {
            Ok(Some(conversation)) => conversation,
            Ok(None) => return None,
            Err(err) => {
                error!(conversation_id = %id, error = %err, "failed to fetch conversation");
                return None;
            }
        };

        if !conversation.is_participant(user_id) {
            warn!(conversation_id = %id, user_id = %user_id, "thread read denied to non-participant");
            return None;
        }

        let messages = match self.repository.thread_messages(id) {
            Ok(messages) => messages,
            Err(err) => {
                error!(conversation_id = %id, error = %err, "failed to fetch thread messages");
                return None;
            }
        };

        let counterpart = conversation.counterpart_of(user_id).clone();
        let listings = degrade(
            self.directory
                .listing_summaries(std::slice::from_ref(&conversation.listing_id)),
            "listing summaries",
        );
        let profiles = degrade(
            self.directory.profiles(std::slice::from_ref(&counterpart)),
            "profiles",
        );
        let listing = listings.get(&conversation.listing_id);

        Some(ConversationThread {
            conversation: ConversationSummary::build(
                &conversation,
                user_id,
                listing,
                profiles.get(&counterpart),
            ),
            listing_city: listing.map(|listing| listing.city.clone()),
            listing_state: listing.map(|listing| listing.state.clone()),
            messages,
        })
    }

    /// Open (or reuse) the caller's thread with the owner of `listing_id`.
    pub fn create_conversation(
        &self,
        caller: &CallerIdentity,
        listing_id: &ListingId,
    ) -> Result<ConversationId, MessagingError> {
        let buyer_id = caller.user_id().ok_or(MessagingError::Unauthenticated)?;

        let seller_id = self
            .directory
            .listing_owner(listing_id)
            .map_err(|err| creation_failed(listing_id, err))?
            .ok_or(MessagingError::ListingNotFound)?;

        if &seller_id == buyer_id {
            return Err(MessagingError::OwnListing);
        }

        if let Some(existing) = self
            .repository
            .find_conversation(listing_id, buyer_id)
            .map_err(|err| creation_failed(listing_id, err))?
        {
            debug!(conversation_id = %existing.id, "reusing existing conversation");
            return Ok(existing.id);
        }

        let now = Utc::now();
        let conversation = Conversation {
            id: ConversationId(Uuid::new_v4().to_string()),
            listing_id: listing_id.clone(),
            buyer_id: buyer_id.clone(),
            seller_id,
            created_at: now,
            updated_at: now,
        };

        match self.repository.insert_conversation(conversation) {
            Ok(stored) => {
                info!(
                    conversation_id = %stored.id,
                    listing_id = %listing_id,
                    buyer_id = %buyer_id,
                    "conversation opened"
                );
                Ok(stored.id)
            }
            // Lost a race against a concurrent open for the same pair.
            Err(RepositoryError::Conflict) => self
                .repository
                .find_conversation(listing_id, buyer_id)
                .map_err(|err| creation_failed(listing_id, err))?
                .map(|existing| existing.id)
                .ok_or_else(|| creation_failed(listing_id, RepositoryError::NotFound)),
            Err(err) => Err(creation_failed(listing_id, err)),
        }
    }

    /// Append a message from the caller to a thread they participate in.
    pub fn send_message(
        &self,
        caller: &CallerIdentity,
        id: &ConversationId,
        content: &str,
    ) -> Result<Message, MessagingError> {
        let sender_id = caller.user_id().ok_or(MessagingError::Unauthenticated)?;
        self.participant_conversation(sender_id, id, MessagingError::SendFailed)?;

        if content.trim().is_empty() {
            return Err(MessagingError::EmptyMessage);
        }
        if content.chars().count() > self.policy.max_message_chars {
            return Err(MessagingError::MessageTooLong {
                max: self.policy.max_message_chars,
            });
        }

        let now = Utc::now();
        let message = Message {
            id: MessageId(Uuid::new_v4().to_string()),
            conversation_id: id.clone(),
            sender_id: sender_id.clone(),
            content: content.to_string(),
            is_read: false,
            created_at: now,
        };

        let stored = self.repository.insert_message(message).map_err(|err| {
            error!(conversation_id = %id, error = %err, "failed to store message");
            MessagingError::SendFailed(err)
        })?;

        if let Err(err) = self.repository.touch_conversation(id, now) {
            warn!(conversation_id = %id, error = %err, "message stored but thread timestamp not bumped");
        }

        Ok(stored)
    }

    /// Mark every inbound unread message of the thread as read. Idempotent.
    pub fn mark_messages_as_read(
        &self,
        caller: &CallerIdentity,
        id: &ConversationId,
    ) -> Result<usize, MessagingError> {
        let reader_id = caller.user_id().ok_or(MessagingError::Unauthenticated)?;
        self.participant_conversation(reader_id, id, MessagingError::MarkReadFailed)?;

        let updated = self.repository.mark_read(id, reader_id).map_err(|err| {
            error!(conversation_id = %id, error = %err, "failed to mark messages as read");
            MessagingError::MarkReadFailed(err)
        })?;

        debug!(conversation_id = %id, updated, "messages marked as read");
        Ok(updated)
    }

    /// Badge count: inbound unread messages across all of the caller's threads.
    pub fn unread_messages_count(&self, caller: &CallerIdentity) -> u32 {
        let Some(user_id) = caller.user_id() else {
            return 0;
        };

        let total = self
            .repository
            .conversations_for(user_id)
            .and_then(|conversations| {
                if conversations.is_empty() {
                    return Ok(HashMap::new());
                }
                let ids: Vec<ConversationId> =
                    conversations.into_iter().map(|conversation| conversation.id).collect();
                self.repository.unread_counts(&ids, user_id)
            })
            .map(|counts| counts.values().sum::<u32>());

        match total {
            Ok(total) => total,
            Err(err) => {
                error!(user_id = %user_id, error = %err, "failed to count unread messages");
                0
            }
        }
    }
}

impl<R, D> MessagingService<R, D>
where
    R: MessagingRepository + 'static,
    D: MarketplaceDirectory + 'static,
{
    fn load_inbox(&self, user_id: &UserId) -> Result<Vec<ConversationSummary>, RepositoryError> {
        let mut conversations = self.repository.conversations_for(user_id)?;
        if conversations.is_empty() {
            return Ok(Vec::new());
        }
        conversations.sort_by(|left, right| right.updated_at.cmp(&left.updated_at));

        let ids: Vec<ConversationId> = conversations
            .iter()
            .map(|conversation| conversation.id.clone())
            .collect();
        let listing_ids = distinct(
            conversations
                .iter()
                .map(|conversation| conversation.listing_id.clone()),
        );
        let counterpart_ids = distinct(
            conversations
                .iter()
                .map(|conversation| conversation.counterpart_of(user_id).clone()),
        );

        let listings = degrade(
            self.directory.listing_summaries(&listing_ids),
            "listing summaries",
        );
        let profiles = degrade(self.directory.profiles(&counterpart_ids), "profiles");
        let latest = degrade(self.repository.latest_messages(&ids), "latest messages");
        // Unread counts feed the badge as well, so a failure here fails the inbox.
        let unread = self.repository.unread_counts(&ids, user_id)?;

        Ok(conversations
            .iter()
            .map(|conversation| {
                let mut summary = ConversationSummary::build(
                    conversation,
                    user_id,
                    listings.get(&conversation.listing_id),
                    profiles.get(conversation.counterpart_of(user_id)),
                );
                if let Some(message) = latest.get(&conversation.id) {
                    summary.last_message = Some(message.content.clone());
                    summary.last_message_at = Some(message.created_at);
                }
                summary.unread_count = unread.get(&conversation.id).copied().unwrap_or(0);
                summary
            })
            .collect())
    }

    fn participant_conversation(
        &self,
        user_id: &UserId,
        id: &ConversationId,
        on_error: fn(RepositoryError) -> MessagingError,
    ) -> Result<Conversation, MessagingError> {
        let conversation = self.repository.fetch_conversation(id).map_err(|err| {
            error!(conversation_id = %id, error = %err, "failed to fetch conversation");
            on_error(err)
        })?;

        match conversation {
            Some(conversation) if conversation.is_participant(user_id) => Ok(conversation),
            _ => {
                warn!(conversation_id = %id, user_id = %user_id, "conversation access denied");
                Err(MessagingError::AccessDenied)
            }
        }
    }
}

fn creation_failed(listing_id: &ListingId, err: RepositoryError) -> MessagingError {
    error!(listing_id = %listing_id, error = %err, "failed to create conversation");
    MessagingError::CreateFailed(err)
}

fn distinct<T: Ord>(items: impl Iterator<Item = T>) -> Vec<T> {
    items.collect::<BTreeSet<T>>().into_iter().collect()
}

fn degrade<K, V>(
    result: Result<HashMap<K, V>, RepositoryError>,
    what: &'static str,
) -> HashMap<K, V>
where
    K: Eq + Hash,
{
    result.unwrap_or_else(|err| {
        warn!(error = %err, "unable to load {what}; continuing without them");
        HashMap::new()
    })
}

/// Error raised by messaging writes. `Display` is the message shown to the user.
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("Debes iniciar sesión")]
    Unauthenticated,
    #[error("Anuncio no encontrado")]
    ListingNotFound,
    #[error("No puedes iniciar una conversación con tu propio anuncio")]
    OwnListing,
    #[error("No tienes acceso a esta conversación")]
    AccessDenied,
    #[error("El mensaje no puede estar vacío")]
    EmptyMessage,
    #[error("El mensaje no puede superar los {max} caracteres")]
    MessageTooLong { max: usize },
    #[error("Error al crear la conversación")]
    CreateFailed(#[source] RepositoryError),
    #[error("Error al enviar el mensaje")]
    SendFailed(#[source] RepositoryError),
    #[error("Error al marcar los mensajes como leídos")]
    MarkReadFailed(#[source] RepositoryError),
}

impl MessagingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MessagingError::Unauthenticated => ErrorKind::Unauthenticated,
            MessagingError::ListingNotFound => ErrorKind::NotFound,
            MessagingError::OwnListing | MessagingError::AccessDenied => ErrorKind::Forbidden,
            MessagingError::EmptyMessage | MessagingError::MessageTooLong { .. } => {
                ErrorKind::ValidationFailed
            }
            MessagingError::CreateFailed(_)
            | MessagingError::SendFailed(_)
            | MessagingError::MarkReadFailed(_) => ErrorKind::PersistenceFailure,
        }
    }
}
