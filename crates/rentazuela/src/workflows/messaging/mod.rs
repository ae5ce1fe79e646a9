//! Buyer/seller conversations scoped to a single listing.
//!
//! The service aggregates inbox rows from batch queries against
//! [`MessagingRepository`] and [`MarketplaceDirectory`], and guards every
//! write behind participant checks.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    Conversation, ConversationId, ConversationSummary, ConversationThread, ListingSummary,
    Message, MessageId, ProfileSummary,
};
pub use repository::{MarketplaceDirectory, MessagingRepository};
pub use router::messaging_router;
pub use service::{MessagingError, MessagingPolicy, MessagingService};
