// dtos/chatdtos.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    chatmodel::{ChatSession, Message, MessageKind},
    offermodel::OfferStatus,
};

#[derive(Debug, Deserialize, Validate)]
pub struct PostMessageDto {
    #[validate(length(min = 1, max = 5000))]
    pub content: String,

    pub kind: Option<MessageKind>,

    /// Reference minted by the external file store; required for media
    /// kinds, forbidden for text.
    pub media_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageListQuery {
    /// Cursor: created_at of the last message the client has seen.
    pub after: Option<DateTime<Utc>>,
    /// Id of that message; breaks ties between equal timestamps.
    pub after_id: Option<Uuid>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// A session together with the authoritative offer status both parties see.
#[derive(Debug, Serialize)]
pub struct SessionResponseDto {
    pub session: ChatSession,
    pub offer_status: OfferStatus,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponseDto {
    pub messages: Vec<Message>,
    /// Pass back as `after` / `after_id` to resume the listing.
    pub next_cursor: Option<DateTime<Utc>>,
    pub next_cursor_id: Option<Uuid>,
}

impl MessagesResponseDto {
    /// Cursor = (created_at, id) of the last message in the page. The id
    /// tiebreaker means resuming never skips a message that shares the
    /// cursor timestamp.
    pub fn paginate(messages: Vec<Message>) -> Self {
        let next_cursor = messages.last().and_then(|m| m.created_at);
        let next_cursor_id = messages.last().map(|m| m.id);
        Self {
            messages,
            next_cursor,
            next_cursor_id,
        }
    }
}
