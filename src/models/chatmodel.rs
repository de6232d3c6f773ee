// models/chatmodel.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "message_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Document,
}

/// The one conversation bound to an accepted offer. Outlives the offer's
/// terminal states so history stays readable.
#[derive(Debug, Serialize, Clone, Deserialize, sqlx::FromRow)]
pub struct ChatSession {
    pub id: Uuid,
    pub offer_id: Uuid,
    pub advertiser_id: Uuid,
    pub applicant_id: Uuid,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl ChatSession {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.advertiser_id == user_id || self.applicant_id == user_id
    }

    pub fn other_participant(&self, user_id: Uuid) -> Uuid {
        if self.advertiser_id == user_id {
            self.applicant_id
        } else {
            self.advertiser_id
        }
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Message {
    pub id: Uuid,
    pub session_id: Uuid,
    pub sender_id: Uuid,
    pub kind: MessageKind,
    pub content: String,
    pub media_ref: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(advertiser: Uuid, applicant: Uuid) -> ChatSession {
        ChatSession {
            id: Uuid::new_v4(),
            offer_id: Uuid::new_v4(),
            advertiser_id: advertiser,
            applicant_id: applicant,
            last_message_at: None,
            created_at: None,
        }
    }

    #[test]
    fn participant_check_covers_both_sides_only() {
        let advertiser = Uuid::new_v4();
        let applicant = Uuid::new_v4();
        let s = session(advertiser, applicant);

        assert!(s.is_participant(advertiser));
        assert!(s.is_participant(applicant));
        assert!(!s.is_participant(Uuid::new_v4()));
    }

    #[test]
    fn other_participant_flips_sides() {
        let advertiser = Uuid::new_v4();
        let applicant = Uuid::new_v4();
        let s = session(advertiser, applicant);

        assert_eq!(s.other_participant(advertiser), applicant);
        assert_eq!(s.other_participant(applicant), advertiser);
    }
}
