// models/offermodel.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "offer_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
    Completed,
    Canceled,
}

impl OfferStatus {
    /// Rejected, completed and canceled offers admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OfferStatus::Rejected | OfferStatus::Completed | OfferStatus::Canceled
        )
    }

    pub fn can_transition_to(&self, to: OfferStatus) -> bool {
        match (self, to) {
            (OfferStatus::Pending, OfferStatus::Accepted) => true,
            (OfferStatus::Pending, OfferStatus::Rejected) => true,
            (OfferStatus::Accepted, OfferStatus::Completed) => true,
            (OfferStatus::Accepted, OfferStatus::Canceled) => true,
            _ => false,
        }
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            OfferStatus::Pending => "pending",
            OfferStatus::Accepted => "accepted",
            OfferStatus::Rejected => "rejected",
            OfferStatus::Completed => "completed",
            OfferStatus::Canceled => "canceled",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "job_posting_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobPostingStatus {
    Active,
    Deleted,
}

/// Read-only view over the externally managed posting store.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobPosting {
    pub id: Uuid,
    pub created_by: Uuid,
    pub title: String,
    pub price: i64, // in cents
    pub status: JobPostingStatus,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Offer {
    pub id: Uuid,
    pub job_posting_id: Uuid,
    pub applicant_id: Uuid,
    pub advertiser_id: Uuid,
    pub title: String,
    pub description: String,
    pub offer_price: i64, // in cents
    pub status: OfferStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_branches_to_accepted_or_rejected() {
        assert!(OfferStatus::Pending.can_transition_to(OfferStatus::Accepted));
        assert!(OfferStatus::Pending.can_transition_to(OfferStatus::Rejected));
        assert!(!OfferStatus::Pending.can_transition_to(OfferStatus::Completed));
        assert!(!OfferStatus::Pending.can_transition_to(OfferStatus::Canceled));
    }

    #[test]
    fn accepted_branches_to_completed_or_canceled() {
        assert!(OfferStatus::Accepted.can_transition_to(OfferStatus::Completed));
        assert!(OfferStatus::Accepted.can_transition_to(OfferStatus::Canceled));
        assert!(!OfferStatus::Accepted.can_transition_to(OfferStatus::Rejected));
        assert!(!OfferStatus::Accepted.can_transition_to(OfferStatus::Pending));
    }

    #[test]
    fn terminal_states_admit_nothing() {
        for terminal in [
            OfferStatus::Rejected,
            OfferStatus::Completed,
            OfferStatus::Canceled,
        ] {
            assert!(terminal.is_terminal());
            for to in [
                OfferStatus::Pending,
                OfferStatus::Accepted,
                OfferStatus::Rejected,
                OfferStatus::Completed,
                OfferStatus::Canceled,
            ] {
                assert!(!terminal.can_transition_to(to));
            }
        }
    }

    #[test]
    fn pending_and_accepted_are_live() {
        assert!(!OfferStatus::Pending.is_terminal());
        assert!(!OfferStatus::Accepted.is_terminal());
    }
}
