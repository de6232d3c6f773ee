// models/ledgermodel.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "ledger_entry_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryKind {
    EscrowDebit,
    EscrowCredit,
    Refund,
    TopUp,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "entry_direction", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntryDirection {
    Credit,
    Debit,
}

/// Immutable once appended; insertion order is chronological order.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub offer_id: Option<Uuid>,
    pub kind: LedgerEntryKind,
    pub direction: EntryDirection,
    pub amount: i64, // in cents, always positive
    pub balance_after: i64,
    pub description: String,
    pub timezone: String,
    pub created_at: Option<DateTime<Utc>>,
}
