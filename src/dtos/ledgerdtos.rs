// dtos/ledgerdtos.rs
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{ledgermodel::LedgerEntry, offermodel::Offer};

#[derive(Debug, Deserialize, Validate)]
pub struct TopUpDto {
    /// In cents. The payment gateway has already captured the funds; this
    /// endpoint only credits the ledger.
    #[validate(range(min = 1, message = "Amount must be positive"))]
    pub amount: i64,

    /// Client-device timezone label for the statement row; defaults to UTC.
    pub timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LedgerQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponseDto {
    pub balance: i64,
    pub balance_dollars: f64,
}

/// The accounting view: balance, history, and both sides of the actor's
/// offer activity.
#[derive(Debug, Serialize)]
pub struct LedgerSummaryDto {
    pub balance: i64,
    pub entries: Vec<LedgerEntry>,
    pub offers_received: Vec<Offer>,
    pub offers_sent: Vec<Offer>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_up_timezone_is_optional() {
        let dto: TopUpDto = serde_json::from_str(r#"{"amount": 500}"#).unwrap();
        assert_eq!(dto.timezone, None);

        let dto: TopUpDto =
            serde_json::from_str(r#"{"amount": 500, "timezone": "Europe/Berlin"}"#).unwrap();
        assert_eq!(dto.timezone.as_deref(), Some("Europe/Berlin"));
    }
}
