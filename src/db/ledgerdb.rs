// db/ledgerdb.rs
use async_trait::async_trait;
use sqlx::{Error, Postgres, Row, Transaction};
use uuid::Uuid;

use super::db::DBClient;
use crate::models::ledgermodel::{EntryDirection, LedgerEntry, LedgerEntryKind};

const ENTRY_COLUMNS: &str = r#"
    id, user_id, offer_id, kind, direction, amount,
    balance_after, description, timezone, created_at
"#;

#[async_trait]
pub trait LedgerExt {
    async fn get_balance(&self, user_id: Uuid) -> Result<Option<i64>, Error>;

    /// External trusted credit. The payment gateway has already settled the
    /// funds; this only records them. `timezone` is the client-device label
    /// for the statement row, defaulting to UTC.
    async fn top_up(
        &self,
        user_id: Uuid,
        amount: i64,
        timezone: Option<String>,
    ) -> Result<LedgerEntry, Error>;

    async fn get_ledger_entries(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LedgerEntry>, Error>;
}

#[async_trait]
impl LedgerExt for DBClient {
    async fn get_balance(&self, user_id: Uuid) -> Result<Option<i64>, Error> {
        let row = sqlx::query("SELECT balance FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get::<i64, _>("balance")))
    }

    async fn top_up(
        &self,
        user_id: Uuid,
        amount: i64,
        timezone: Option<String>,
    ) -> Result<LedgerEntry, Error> {
        let mut tx = self.pool.begin().await?;

        let entry = apply_credit(
            &mut tx,
            user_id,
            None,
            amount,
            LedgerEntryKind::TopUp,
            "Balance top-up",
            timezone.as_deref(),
        )
        .await?;

        tx.commit().await?;
        Ok(entry)
    }

    async fn get_ledger_entries(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LedgerEntry>, Error> {
        sqlx::query_as::<_, LedgerEntry>(&format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM ledger_entries
            WHERE user_id = $1
            ORDER BY created_at ASC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }
}

/// Canonical user-row lock order. Transactions that lock two balances take
/// them in ascending id order so concurrent settlements with swapped roles
/// cannot deadlock.
pub fn lock_order(a: Uuid, b: Uuid) -> [Uuid; 2] {
    if a <= b {
        [a, b]
    } else {
        [b, a]
    }
}

/// Row-lock a user's balance. Concurrent transitions touching the same user
/// serialize here; unrelated users proceed independently.
pub async fn lock_balance(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
) -> Result<Option<i64>, Error> {
    let row = sqlx::query("SELECT balance FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;

    Ok(row.map(|r| r.get::<i64, _>("balance")))
}

/// Balance increment plus its ledger entry, inside the caller's transaction.
pub async fn apply_credit(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    offer_id: Option<Uuid>,
    amount: i64,
    kind: LedgerEntryKind,
    description: &str,
    timezone: Option<&str>,
) -> Result<LedgerEntry, Error> {
    let row = sqlx::query(
        r#"
        UPDATE users
        SET balance = balance + $2, updated_at = NOW()
        WHERE id = $1
        RETURNING balance
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .fetch_one(&mut **tx)
    .await?;

    record_entry(
        tx,
        user_id,
        offer_id,
        kind,
        EntryDirection::Credit,
        amount,
        row.get::<i64, _>("balance"),
        description,
        timezone,
    )
    .await
}

/// Balance decrement plus its ledger entry. The caller must have verified
/// sufficient funds under the same `lock_balance` lock; the CHECK constraint
/// on `users.balance` is the last line of defense.
pub async fn apply_debit(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    offer_id: Option<Uuid>,
    amount: i64,
    kind: LedgerEntryKind,
    description: &str,
    timezone: Option<&str>,
) -> Result<LedgerEntry, Error> {
    let row = sqlx::query(
        r#"
        UPDATE users
        SET balance = balance - $2, updated_at = NOW()
        WHERE id = $1
        RETURNING balance
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .fetch_one(&mut **tx)
    .await?;

    record_entry(
        tx,
        user_id,
        offer_id,
        kind,
        EntryDirection::Debit,
        amount,
        row.get::<i64, _>("balance"),
        description,
        timezone,
    )
    .await
}

/// Append one immutable ledger row. Never updates or removes prior entries.
#[allow(clippy::too_many_arguments)]
pub async fn record_entry(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    offer_id: Option<Uuid>,
    kind: LedgerEntryKind,
    direction: EntryDirection,
    amount: i64,
    balance_after: i64,
    description: &str,
    timezone: Option<&str>,
) -> Result<LedgerEntry, Error> {
    sqlx::query_as::<_, LedgerEntry>(&format!(
        r#"
        INSERT INTO ledger_entries
        (user_id, offer_id, kind, direction, amount, balance_after, description, timezone)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {ENTRY_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(offer_id)
    .bind(kind)
    .bind(direction)
    .bind(amount)
    .bind(balance_after)
    .bind(description)
    .bind(timezone.unwrap_or("UTC"))
    .fetch_one(&mut **tx)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_order_is_ascending_and_symmetric() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert_eq!(lock_order(a, b), lock_order(b, a));

        let [first, second] = lock_order(a, b);
        assert!(first <= second);
        assert_eq!(lock_order(a, a), [a, a]);
    }
}
