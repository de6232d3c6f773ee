// db/offerdb.rs
use async_trait::async_trait;
use sqlx::{Error, Postgres, Transaction};
use uuid::Uuid;

use super::db::DBClient;
use crate::models::offermodel::{Offer, OfferStatus};

const OFFER_COLUMNS: &str = r#"
    id, job_posting_id, applicant_id, advertiser_id, title, description,
    offer_price, status, created_at, updated_at
"#;

#[async_trait]
pub trait OfferExt {
    /// Inserts a pending offer. The partial unique index on
    /// (job_posting_id, applicant_id) rejects a second live bid; the caller
    /// maps that violation to a typed error.
    async fn create_offer(
        &self,
        job_posting_id: Uuid,
        applicant_id: Uuid,
        advertiser_id: Uuid,
        title: String,
        description: String,
        offer_price: i64,
    ) -> Result<Offer, Error>;

    async fn get_offer(&self, offer_id: Uuid) -> Result<Option<Offer>, Error>;

    async fn list_offers_by_advertiser(
        &self,
        advertiser_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Offer>, Error>;

    async fn list_offers_by_applicant(
        &self,
        applicant_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Offer>, Error>;
}

#[async_trait]
impl OfferExt for DBClient {
    async fn create_offer(
        &self,
        job_posting_id: Uuid,
        applicant_id: Uuid,
        advertiser_id: Uuid,
        title: String,
        description: String,
        offer_price: i64,
    ) -> Result<Offer, Error> {
        sqlx::query_as::<_, Offer>(&format!(
            r#"
            INSERT INTO offers
            (job_posting_id, applicant_id, advertiser_id, title, description, offer_price)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {OFFER_COLUMNS}
            "#
        ))
        .bind(job_posting_id)
        .bind(applicant_id)
        .bind(advertiser_id)
        .bind(title)
        .bind(description)
        .bind(offer_price)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_offer(&self, offer_id: Uuid) -> Result<Option<Offer>, Error> {
        sqlx::query_as::<_, Offer>(&format!(
            r#"
            SELECT {OFFER_COLUMNS}
            FROM offers
            WHERE id = $1
            "#
        ))
        .bind(offer_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn list_offers_by_advertiser(
        &self,
        advertiser_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Offer>, Error> {
        sqlx::query_as::<_, Offer>(&format!(
            r#"
            SELECT {OFFER_COLUMNS}
            FROM offers
            WHERE advertiser_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(advertiser_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn list_offers_by_applicant(
        &self,
        applicant_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Offer>, Error> {
        sqlx::query_as::<_, Offer>(&format!(
            r#"
            SELECT {OFFER_COLUMNS}
            FROM offers
            WHERE applicant_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(applicant_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }
}

/// Row-lock an offer for the duration of a transition. Transitions on the
/// same offer serialize here, so none can observe a stale status.
pub async fn get_offer_for_update(
    tx: &mut Transaction<'_, Postgres>,
    offer_id: Uuid,
) -> Result<Option<Offer>, Error> {
    sqlx::query_as::<_, Offer>(&format!(
        r#"
        SELECT {OFFER_COLUMNS}
        FROM offers
        WHERE id = $1
        FOR UPDATE
        "#
    ))
    .bind(offer_id)
    .fetch_optional(&mut **tx)
    .await
}

/// Shared lock on an offer row. Blocks transitions (which take FOR UPDATE)
/// until the caller commits, while allowing concurrent shared readers, so a
/// gate checked under it cannot go stale before the transaction ends.
pub async fn get_offer_for_share(
    tx: &mut Transaction<'_, Postgres>,
    offer_id: Uuid,
) -> Result<Option<Offer>, Error> {
    sqlx::query_as::<_, Offer>(&format!(
        r#"
        SELECT {OFFER_COLUMNS}
        FROM offers
        WHERE id = $1
        FOR SHARE
        "#
    ))
    .bind(offer_id)
    .fetch_optional(&mut **tx)
    .await
}

/// Compare-and-set status update: only applies when the row still holds
/// `from`. Returns None when the guard missed.
pub async fn update_status_guarded(
    tx: &mut Transaction<'_, Postgres>,
    offer_id: Uuid,
    from: OfferStatus,
    to: OfferStatus,
) -> Result<Option<Offer>, Error> {
    sqlx::query_as::<_, Offer>(&format!(
        r#"
        UPDATE offers
        SET status = $3, updated_at = NOW()
        WHERE id = $1 AND status = $2
        RETURNING {OFFER_COLUMNS}
        "#
    ))
    .bind(offer_id)
    .bind(from)
    .bind(to)
    .fetch_optional(&mut **tx)
    .await
}
