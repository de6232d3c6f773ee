// db/chatdb.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Error, Postgres, Transaction};
use uuid::Uuid;

use super::db::DBClient;
use crate::models::chatmodel::{ChatSession, Message, MessageKind};
use crate::models::offermodel::Offer;

const SESSION_COLUMNS: &str = r#"
    id, offer_id, advertiser_id, applicant_id, last_message_at, created_at
"#;

const MESSAGE_COLUMNS: &str = r#"
    id, session_id, sender_id, kind, content, media_ref, created_at
"#;

#[async_trait]
pub trait ChatExt {
    async fn get_session(&self, session_id: Uuid) -> Result<Option<ChatSession>, Error>;

    async fn get_session_by_offer(&self, offer_id: Uuid) -> Result<Option<ChatSession>, Error>;

    async fn list_sessions_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ChatSession>, Error>;

    /// Ascending by (created_at, id); `after` is the cursor from the last
    /// message a client has seen, so the listing is restartable. The id
    /// tiebreaker keeps equal-timestamp messages from being skipped.
    async fn list_messages(
        &self,
        session_id: Uuid,
        after: Option<(DateTime<Utc>, Uuid)>,
        limit: i64,
    ) -> Result<Vec<Message>, Error>;
}

#[async_trait]
impl ChatExt for DBClient {
    async fn get_session(&self, session_id: Uuid) -> Result<Option<ChatSession>, Error> {
        sqlx::query_as::<_, ChatSession>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM chat_sessions
            WHERE id = $1
            "#
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_session_by_offer(&self, offer_id: Uuid) -> Result<Option<ChatSession>, Error> {
        sqlx::query_as::<_, ChatSession>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM chat_sessions
            WHERE offer_id = $1
            "#
        ))
        .bind(offer_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn list_sessions_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ChatSession>, Error> {
        sqlx::query_as::<_, ChatSession>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM chat_sessions
            WHERE advertiser_id = $1 OR applicant_id = $1
            ORDER BY last_message_at DESC NULLS LAST, created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn list_messages(
        &self,
        session_id: Uuid,
        after: Option<(DateTime<Utc>, Uuid)>,
        limit: i64,
    ) -> Result<Vec<Message>, Error> {
        match after {
            Some((cursor_ts, cursor_id)) => {
                sqlx::query_as::<_, Message>(&format!(
                    r#"
                    SELECT {MESSAGE_COLUMNS}
                    FROM messages
                    WHERE session_id = $1 AND (created_at, id) > ($2, $3)
                    ORDER BY created_at ASC, id ASC
                    LIMIT $4
                    "#
                ))
                .bind(session_id)
                .bind(cursor_ts)
                .bind(cursor_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, Message>(&format!(
                    r#"
                    SELECT {MESSAGE_COLUMNS}
                    FROM messages
                    WHERE session_id = $1
                    ORDER BY created_at ASC, id ASC
                    LIMIT $2
                    "#
                ))
                .bind(session_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
        }
    }
}

/// Appends a message with a server-assigned timestamp and bumps the
/// session's last_message_at, inside the caller's transaction. Run under a
/// shared lock on the owning offer so the accepted-only gate and the insert
/// commit together.
pub async fn append_message(
    tx: &mut Transaction<'_, Postgres>,
    session_id: Uuid,
    sender_id: Uuid,
    kind: MessageKind,
    content: String,
    media_ref: Option<String>,
) -> Result<Message, Error> {
    let message = sqlx::query_as::<_, Message>(&format!(
        r#"
        INSERT INTO messages (session_id, sender_id, kind, content, media_ref)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {MESSAGE_COLUMNS}
        "#
    ))
    .bind(session_id)
    .bind(sender_id)
    .bind(kind)
    .bind(content)
    .bind(media_ref)
    .fetch_one(&mut **tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE chat_sessions
        SET last_message_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(session_id)
    .execute(&mut **tx)
    .await?;

    Ok(message)
}

/// Get-or-create inside the accept transaction. The UNIQUE constraint on
/// offer_id makes concurrent calls for the same offer converge on one row.
pub async fn get_or_create_session(
    tx: &mut Transaction<'_, Postgres>,
    offer: &Offer,
) -> Result<ChatSession, Error> {
    let inserted = sqlx::query_as::<_, ChatSession>(&format!(
        r#"
        INSERT INTO chat_sessions (offer_id, advertiser_id, applicant_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (offer_id) DO NOTHING
        RETURNING {SESSION_COLUMNS}
        "#
    ))
    .bind(offer.id)
    .bind(offer.advertiser_id)
    .bind(offer.applicant_id)
    .fetch_optional(&mut **tx)
    .await?;

    if let Some(session) = inserted {
        return Ok(session);
    }

    sqlx::query_as::<_, ChatSession>(&format!(
        r#"
        SELECT {SESSION_COLUMNS}
        FROM chat_sessions
        WHERE offer_id = $1
        "#
    ))
    .bind(offer.id)
    .fetch_one(&mut **tx)
    .await
}
