use async_trait::async_trait;

use crate::contact::{
    dto::ContactCreated,
    repo_types::{ContactMessage, NewContact},
};
use crate::db::PgStore;

/// Message store.
#[async_trait]
pub trait ContactRepo: Send + Sync {
    /// Insert a submission stamped with the store's current time.
    async fn insert(&self, contact: &NewContact) -> anyhow::Result<ContactCreated>;

    /// Newest first, at most `limit` rows.
    async fn recent(&self, limit: i64) -> anyhow::Result<Vec<ContactMessage>>;
}

#[async_trait]
impl ContactRepo for PgStore {
    async fn insert(&self, contact: &NewContact) -> anyhow::Result<ContactCreated> {
        let (id, created_at) = sqlx::query_as::<_, (i64, time::OffsetDateTime)>(
            r#"
            INSERT INTO contacts (name, email, message, created_at)
            VALUES ($1, $2, $3, now())
            RETURNING id, created_at
            "#,
        )
        .bind(&contact.name)
        .bind(&contact.email)
        .bind(&contact.message)
        .fetch_one(&self.pool)
        .await?;
        Ok(ContactCreated { id, created_at })
    }

    async fn recent(&self, limit: i64) -> anyhow::Result<Vec<ContactMessage>> {
        let rows = sqlx::query_as::<_, ContactMessage>(
            r#"
            SELECT id, name, email, message, created_at
            FROM contacts
            ORDER BY created_at DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
