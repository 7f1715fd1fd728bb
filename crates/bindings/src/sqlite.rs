use std::{
    str::FromStr,
    time::{SystemTime, UNIX_EPOCH},
};

use {anyhow::Result, async_trait::async_trait, sqlx::SqlitePool};

use courier_channels::ChannelKind;

use crate::{Binding, BindingStore};

/// Internal row type for sqlx mapping.
#[derive(sqlx::FromRow)]
struct BindingRow {
    id: String,
    user_id: String,
    channel: String,
    chat_id: String,
    api_key: Option<String>,
    language: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<BindingRow> for Binding {
    type Error = anyhow::Error;

    fn try_from(r: BindingRow) -> Result<Self> {
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            channel: ChannelKind::from_str(&r.channel)?,
            chat_id: r.chat_id,
            api_key: r.api_key,
            language: r.language,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// SQLite-backed binding store.
pub struct SqliteBindingStore {
    pool: SqlitePool,
}

impl SqliteBindingStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the bindings table schema.
    ///
    /// Called once by the embedder at startup; also used by tests that run
    /// against in-memory databases.
    pub async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS bindings (
                id         TEXT    PRIMARY KEY,
                user_id    TEXT    NOT NULL,
                channel    TEXT    NOT NULL,
                chat_id    TEXT    NOT NULL,
                api_key    TEXT,
                language   TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE (channel, chat_id)
            )"#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl BindingStore for SqliteBindingStore {
    async fn find_user(&self, chat_id: &str, channel: ChannelKind) -> Result<Option<String>> {
        let row = sqlx::query_scalar::<_, String>(
            "SELECT user_id FROM bindings WHERE channel = ? AND chat_id = ?",
        )
        .bind(channel.as_str())
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_chat_id(&self, user_id: &str, channel: ChannelKind) -> Result<Option<String>> {
        let row = sqlx::query_scalar::<_, String>(
            "SELECT chat_id FROM bindings WHERE channel = ? AND user_id = ?",
        )
        .bind(channel.as_str())
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn bind_user(
        &self,
        user_id: &str,
        chat_id: &str,
        channel: ChannelKind,
        api_key: Option<&str>,
    ) -> Result<()> {
        let now = unix_now();
        // Single statement, so the last-writer-wins / keep-credential
        // semantics hold under concurrent binds for the same pair.
        sqlx::query(
            r#"INSERT INTO bindings (id, user_id, channel, chat_id, api_key, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(channel, chat_id) DO UPDATE SET
                 user_id = excluded.user_id,
                 api_key = COALESCE(excluded.api_key, bindings.api_key),
                 updated_at = excluded.updated_at"#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(channel.as_str())
        .bind(chat_id)
        .bind(api_key)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn unbind_user(&self, user_id: &str, channel: ChannelKind) -> Result<()> {
        sqlx::query("DELETE FROM bindings WHERE channel = ? AND user_id = ?")
            .bind(channel.as_str())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_api_key(&self, chat_id: &str, channel: ChannelKind) -> Result<Option<String>> {
        let row = sqlx::query_scalar::<_, Option<String>>(
            "SELECT api_key FROM bindings WHERE channel = ? AND chat_id = ?",
        )
        .bind(channel.as_str())
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.flatten())
    }

    async fn find_language(&self, chat_id: &str, channel: ChannelKind) -> Result<Option<String>> {
        let row = sqlx::query_scalar::<_, Option<String>>(
            "SELECT language FROM bindings WHERE channel = ? AND chat_id = ?",
        )
        .bind(channel.as_str())
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.flatten())
    }

    async fn set_language(
        &self,
        chat_id: &str,
        channel: ChannelKind,
        language: &str,
    ) -> Result<()> {
        let result =
            sqlx::query("UPDATE bindings SET language = ?, updated_at = ? WHERE channel = ? AND chat_id = ?")
                .bind(language)
                .bind(unix_now())
                .bind(channel.as_str())
                .bind(chat_id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            tracing::debug!(channel = %channel, chat_id, "set_language on unbound chat ignored");
        }
        Ok(())
    }

    async fn user_bindings(&self, user_id: &str) -> Result<Vec<Binding>> {
        let rows = sqlx::query_as::<_, BindingRow>(
            "SELECT * FROM bindings WHERE user_id = ? ORDER BY channel",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}
