//! Durable identity mapping between platform chats and Core users.
//!
//! A [`Binding`] links one `(channel, chat_id)` pair to one Core user,
//! optionally carrying the user's API credential and display-language
//! preference. The store is the single source of truth for identity state
//! across every bridge code path.

mod sqlite;

pub use sqlite::SqliteBindingStore;

use {anyhow::Result, async_trait::async_trait, courier_channels::ChannelKind};

/// A durable link between one platform chat and one Core user.
#[derive(Debug, Clone)]
pub struct Binding {
    pub id: String,
    pub user_id: String,
    pub channel: ChannelKind,
    pub chat_id: String,
    pub api_key: Option<String>,
    pub language: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Storage contract for bindings.
///
/// All operations are keyed by the unique `(channel, chat_id)` pair unless
/// noted. Implementations must serialize concurrent binds for the same pair:
/// the last writer's `user_id` wins and a bind that carries no credential
/// never clears a previously stored one.
#[async_trait]
pub trait BindingStore: Send + Sync {
    /// Core user bound to this chat, if any.
    async fn find_user(&self, chat_id: &str, channel: ChannelKind) -> Result<Option<String>>;

    /// Inverse lookup: the chat a user is bound to on one channel.
    async fn find_chat_id(&self, user_id: &str, channel: ChannelKind) -> Result<Option<String>>;

    /// Upsert a binding. On conflict the `user_id` is replaced and the
    /// credential is only overwritten when `api_key` is `Some`.
    async fn bind_user(
        &self,
        user_id: &str,
        chat_id: &str,
        channel: ChannelKind,
        api_key: Option<&str>,
    ) -> Result<()>;

    /// Delete the binding for a user/channel pair.
    async fn unbind_user(&self, user_id: &str, channel: ChannelKind) -> Result<()>;

    async fn find_api_key(&self, chat_id: &str, channel: ChannelKind) -> Result<Option<String>>;

    async fn find_language(&self, chat_id: &str, channel: ChannelKind) -> Result<Option<String>>;

    async fn set_language(
        &self,
        chat_id: &str,
        channel: ChannelKind,
        language: &str,
    ) -> Result<()>;

    /// All bindings for a user, across channels.
    async fn user_bindings(&self, user_id: &str) -> Result<Vec<Binding>>;
}
