//! Client contract for the Core content-processing service.
//!
//! The bridge consumes Core through this narrow surface: item submission
//! (plain or file-bearing), credential resolution, item listing, and a live
//! per-item event stream. [`HttpCoreClient`] is the production
//! implementation; tests substitute stubs.

mod http;

pub use http::HttpCoreClient;

use {anyhow::Result, async_trait::async_trait, serde::Deserialize, serde::Serialize};

/// Payload for a new item submission.
#[derive(Debug, Clone, Serialize)]
pub struct NewItem {
    pub content: String,
    pub content_type: String,
}

/// An item as returned by Core.
#[derive(Debug, Clone, Deserialize)]
pub struct Item {
    pub id: String,
    #[serde(default)]
    pub content: String,
    pub content_type: Option<String>,
    pub status: Option<String>,
    /// ISO-8601 timestamp.
    pub created_at: Option<String>,
}

/// A Core user identity resolved from an API key.
#[derive(Debug, Clone, Deserialize)]
pub struct CoreUser {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// One page of a user's items.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemPage {
    #[serde(default)]
    pub entries: Vec<Item>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

/// A file to upload alongside an item.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub mime_type: String,
    /// Inline content, if the transport already fetched it.
    pub data: Option<Vec<u8>>,
    /// Remote URL Core should fetch the content from instead.
    pub url: Option<String>,
}

/// One named server-sent event from an item's event stream.
#[derive(Debug, Clone)]
pub struct SseFrame {
    pub event: String,
    pub data: serde_json::Value,
}

/// A live, closeable stream of item events. Dropping it releases the
/// underlying connection.
pub type EventStream = futures::stream::BoxStream<'static, Result<SseFrame>>;

/// Narrow contract over the Core service.
#[async_trait]
pub trait CoreClient: Send + Sync {
    async fn create_item(&self, item: NewItem, api_key: &str) -> Result<Item>;

    async fn create_item_with_file(
        &self,
        item: NewItem,
        file: FileUpload,
        api_key: &str,
    ) -> Result<Item>;

    async fn create_item_with_files(
        &self,
        item: NewItem,
        files: Vec<FileUpload>,
        api_key: &str,
    ) -> Result<Item>;

    /// Resolve the identity behind an API key. `Ok(None)` means the key is
    /// not recognized; `Err` means Core could not be reached.
    async fn get_me_by_api_key(&self, api_key: &str) -> Result<Option<CoreUser>>;

    async fn get_items(&self, api_key: &str, page: u32, limit: u32) -> Result<ItemPage>;

    /// Open the live event stream for one item.
    async fn open_event_stream(&self, item_id: &str, api_key: &str) -> Result<EventStream>;
}
