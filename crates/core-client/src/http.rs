use {
    anyhow::{Context, Result, bail},
    futures::StreamExt,
    serde::de::DeserializeOwned,
    tracing::debug,
};

use crate::{CoreClient, CoreUser, EventStream, FileUpload, Item, ItemPage, NewItem, SseFrame};

/// HTTP implementation of [`CoreClient`] over Core's REST + SSE surface.
pub struct HttpCoreClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpCoreClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn multipart_form(item: &NewItem, files: Vec<FileUpload>) -> Result<reqwest::multipart::Form> {
        let mut form = reqwest::multipart::Form::new()
            .text("content", item.content.clone())
            .text("content_type", item.content_type.clone());
        let mut remote_urls: Vec<serde_json::Value> = Vec::new();
        for file in files {
            if let Some(data) = file.data {
                let part = reqwest::multipart::Part::bytes(data)
                    .file_name(file.file_name.clone())
                    .mime_str(&file.mime_type)?;
                form = form.part("files", part);
            } else if let Some(url) = file.url {
                remote_urls.push(serde_json::json!({
                    "url": url,
                    "file_name": file.file_name,
                    "mime_type": file.mime_type,
                }));
            }
        }
        if !remote_urls.is_empty() {
            form = form.text("file_urls", serde_json::to_string(&remote_urls)?);
        }
        Ok(form)
    }
}

/// Decode a JSON response, folding non-2xx statuses into a readable error.
async fn expect_json<T: DeserializeOwned>(resp: reqwest::Response, what: &str) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("core {what} failed: HTTP {status}: {body}");
    }
    resp.json::<T>()
        .await
        .with_context(|| format!("decoding core {what} response"))
}

#[async_trait::async_trait]
impl CoreClient for HttpCoreClient {
    async fn create_item(&self, item: NewItem, api_key: &str) -> Result<Item> {
        let resp = self
            .http
            .post(self.url("/api/items"))
            .bearer_auth(api_key)
            .json(&item)
            .send()
            .await
            .context("submitting item")?;
        expect_json(resp, "item submission").await
    }

    async fn create_item_with_file(
        &self,
        item: NewItem,
        file: FileUpload,
        api_key: &str,
    ) -> Result<Item> {
        let form = Self::multipart_form(&item, vec![file])?;
        let resp = self
            .http
            .post(self.url("/api/items/file"))
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
            .context("submitting file item")?;
        expect_json(resp, "file item submission").await
    }

    async fn create_item_with_files(
        &self,
        item: NewItem,
        files: Vec<FileUpload>,
        api_key: &str,
    ) -> Result<Item> {
        let form = Self::multipart_form(&item, files)?;
        let resp = self
            .http
            .post(self.url("/api/items/files"))
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
            .context("submitting multi-file item")?;
        expect_json(resp, "multi-file item submission").await
    }

    async fn get_me_by_api_key(&self, api_key: &str) -> Result<Option<CoreUser>> {
        let resp = self
            .http
            .get(self.url("/api/users/me"))
            .bearer_auth(api_key)
            .send()
            .await
            .context("resolving api key")?;
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        expect_json(resp, "identity lookup").await.map(Some)
    }

    async fn get_items(&self, api_key: &str, page: u32, limit: u32) -> Result<ItemPage> {
        let resp = self
            .http
            .get(self.url("/api/items"))
            .query(&[("page", page), ("limit", limit)])
            .bearer_auth(api_key)
            .send()
            .await
            .context("listing items")?;
        expect_json(resp, "item listing").await
    }

    async fn open_event_stream(&self, item_id: &str, api_key: &str) -> Result<EventStream> {
        let resp = self
            .http
            .get(self.url(&format!("/api/items/{item_id}/events")))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .bearer_auth(api_key)
            .send()
            .await
            .context("opening event stream")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("core event stream rejected: HTTP {status}: {body}");
        }

        let item_id = item_id.to_string();
        let stream = async_stream::try_stream! {
            let mut byte_stream = resp.bytes_stream();
            let mut buf = String::new();
            let mut event_name: Option<String> = None;
            let mut data_buf = String::new();

            while let Some(chunk) = byte_stream.next().await {
                let chunk = chunk?;
                buf.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(pos) = buf.find('\n') {
                    let line = buf[..pos].trim_end_matches('\r').to_string();
                    buf = buf[pos + 1..].to_string();

                    if line.is_empty() {
                        // Blank line terminates one SSE frame.
                        if !data_buf.is_empty() {
                            let raw = std::mem::take(&mut data_buf);
                            let event = event_name.take().unwrap_or_else(|| "message".into());
                            match serde_json::from_str::<serde_json::Value>(&raw) {
                                Ok(data) => yield SseFrame { event, data },
                                Err(e) => {
                                    debug!(%item_id, %event, error = %e, "skipping non-JSON event payload");
                                },
                            }
                        }
                        continue;
                    }
                    if let Some(name) = line.strip_prefix("event:") {
                        event_name = Some(name.trim().to_string());
                    } else if let Some(data) = line.strip_prefix("data:") {
                        if !data_buf.is_empty() {
                            data_buf.push('\n');
                        }
                        data_buf.push_str(data.trim_start());
                    }
                    // Comments and other SSE fields are ignored.
                }
            }
        };
        Ok(Box::pin(stream) as EventStream)
    }
}
