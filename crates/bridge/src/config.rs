use serde::Deserialize;

/// Policy knobs for the inbound pipeline.
///
/// These mirror the bridge's observable contract; they are configuration
/// decided here, never negotiated with a platform.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Maximum attachments accepted per message.
    pub max_attachments: usize,
    /// Maximum size of a single attachment, in bytes.
    pub max_attachment_bytes: u64,
    /// MIME types accepted for attachments.
    pub allowed_mime_types: Vec<String>,
    /// Default `/list` page size.
    pub list_default_limit: u32,
    /// Upper bound for the `/list` page size.
    pub list_max_limit: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_attachments: 5,
            max_attachment_bytes: 10 * 1024 * 1024,
            allowed_mime_types: default_mime_allowlist(),
            list_default_limit: 10,
            list_max_limit: 50,
        }
    }
}

impl BridgeConfig {
    #[must_use]
    pub fn is_mime_allowed(&self, mime: &str) -> bool {
        self.allowed_mime_types.iter().any(|m| m == mime)
    }

    #[must_use]
    pub fn max_attachment_mib(&self) -> u64 {
        self.max_attachment_bytes / (1024 * 1024)
    }
}

fn default_mime_allowlist() -> Vec<String> {
    [
        "image/jpeg",
        "image/png",
        "image/gif",
        "image/webp",
        "audio/mpeg",
        "audio/ogg",
        "audio/wav",
        "audio/mp4",
        "video/mp4",
        "video/webm",
        "video/quicktime",
        "application/pdf",
        "application/zip",
        "application/msword",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "text/plain",
        "text/markdown",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}
