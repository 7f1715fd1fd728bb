use courier_channels::Attachment;
use courier_i18n::MessageKey;

use crate::config::BridgeConfig;

/// A rejected batch: the message key to localize plus its parameters.
#[derive(Debug)]
pub(crate) struct Rejection {
    pub key: MessageKey,
    pub params: Vec<(String, String)>,
}

impl Rejection {
    fn new(key: MessageKey, params: Vec<(String, String)>) -> Self {
        Self { key, params }
    }

    pub(crate) fn params_ref(&self) -> Vec<(&str, &str)> {
        self.params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

/// Validate an attachment batch before submission.
///
/// The count check runs first; after that the first failing attachment
/// aborts the whole batch with its own reason. For single-attachment
/// submissions the declared file size stands in when inline bytes are
/// absent.
pub(crate) fn validate_attachments(
    attachments: &[Attachment],
    config: &BridgeConfig,
) -> Result<(), Rejection> {
    if attachments.len() > config.max_attachments {
        return Err(Rejection::new(
            MessageKey::TooManyFiles,
            vec![("max".into(), config.max_attachments.to_string())],
        ));
    }

    let single = attachments.len() == 1;
    for att in attachments {
        let name = att
            .file_name
            .clone()
            .unwrap_or_else(|| att.file_id.clone());

        if att.data.is_none() && att.url.is_none() {
            return Err(Rejection::new(
                MessageKey::FileContentMissing,
                vec![("name".into(), name)],
            ));
        }

        let mime_ok = att
            .mime_type
            .as_deref()
            .is_some_and(|mime| config.is_mime_allowed(mime));
        if !mime_ok {
            let mime = att.mime_type.clone().unwrap_or_else(|| "unknown".into());
            return Err(Rejection::new(
                MessageKey::UnsupportedFileType,
                vec![("name".into(), name), ("mime".into(), mime)],
            ));
        }

        let size = att
            .data
            .as_ref()
            .map(|d| d.len() as u64)
            .or(if single { att.file_size } else { None });
        if let Some(size) = size
            && size > config.max_attachment_bytes
        {
            return Err(Rejection::new(
                MessageKey::FileTooLarge,
                vec![
                    ("name".into(), name),
                    ("max_mb".into(), config.max_attachment_mib().to_string()),
                ],
            ));
        }
    }
    Ok(())
}
