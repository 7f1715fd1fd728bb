use tracing::{info, warn};

use {
    courier_channels::InboundMessage,
    courier_core_client::{FileUpload, Item, NewItem},
    courier_i18n::{Language, MessageKey},
};

use crate::{bridge::ChannelBridge, commands, validation};

impl ChannelBridge {
    /// Entry point for every inbound message.
    ///
    /// Fault-isolation boundary: whatever fails inside is logged and turned
    /// into a best-effort localized error reply; nothing propagates into the
    /// transport's receive loop.
    pub async fn handle_inbound(&self, message: InboundMessage) {
        let lang = self
            .resolve_language(&message.chat_id, message.channel)
            .await;
        if let Err(e) = self.process(&message, lang).await {
            warn!(
                channel = %message.channel,
                chat_id = %message.chat_id,
                error = %e,
                "inbound pipeline failed"
            );
            let text = self.catalog.message(
                lang,
                MessageKey::ProcessingError,
                &[("error", &e.to_string())],
            );
            self.notify(message.channel, &message.chat_id, &text).await;
        }
    }

    async fn process(&self, message: &InboundMessage, lang: Language) -> anyhow::Result<()> {
        let content = message.content.trim();

        // Commands are terminal: they never reach item submission.
        if let Some(command) = commands::parse(content) {
            return self.run_command(command, message, lang).await;
        }

        if self
            .bindings
            .find_user(&message.chat_id, message.channel)
            .await?
            .is_none()
        {
            self.reply(message, lang, MessageKey::PleaseBind, &[]).await;
            return Ok(());
        }
        let Some(api_key) = self
            .bindings
            .find_api_key(&message.chat_id, message.channel)
            .await?
        else {
            self.reply(message, lang, MessageKey::NoApiKey, &[]).await;
            return Ok(());
        };

        let item = if message.attachments.is_empty() {
            let new_item = NewItem {
                content: content.to_string(),
                content_type: message.infer_content_type().as_str().to_string(),
            };
            self.core.create_item(new_item, &api_key).await?
        } else {
            if let Err(rejection) =
                validation::validate_attachments(&message.attachments, &self.config)
            {
                let params = rejection.params_ref();
                let text = self.catalog.message(lang, rejection.key, &params);
                self.notify(message.channel, &message.chat_id, &text).await;
                return Ok(());
            }
            self.submit_with_files(message, content, &api_key).await?
        };

        info!(
            channel = %message.channel,
            chat_id = %message.chat_id,
            item_id = %item.id,
            "item submitted"
        );
        self.record_item_chat(&item.id, &message.chat_id, message.channel);
        self.subscriptions()
            .subscribe_to_item(&item.id, &message.chat_id, message.channel, &api_key)
            .await;
        self.acknowledge(message, lang, &item).await;
        Ok(())
    }

    async fn submit_with_files(
        &self,
        message: &InboundMessage,
        content: &str,
        api_key: &str,
    ) -> anyhow::Result<Item> {
        let new_item = NewItem {
            content: content.to_string(),
            content_type: message.infer_content_type().as_str().to_string(),
        };
        let mut files: Vec<FileUpload> = message
            .attachments
            .iter()
            .map(|att| FileUpload {
                file_name: att
                    .file_name
                    .clone()
                    .unwrap_or_else(|| att.file_id.clone()),
                mime_type: att.mime_type.clone().unwrap_or_default(),
                data: att.data.clone(),
                url: att.url.clone(),
            })
            .collect();
        if files.len() == 1 {
            let file = files.remove(0);
            self.core.create_item_with_file(new_item, file, api_key).await
        } else {
            self.core.create_item_with_files(new_item, files, api_key).await
        }
    }

    /// Confirm the submission, appending a short id suffix for human
    /// cross-referencing when the id is long enough.
    async fn acknowledge(&self, message: &InboundMessage, lang: Language, item: &Item) {
        let mut text = self.catalog.message(lang, MessageKey::AddedToInbox, &[]);
        if let Some((idx, _)) = item.id.char_indices().rev().nth(3) {
            let suffix = &item.id[idx..];
            text.push_str(&format!(" ({suffix})"));
        }
        self.notify(message.channel, &message.chat_id, &text).await;
    }

    pub(crate) async fn reply(
        &self,
        message: &InboundMessage,
        lang: Language,
        key: MessageKey,
        params: &[(&str, &str)],
    ) {
        let text = self.catalog.message(lang, key, params);
        self.notify(message.channel, &message.chat_id, &text).await;
    }
}
