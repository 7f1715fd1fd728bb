use tracing::info;

use {
    courier_channels::{ChannelKind, InboundMessage},
    courier_core_client::ItemPage,
    courier_i18n::{Catalog, Language, MessageKey},
};

use crate::{bridge::ChannelBridge, config::BridgeConfig};

/// A recognized slash command with its raw argument tail.
///
/// `/start` and `/help` match exactly; the others match by prefix so the
/// argument survives as-is.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Command<'a> {
    Start,
    Help,
    Bind(&'a str),
    Lang(&'a str),
    List(&'a str),
}

pub(crate) fn parse(content: &str) -> Option<Command<'_>> {
    if content == "/start" {
        Some(Command::Start)
    } else if content == "/help" {
        Some(Command::Help)
    } else if let Some(rest) = content.strip_prefix("/bind") {
        Some(Command::Bind(rest.trim()))
    } else if let Some(rest) = content.strip_prefix("/lang") {
        Some(Command::Lang(rest.trim()))
    } else if let Some(rest) = content.strip_prefix("/list") {
        Some(Command::List(rest.trim()))
    } else {
        None
    }
}

/// Parse `/list` arguments: optional page (>= 1) and limit (1..=max).
/// `None` means malformed input and the caller replies with usage.
pub(crate) fn parse_list_args(arg: &str, config: &BridgeConfig) -> Option<(u32, u32)> {
    let mut parts = arg.split_whitespace();
    let page = match parts.next() {
        None => 1,
        Some(raw) => match raw.parse::<u32>() {
            Ok(page) if page >= 1 => page,
            _ => return None,
        },
    };
    let limit = match parts.next() {
        None => config.list_default_limit,
        Some(raw) => match raw.parse::<u32>() {
            Ok(limit) if (1..=config.list_max_limit).contains(&limit) => limit,
            _ => return None,
        },
    };
    Some((page, limit))
}

const LIST_CONTENT_WIDTH: usize = 50;

/// Render one page of items as a numbered, truncated, date-stamped listing.
pub(crate) fn render_list(
    catalog: &Catalog,
    lang: Language,
    page_data: &ItemPage,
    page: u32,
    limit: u32,
) -> String {
    let pages = page_data.total.div_ceil(u64::from(limit)).max(1);
    let mut out = catalog.message(
        lang,
        MessageKey::ListHeader,
        &[
            ("page", &page.to_string()),
            ("pages", &pages.to_string()),
            ("total", &page_data.total.to_string()),
        ],
    );
    for (index, item) in page_data.entries.iter().enumerate() {
        let number = u64::from(page - 1) * u64::from(limit) + index as u64 + 1;
        let mut content: String = item.content.chars().take(LIST_CONTENT_WIDTH).collect();
        if item.content.chars().count() > LIST_CONTENT_WIDTH {
            content.push_str("...");
        }
        let status = item.status.as_deref().unwrap_or("pending");
        let date = item
            .created_at
            .as_deref()
            .map(|ts| ts.chars().take(10).collect::<String>())
            .unwrap_or_default();
        out.push_str(&format!("\n{number}. [{status}] {content} ({date})"));
    }
    if u64::from(page) * u64::from(limit) < page_data.total {
        out.push('\n');
        out.push_str(&catalog.message(
            lang,
            MessageKey::ListMore,
            &[("page", &(page + 1).to_string())],
        ));
    }
    out
}

impl ChannelBridge {
    pub(crate) async fn run_command(
        &self,
        command: Command<'_>,
        message: &InboundMessage,
        lang: Language,
    ) -> anyhow::Result<()> {
        match command {
            Command::Start => self.cmd_start(message, lang).await,
            Command::Help => {
                self.reply(message, lang, MessageKey::Help, &[]).await;
                Ok(())
            },
            Command::Bind(arg) => self.cmd_bind(arg, message, lang).await,
            Command::Lang(arg) => self.cmd_lang(arg, message, lang).await,
            Command::List(arg) => self.cmd_list(arg, message, lang).await,
        }
    }

    async fn cmd_start(&self, message: &InboundMessage, lang: Language) -> anyhow::Result<()> {
        let user = self
            .bindings
            .find_user(&message.chat_id, message.channel)
            .await?;
        let api_key = self
            .bindings
            .find_api_key(&message.chat_id, message.channel)
            .await?;
        let key = if user.is_some() && api_key.is_some() {
            MessageKey::AlreadyBound
        } else {
            MessageKey::BindUsage
        };
        self.reply(message, lang, key, &[]).await;
        Ok(())
    }

    async fn cmd_bind(
        &self,
        arg: &str,
        message: &InboundMessage,
        lang: Language,
    ) -> anyhow::Result<()> {
        if arg.is_empty() {
            self.reply(message, lang, MessageKey::BindUsage, &[]).await;
            return Ok(());
        }
        let Some(user) = self.core.get_me_by_api_key(arg).await? else {
            self.reply(message, lang, MessageKey::InvalidApiKey, &[])
                .await;
            return Ok(());
        };
        self.bindings
            .bind_user(&user.id, &message.chat_id, message.channel, Some(arg))
            .await?;
        info!(
            channel = %message.channel,
            chat_id = %message.chat_id,
            user_id = %user.id,
            "chat bound to core user"
        );
        self.reply(message, lang, MessageKey::BindingSuccess, &[])
            .await;
        Ok(())
    }

    async fn cmd_lang(
        &self,
        arg: &str,
        message: &InboundMessage,
        lang: Language,
    ) -> anyhow::Result<()> {
        // WeWork replies in a fixed language; there is nothing to configure.
        if message.channel == ChannelKind::Wework {
            self.reply(message, lang, MessageKey::LangFixed, &[]).await;
            return Ok(());
        }
        if arg.is_empty() {
            self.reply(message, lang, MessageKey::LangUsage, &[("language", lang.as_str())])
                .await;
            return Ok(());
        }
        let Some(requested) = Language::normalize(arg) else {
            self.reply(message, lang, MessageKey::LangInvalid, &[("language", arg)])
                .await;
            return Ok(());
        };
        if self
            .bindings
            .find_user(&message.chat_id, message.channel)
            .await?
            .is_none()
        {
            self.reply(message, lang, MessageKey::PleaseBind, &[]).await;
            return Ok(());
        }
        self.bindings
            .set_language(&message.chat_id, message.channel, requested.as_str())
            .await?;
        // Confirm in the language that was just chosen.
        self.reply(
            message,
            requested,
            MessageKey::LangUpdated,
            &[("language", requested.as_str())],
        )
        .await;
        Ok(())
    }

    async fn cmd_list(
        &self,
        arg: &str,
        message: &InboundMessage,
        lang: Language,
    ) -> anyhow::Result<()> {
        let Some(api_key) = self
            .bindings
            .find_api_key(&message.chat_id, message.channel)
            .await?
        else {
            self.reply(message, lang, MessageKey::NoApiKey, &[]).await;
            return Ok(());
        };
        let Some((page, limit)) = parse_list_args(arg, &self.config) else {
            self.reply(message, lang, MessageKey::ListUsage, &[]).await;
            return Ok(());
        };
        // Fetch failures are reported inline, not escalated to the pipeline
        // boundary.
        let page_data = match self.core.get_items(&api_key, page, limit).await {
            Ok(page_data) => page_data,
            Err(e) => {
                self.reply(message, lang, MessageKey::ListFailed, &[("error", &e.to_string())])
                    .await;
                return Ok(());
            },
        };
        if page_data.entries.is_empty() {
            self.reply(message, lang, MessageKey::ListEmpty, &[]).await;
            return Ok(());
        }
        let text = render_list(&self.catalog, lang, &page_data, page, limit);
        self.notify(message.channel, &message.chat_id, &text).await;
        Ok(())
    }
}
