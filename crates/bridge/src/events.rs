use std::sync::{Arc, Weak};

use {
    async_trait::async_trait,
    tracing::debug,
};

use {
    courier_i18n::MessageKey,
    courier_subscriptions::{EventHandler, EventKind, ItemEvent},
};

use crate::bridge::ChannelBridge;

/// Wire the bridge's notification handler into the subscription manager for
/// every event kind.
pub(crate) fn install(bridge: &Arc<ChannelBridge>) {
    let handler = Arc::new(NotifyHandler {
        bridge: Arc::downgrade(bridge),
    });
    for kind in EventKind::ALL {
        bridge.subscriptions().on(kind, handler.clone());
    }
}

/// Turns processing events into localized chat notifications.
struct NotifyHandler {
    bridge: Weak<ChannelBridge>,
}

#[async_trait]
impl EventHandler for NotifyHandler {
    async fn handle(&self, event: ItemEvent) -> anyhow::Result<()> {
        let Some(bridge) = self.bridge.upgrade() else {
            return Ok(());
        };
        bridge.handle_item_event(event).await
    }
}

impl ChannelBridge {
    async fn handle_item_event(&self, event: ItemEvent) -> anyhow::Result<()> {
        // The subscription carries chat coordinates, but the map is the
        // source of truth: once the item is forgotten its events are noise.
        let Some(chat) = self.item_chat(&event.item_id) else {
            debug!(item_id = %event.item_id, event = %event.kind.as_str(), "event for unmapped item dropped");
            return Ok(());
        };

        let lang = self.resolve_language(&chat.chat_id, chat.channel).await;
        let payload = &event.payload;
        let text = match event.kind {
            EventKind::AiCompleted => {
                let category = payload.category.as_deref().unwrap_or("uncategorized");
                let confidence = payload
                    .confidence
                    .map(|c| format!("{}", (c * 100.0).round() as i64))
                    .unwrap_or_else(|| "0".into());
                let summary = payload
                    .summary
                    .as_deref()
                    .or(payload.message.as_deref())
                    .unwrap_or("");
                self.catalog.message(
                    lang,
                    MessageKey::AiCompleted,
                    &[
                        ("category", category),
                        ("confidence", &confidence),
                        ("summary", summary),
                    ],
                )
            },
            EventKind::AiFailed => {
                let error = event_error(payload);
                self.catalog
                    .message(lang, MessageKey::AiFailed, &[("error", error)])
            },
            EventKind::RoutingCompleted => {
                let targets = if payload.targets.is_empty() {
                    "inbox".to_string()
                } else {
                    payload.targets.join(", ")
                };
                self.catalog
                    .message(lang, MessageKey::RoutingCompleted, &[("targets", &targets)])
            },
            EventKind::RoutingFailed => {
                let error = event_error(payload);
                self.catalog
                    .message(lang, MessageKey::RoutingFailed, &[("error", error)])
            },
        };

        self.notify(chat.channel, &chat.chat_id, &text).await;

        if event.kind.is_terminal() {
            self.remove_item_chat(&event.item_id);
        }
        Ok(())
    }
}

fn event_error(payload: &courier_subscriptions::EventPayload) -> &str {
    payload
        .error
        .as_deref()
        .or(payload.message.as_deref())
        .or_else(|| payload.failures.first().map(String::as_str))
        .unwrap_or("unknown error")
}
