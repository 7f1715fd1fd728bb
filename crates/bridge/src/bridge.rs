use std::{
    collections::HashMap,
    sync::{Arc, RwLock, Weak},
};

use {
    async_trait::async_trait,
    tracing::{info, warn},
};

use {
    courier_bindings::{Binding, BindingStore},
    courier_channels::{Channel, ChannelKind, InboundMessage, InboundSink},
    courier_core_client::CoreClient,
    courier_i18n::{Catalog, Language},
    courier_subscriptions::SubscriptionManager,
};

use crate::{
    config::BridgeConfig,
    error::{Error, Result},
    events,
};

/// Where an in-flight item's notifications should go.
#[derive(Debug, Clone)]
pub struct ChatRef {
    pub chat_id: String,
    pub channel: ChannelKind,
}

/// Health of one registered channel, as reported by `channel_statuses`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Unhealthy,
    /// The probe itself failed.
    Error(String),
}

#[derive(Debug, Clone)]
pub struct ChannelStatusReport {
    pub channel: ChannelKind,
    pub state: HealthState,
}

/// Structured outcome of a directed send. Never an `Err`: callers inspect
/// the report instead of handling exceptions.
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub delivered: bool,
    pub error: Option<String>,
}

impl DeliveryReport {
    fn ok() -> Self {
        Self {
            delivered: true,
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            delivered: false,
            error: Some(error.into()),
        }
    }
}

/// Central registry of channels and owner of the inbound pipeline.
pub struct ChannelBridge {
    channels: RwLock<HashMap<ChannelKind, Arc<dyn Channel>>>,
    /// Transient item↔chat mapping; lost on restart by design.
    item_chats: RwLock<HashMap<String, ChatRef>>,
    pub(crate) bindings: Arc<dyn BindingStore>,
    pub(crate) core: Arc<dyn CoreClient>,
    subscriptions: Arc<SubscriptionManager>,
    pub(crate) catalog: Catalog,
    pub(crate) config: BridgeConfig,
}

impl ChannelBridge {
    pub fn new(
        bindings: Arc<dyn BindingStore>,
        core: Arc<dyn CoreClient>,
        subscriptions: Arc<SubscriptionManager>,
        config: BridgeConfig,
    ) -> Arc<Self> {
        let bridge = Arc::new(Self {
            channels: RwLock::new(HashMap::new()),
            item_chats: RwLock::new(HashMap::new()),
            bindings,
            core,
            subscriptions,
            catalog: Catalog,
            config,
        });
        events::install(&bridge);
        bridge
    }

    /// Register a channel and bind its message callback to the inbound
    /// pipeline. Fails if a channel of the same kind is already registered.
    pub fn register_channel(self: &Arc<Self>, channel: Arc<dyn Channel>) -> Result<()> {
        let kind = channel.kind();
        let mut channels = self.channels.write().unwrap();
        if channels.contains_key(&kind) {
            return Err(Error::DuplicateChannel { kind });
        }
        channel.on_message(Arc::new(BridgeSink {
            bridge: Arc::downgrade(self),
        }));
        channels.insert(kind, channel);
        info!(channel = %kind, "channel registered");
        Ok(())
    }

    /// Stop and remove a channel. Stop failures are logged, not escalated.
    pub async fn unregister_channel(&self, kind: ChannelKind) {
        let removed = { self.channels.write().unwrap().remove(&kind) };
        if let Some(channel) = removed {
            if let Err(e) = channel.stop().await {
                warn!(channel = %kind, error = %e, "channel stop failed during unregister");
            }
            info!(channel = %kind, "channel unregistered");
        }
    }

    /// Start every registered channel concurrently. Each channel is its own
    /// failure domain: one failing start never aborts the others.
    pub async fn start_all(&self) {
        let channels = self.registered();
        let tasks = channels.into_iter().map(|channel| async move {
            if let Err(e) = channel.start().await {
                warn!(channel = %channel.kind(), error = %e, "channel start failed");
            }
        });
        futures::future::join_all(tasks).await;
    }

    /// Stop every registered channel concurrently, best-effort.
    pub async fn stop_all(&self) {
        let channels = self.registered();
        let tasks = channels.into_iter().map(|channel| async move {
            if let Err(e) = channel.stop().await {
                warn!(channel = %channel.kind(), error = %e, "channel stop failed");
            }
        });
        futures::future::join_all(tasks).await;
    }

    /// Stop all channels and tear down every live event subscription.
    pub async fn shutdown(&self) {
        self.stop_all().await;
        self.subscriptions.unsubscribe_all();
    }

    /// Probe every registered channel. A failing probe yields an `Error`
    /// state for that channel only.
    pub async fn channel_statuses(&self) -> Vec<ChannelStatusReport> {
        let mut channels = self.registered();
        channels.sort_by_key(|c| c.kind().as_str());

        let mut reports = Vec::with_capacity(channels.len());
        for channel in channels {
            let state = match channel.health_check().await {
                Ok(true) => HealthState::Healthy,
                Ok(false) => HealthState::Unhealthy,
                Err(e) => HealthState::Error(e.to_string()),
            };
            reports.push(ChannelStatusReport {
                channel: channel.kind(),
                state,
            });
        }
        reports
    }

    /// Stop, then start one channel. Fails if the kind is not registered or
    /// the restarted channel refuses to start.
    pub async fn restart_channel(&self, kind: ChannelKind) -> Result<()> {
        let Some(channel) = self.channel(kind) else {
            return Err(Error::ChannelNotFound { kind });
        };
        if let Err(e) = channel.stop().await {
            warn!(channel = %kind, error = %e, "channel stop failed during restart");
        }
        channel.start().await.map_err(|source| Error::Start { source })
    }

    /// Send a text message to a Core user over one channel, resolving the
    /// chat through the binding store.
    pub async fn send_message(
        &self,
        user_id: &str,
        kind: ChannelKind,
        text: &str,
    ) -> DeliveryReport {
        let chat_id = match self.bindings.find_chat_id(user_id, kind).await {
            Ok(Some(chat_id)) => chat_id,
            Ok(None) => {
                return DeliveryReport::failed(format!("no {kind} binding for user {user_id}"));
            },
            Err(e) => return DeliveryReport::failed(e.to_string()),
        };
        let Some(channel) = self.channel(kind) else {
            return DeliveryReport::failed(format!("channel not registered: {kind}"));
        };
        match channel.send_message(&chat_id, text).await {
            Ok(()) => DeliveryReport::ok(),
            Err(e) => DeliveryReport::failed(e.to_string()),
        }
    }

    /// All bindings for a Core user, across channels.
    pub async fn user_bindings(&self, user_id: &str) -> anyhow::Result<Vec<Binding>> {
        self.bindings.user_bindings(user_id).await
    }

    /// Remove the binding for a user/channel pair.
    pub async fn unbind_user(&self, user_id: &str, kind: ChannelKind) -> anyhow::Result<()> {
        self.bindings.unbind_user(user_id, kind).await
    }

    /// The subscription manager this bridge dispatches through. Exposed for
    /// embedders that need to inject events or tear down at shutdown.
    #[must_use]
    pub fn subscriptions(&self) -> &Arc<SubscriptionManager> {
        &self.subscriptions
    }

    /// The chat an in-flight item will be notified on, if any.
    #[must_use]
    pub fn item_chat(&self, item_id: &str) -> Option<ChatRef> {
        self.item_chats.read().unwrap().get(item_id).cloned()
    }

    pub(crate) fn record_item_chat(&self, item_id: &str, chat_id: &str, channel: ChannelKind) {
        self.item_chats.write().unwrap().insert(
            item_id.to_string(),
            ChatRef {
                chat_id: chat_id.to_string(),
                channel,
            },
        );
    }

    pub(crate) fn remove_item_chat(&self, item_id: &str) {
        self.item_chats.write().unwrap().remove(item_id);
    }

    pub(crate) fn channel(&self, kind: ChannelKind) -> Option<Arc<dyn Channel>> {
        self.channels.read().unwrap().get(&kind).cloned()
    }

    fn registered(&self) -> Vec<Arc<dyn Channel>> {
        self.channels.read().unwrap().values().cloned().collect()
    }

    /// Resolve the display language for a chat. WeWork is fixed to Chinese;
    /// other channels honor the stored preference and fall back to a
    /// per-channel default.
    pub(crate) async fn resolve_language(&self, chat_id: &str, kind: ChannelKind) -> Language {
        if kind == ChannelKind::Wework {
            return Language::Zh;
        }
        match self.bindings.find_language(chat_id, kind).await {
            Ok(Some(raw)) => {
                if let Some(lang) = Language::normalize(&raw) {
                    return lang;
                }
            },
            Ok(None) => {},
            Err(e) => {
                warn!(channel = %kind, chat_id, error = %e, "language lookup failed, using channel default");
            },
        }
        match kind {
            ChannelKind::Lark => Language::Zh,
            _ => Language::En,
        }
    }

    /// Best-effort localized send back to a chat. Failures are logged; this
    /// is the terminal step of every user-facing path.
    pub(crate) async fn notify(&self, kind: ChannelKind, chat_id: &str, text: &str) {
        let Some(channel) = self.channel(kind) else {
            warn!(channel = %kind, chat_id, "cannot notify: channel not registered");
            return;
        };
        if let Err(e) = channel.send_message(chat_id, text).await {
            warn!(channel = %kind, chat_id, error = %e, "notification send failed");
        }
    }
}

/// Adapter handed to each registered channel; fans every inbound message
/// into its own pipeline task so a slow submission never delays the next
/// message.
struct BridgeSink {
    bridge: Weak<ChannelBridge>,
}

#[async_trait]
impl InboundSink for BridgeSink {
    async fn handle(&self, message: InboundMessage) {
        if let Some(bridge) = self.bridge.upgrade() {
            tokio::spawn(async move {
                bridge.handle_inbound(message).await;
            });
        }
    }
}
