use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, RwLock, Weak,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use {
    async_trait::async_trait,
    futures::StreamExt,
    tokio_util::sync::CancellationToken,
    tracing::{debug, warn},
};

use courier_channels::ChannelKind;
use courier_core_client::{CoreClient, EventStream};

use crate::event::{EventKind, EventPayload, ItemEvent};

/// How long a self-initiated close suppresses late transport errors before
/// the item's cleanup state is forgotten.
const CLOSE_GRACE: Duration = Duration::from_secs(10);

/// Handles one dispatched event. Errors are logged by the manager and never
/// block sibling handlers.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: ItemEvent) -> anyhow::Result<()>;
}

/// Per-item subscription state machine: absent → open → closing → absent.
enum SubState {
    Open {
        generation: u64,
        cancel: CancellationToken,
    },
    /// Self-initiated close; late events on the stale handle are suppressed
    /// until the grace window elapses.
    Closing { since: Instant },
}

/// Tracks one live Core event stream per item and fans events out to
/// registered handlers.
pub struct SubscriptionManager {
    core: Arc<dyn CoreClient>,
    handlers: RwLock<HashMap<EventKind, Vec<Arc<dyn EventHandler>>>>,
    subs: Mutex<HashMap<String, SubState>>,
    next_generation: AtomicU64,
    close_grace: Duration,
    /// Handle to ourselves for spawned stream and cleanup tasks.
    self_ref: Weak<SubscriptionManager>,
}

impl SubscriptionManager {
    pub fn new(core: Arc<dyn CoreClient>) -> Arc<Self> {
        Self::with_close_grace(core, CLOSE_GRACE)
    }

    /// Override the close grace window. Intended for tests.
    pub fn with_close_grace(core: Arc<dyn CoreClient>, grace: Duration) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            core,
            handlers: RwLock::new(HashMap::new()),
            subs: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
            close_grace: grace,
            self_ref: self_ref.clone(),
        })
    }

    /// Register a handler for one event kind. Handlers run in registration
    /// order; one failing handler never blocks the others.
    pub fn on(&self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write().unwrap();
        handlers.entry(kind).or_default().push(handler);
    }

    /// Open a live event stream for one item, replacing any existing stream
    /// for the same item id.
    ///
    /// Fire-and-forget: stream construction failure is logged and leaves no
    /// live subscription; the caller simply never sees a terminal event.
    pub async fn subscribe_to_item(
        &self,
        item_id: &str,
        chat_id: &str,
        channel: ChannelKind,
        api_key: &str,
    ) {
        // Tear down any current stream before opening the replacement.
        {
            let mut subs = self.subs.lock().unwrap();
            if let Some(SubState::Open { cancel, .. }) = subs.remove(item_id) {
                debug!(item_id, "replacing existing subscription");
                cancel.cancel();
            }
        }

        let stream = match self.core.open_event_stream(item_id, api_key).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(item_id, error = %e, "failed to open event stream");
                return;
            },
        };

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = CancellationToken::new();
        {
            let mut subs = self.subs.lock().unwrap();
            let previous = subs.insert(
                item_id.to_string(),
                SubState::Open {
                    generation,
                    cancel: cancel.clone(),
                },
            );
            // A concurrent subscribe may have won the race between our
            // teardown and this insert.
            if let Some(SubState::Open { cancel: old, .. }) = previous {
                old.cancel();
            }
        }

        let Some(mgr) = self.self_ref.upgrade() else {
            return;
        };
        tokio::spawn(mgr.run_stream(
            item_id.to_string(),
            chat_id.to_string(),
            channel,
            generation,
            cancel,
            stream,
        ));
    }

    /// Close the stream for one item. Idempotent: unknown or already-closed
    /// ids are a no-op.
    pub fn unsubscribe(&self, item_id: &str) {
        let mut subs = self.subs.lock().unwrap();
        if !matches!(subs.get(item_id), Some(SubState::Open { .. })) {
            return;
        }
        if let Some(SubState::Open { cancel, .. }) = subs.insert(
            item_id.to_string(),
            SubState::Closing {
                since: Instant::now(),
            },
        ) {
            cancel.cancel();
        }
        drop(subs);
        self.spawn_forget(item_id);
    }

    /// Tear down every live subscription. Used at process shutdown.
    pub fn unsubscribe_all(&self) {
        let mut subs = self.subs.lock().unwrap();
        for (item_id, state) in subs.drain() {
            if let SubState::Open { cancel, .. } = state {
                debug!(item_id, "closing subscription on shutdown");
                cancel.cancel();
            }
        }
    }

    /// Items with a live (open) subscription.
    #[must_use]
    pub fn active_items(&self) -> Vec<String> {
        let subs = self.subs.lock().unwrap();
        subs.iter()
            .filter(|(_, state)| matches!(state, SubState::Open { .. }))
            .map(|(id, _)| id.clone())
            .collect()
    }

    #[must_use]
    pub fn is_subscribed(&self, item_id: &str) -> bool {
        let subs = self.subs.lock().unwrap();
        matches!(subs.get(item_id), Some(SubState::Open { .. }))
    }

    /// Dispatch one event to every handler registered for its kind, in
    /// registration order. Also the injection point for synthetic events in
    /// tests.
    pub async fn dispatch(&self, event: ItemEvent) {
        let handlers = {
            let map = self.handlers.read().unwrap();
            map.get(&event.kind).cloned().unwrap_or_default()
        };
        for handler in handlers {
            if let Err(e) = handler.handle(event.clone()).await {
                warn!(
                    item_id = %event.item_id,
                    kind = event.kind.as_str(),
                    error = %e,
                    "event handler failed"
                );
            }
        }
    }

    /// Whether `generation` still identifies the current open subscription
    /// for `item_id`. A replaced or closed stream fails this check and must
    /// treat everything it sees as stale.
    fn is_current(&self, item_id: &str, generation: u64) -> bool {
        let subs = self.subs.lock().unwrap();
        matches!(
            subs.get(item_id),
            Some(SubState::Open { generation: current, .. }) if *current == generation
        )
    }

    /// Transition open → closing after a terminal event or stream end.
    fn begin_close(&self, item_id: &str, generation: u64) {
        let mut subs = self.subs.lock().unwrap();
        let current = matches!(
            subs.get(item_id),
            Some(SubState::Open { generation: g, .. }) if *g == generation
        );
        if !current {
            return;
        }
        if let Some(SubState::Open { cancel, .. }) = subs.insert(
            item_id.to_string(),
            SubState::Closing {
                since: Instant::now(),
            },
        ) {
            cancel.cancel();
        }
        drop(subs);
        self.spawn_forget(item_id);
    }

    /// Forget the closing marker once the grace window has elapsed.
    fn spawn_forget(&self, item_id: &str) {
        let Some(mgr) = self.self_ref.upgrade() else {
            return;
        };
        let item_id = item_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(mgr.close_grace).await;
            let mut subs = mgr.subs.lock().unwrap();
            if let Some(SubState::Closing { since }) = subs.get(&item_id)
                && since.elapsed() >= mgr.close_grace
            {
                subs.remove(&item_id);
            }
        });
    }

    async fn run_stream(
        self: Arc<Self>,
        item_id: String,
        chat_id: String,
        channel: ChannelKind,
        generation: u64,
        cancel: CancellationToken,
        mut stream: EventStream,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                frame = stream.next() => match frame {
                    None => {
                        if self.is_current(&item_id, generation) {
                            debug!(item_id, "event stream ended without terminal event");
                            self.begin_close(&item_id, generation);
                        }
                        break;
                    },
                    Some(Err(e)) => {
                        if self.is_current(&item_id, generation) {
                            warn!(item_id, error = %e, "event stream transport error");
                            self.begin_close(&item_id, generation);
                        } else {
                            // Error raced a close we initiated ourselves, or
                            // the stream was replaced. Nothing to surface.
                            debug!(item_id, "suppressing error on stale event stream");
                        }
                        break;
                    },
                    Some(Ok(frame)) => {
                        let Some(kind) = EventKind::from_wire(&frame.event) else {
                            debug!(item_id, event = %frame.event, "ignoring transport-level event");
                            continue;
                        };
                        let payload = match serde_json::from_value::<EventPayload>(frame.data) {
                            Ok(payload) => payload,
                            Err(e) => {
                                debug!(item_id, error = %e, "dropping unparsable event payload");
                                continue;
                            },
                        };
                        let event = ItemEvent {
                            kind,
                            item_id: item_id.clone(),
                            chat_id: chat_id.clone(),
                            channel,
                            payload,
                        };
                        self.dispatch(event).await;
                        if kind.is_terminal() {
                            self.begin_close(&item_id, generation);
                            break;
                        }
                    },
                },
            }
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use {
        anyhow::{Result, anyhow, bail},
        tokio::sync::mpsc,
        tokio_stream::wrappers::ReceiverStream,
    };

    use courier_core_client::{CoreUser, FileUpload, Item, ItemPage, NewItem, SseFrame};

    use super::*;

    /// Core stub that hands out mpsc-backed event streams. Tests push
    /// `Ok` frames or transport errors through the senders.
    struct StubCore {
        senders: StdMutex<Vec<mpsc::Sender<Result<SseFrame>>>>,
        fail_open: bool,
    }

    impl StubCore {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                senders: StdMutex::new(Vec::new()),
                fail_open: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                senders: StdMutex::new(Vec::new()),
                fail_open: true,
            })
        }

        fn sender(&self, index: usize) -> mpsc::Sender<Result<SseFrame>> {
            self.senders.lock().unwrap()[index].clone()
        }
    }

    #[async_trait]
    impl CoreClient for StubCore {
        async fn create_item(&self, _item: NewItem, _api_key: &str) -> Result<Item> {
            bail!("not used")
        }

        async fn create_item_with_file(
            &self,
            _item: NewItem,
            _file: FileUpload,
            _api_key: &str,
        ) -> Result<Item> {
            bail!("not used")
        }

        async fn create_item_with_files(
            &self,
            _item: NewItem,
            _files: Vec<FileUpload>,
            _api_key: &str,
        ) -> Result<Item> {
            bail!("not used")
        }

        async fn get_me_by_api_key(&self, _api_key: &str) -> Result<Option<CoreUser>> {
            Ok(None)
        }

        async fn get_items(&self, _api_key: &str, _page: u32, _limit: u32) -> Result<ItemPage> {
            bail!("not used")
        }

        async fn open_event_stream(
            &self,
            _item_id: &str,
            _api_key: &str,
        ) -> Result<EventStream> {
            if self.fail_open {
                bail!("stream rejected");
            }
            let (tx, rx) = mpsc::channel(16);
            self.senders.lock().unwrap().push(tx);
            Ok(ReceiverStream::new(rx).boxed())
        }
    }

    struct Recorder {
        events: StdMutex<Vec<ItemEvent>>,
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                events: StdMutex::new(Vec::new()),
            })
        }

        fn count(&self) -> usize {
            self.events.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle(&self, event: ItemEvent) -> Result<()> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl EventHandler for FailingHandler {
        async fn handle(&self, _event: ItemEvent) -> Result<()> {
            bail!("handler exploded")
        }
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        for _ in 0..100 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within 1s");
    }

    fn frame(event: &str, data: serde_json::Value) -> SseFrame {
        SseFrame {
            event: event.into(),
            data,
        }
    }

    #[tokio::test]
    async fn resubscribe_replaces_live_stream() {
        let core = StubCore::new();
        let mgr = SubscriptionManager::new(core.clone());

        mgr.subscribe_to_item("item-1", "chat1", ChannelKind::Telegram, "k")
            .await;
        mgr.subscribe_to_item("item-1", "chat1", ChannelKind::Telegram, "k")
            .await;

        assert_eq!(mgr.active_items(), vec!["item-1".to_string()]);
        // The first stream's receiver is dropped once its task observes the
        // cancellation.
        let first = core.sender(0);
        wait_until(|| first.is_closed()).await;
        assert!(!core.sender(1).is_closed());
    }

    #[tokio::test]
    async fn terminal_event_dispatches_then_self_unsubscribes() {
        let core = StubCore::new();
        let mgr = SubscriptionManager::new(core.clone());
        let recorder = Recorder::new();
        mgr.on(EventKind::RoutingCompleted, recorder.clone());

        mgr.subscribe_to_item("item-1", "chat1", ChannelKind::Lark, "k")
            .await;
        core.sender(0)
            .send(Ok(frame(
                "routing-completed",
                serde_json::json!({"targets": ["inbox"], "timestamp": "t1"}),
            )))
            .await
            .unwrap();

        wait_until(|| recorder.count() == 1).await;
        wait_until(|| !mgr.is_subscribed("item-1")).await;

        let events = recorder.events.lock().unwrap();
        assert_eq!(events[0].chat_id, "chat1");
        assert_eq!(events[0].channel, ChannelKind::Lark);
        assert_eq!(events[0].payload.targets, vec!["inbox".to_string()]);
    }

    #[tokio::test]
    async fn non_terminal_event_keeps_subscription_open() {
        let core = StubCore::new();
        let mgr = SubscriptionManager::new(core.clone());
        let recorder = Recorder::new();
        mgr.on(EventKind::AiCompleted, recorder.clone());

        mgr.subscribe_to_item("item-1", "chat1", ChannelKind::Telegram, "k")
            .await;
        core.sender(0)
            .send(Ok(frame(
                "ai-completed",
                serde_json::json!({"category": "todo", "timestamp": "t1"}),
            )))
            .await
            .unwrap();

        wait_until(|| recorder.count() == 1).await;
        assert!(mgr.is_subscribed("item-1"));
    }

    #[tokio::test]
    async fn transport_frames_never_reach_handlers() {
        let core = StubCore::new();
        let mgr = SubscriptionManager::new(core.clone());
        let recorder = Recorder::new();
        for kind in EventKind::ALL {
            mgr.on(kind, recorder.clone());
        }

        mgr.subscribe_to_item("item-1", "chat1", ChannelKind::Telegram, "k")
            .await;
        let tx = core.sender(0);
        tx.send(Ok(frame("connected", serde_json::json!({"timestamp": "t0"}))))
            .await
            .unwrap();
        tx.send(Ok(frame("heartbeat", serde_json::json!({"timestamp": "t1"}))))
            .await
            .unwrap();
        tx.send(Ok(frame(
            "routing-failed",
            serde_json::json!({"error": "no route", "timestamp": "t2"}),
        )))
        .await
        .unwrap();

        wait_until(|| recorder.count() == 1).await;
        let events = recorder.events.lock().unwrap();
        assert_eq!(events[0].kind, EventKind::RoutingFailed);
    }

    #[tokio::test]
    async fn failing_handler_does_not_block_siblings() {
        let core = StubCore::new();
        let mgr = SubscriptionManager::new(core.clone());
        let recorder = Recorder::new();
        mgr.on(EventKind::AiFailed, Arc::new(FailingHandler));
        mgr.on(EventKind::AiFailed, recorder.clone());

        mgr.dispatch(ItemEvent {
            kind: EventKind::AiFailed,
            item_id: "item-1".into(),
            chat_id: "chat1".into(),
            channel: ChannelKind::Telegram,
            payload: EventPayload::default(),
        })
        .await;

        assert_eq!(recorder.count(), 1);
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let core = StubCore::new();
        let mgr = SubscriptionManager::new(core.clone());

        mgr.subscribe_to_item("item-1", "chat1", ChannelKind::Telegram, "k")
            .await;
        mgr.unsubscribe("item-1");
        mgr.unsubscribe("item-1");
        mgr.unsubscribe("never-subscribed");

        assert!(!mgr.is_subscribed("item-1"));
        wait_until(|| core.sender(0).is_closed()).await;
    }

    #[tokio::test]
    async fn closing_marker_is_forgotten_after_grace() {
        let core = StubCore::new();
        let mgr = SubscriptionManager::with_close_grace(core.clone(), Duration::from_millis(50));

        mgr.subscribe_to_item("item-1", "chat1", ChannelKind::Telegram, "k")
            .await;
        mgr.unsubscribe("item-1");
        {
            let subs = mgr.subs.lock().unwrap();
            assert!(matches!(subs.get("item-1"), Some(SubState::Closing { .. })));
        }

        wait_until(|| mgr.subs.lock().unwrap().is_empty()).await;
    }

    #[tokio::test]
    async fn transport_error_on_live_stream_begins_close() {
        let core = StubCore::new();
        let mgr = SubscriptionManager::new(core.clone());
        let recorder = Recorder::new();
        for kind in EventKind::ALL {
            mgr.on(kind, recorder.clone());
        }

        mgr.subscribe_to_item("item-1", "chat1", ChannelKind::Telegram, "k")
            .await;
        core.sender(0)
            .send(Err(anyhow!("connection reset")))
            .await
            .unwrap();

        wait_until(|| !mgr.is_subscribed("item-1")).await;
        {
            let subs = mgr.subs.lock().unwrap();
            assert!(matches!(subs.get("item-1"), Some(SubState::Closing { .. })));
        }
        assert_eq!(recorder.count(), 0);
    }

    #[tokio::test]
    async fn stale_stream_error_leaves_current_subscription_alone() {
        let core = StubCore::new();
        let mgr = SubscriptionManager::new(core.clone());
        let recorder = Recorder::new();
        for kind in EventKind::ALL {
            mgr.on(kind, recorder.clone());
        }

        mgr.subscribe_to_item("item-1", "chat1", ChannelKind::Telegram, "k")
            .await;

        // A replaced handle errors out after the manager has moved on; its
        // generation no longer matches the open subscription.
        let (tx, rx) = mpsc::channel(4);
        tx.send(Err(anyhow!("late transport error"))).await.unwrap();
        let stream: EventStream = ReceiverStream::new(rx).boxed();
        mgr.clone()
            .run_stream(
                "item-1".into(),
                "chat1".into(),
                ChannelKind::Telegram,
                0,
                CancellationToken::new(),
                stream,
            )
            .await;

        assert!(mgr.is_subscribed("item-1"), "current stream must stay open");
        assert_eq!(recorder.count(), 0);
    }

    #[tokio::test]
    async fn failed_stream_open_leaves_no_subscription() {
        let core = StubCore::failing();
        let mgr = SubscriptionManager::new(core);

        mgr.subscribe_to_item("item-1", "chat1", ChannelKind::Telegram, "k")
            .await;
        assert!(mgr.active_items().is_empty());
    }

    #[tokio::test]
    async fn unsubscribe_all_clears_everything() {
        let core = StubCore::new();
        let mgr = SubscriptionManager::new(core.clone());

        mgr.subscribe_to_item("item-1", "chat1", ChannelKind::Telegram, "k")
            .await;
        mgr.subscribe_to_item("item-2", "chat2", ChannelKind::Lark, "k")
            .await;
        mgr.unsubscribe_all();

        assert!(mgr.active_items().is_empty());
        wait_until(|| core.sender(0).is_closed() && core.sender(1).is_closed()).await;
    }
}
