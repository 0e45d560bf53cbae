/// Live-event hub
///
/// The pipeline publishes a typed event after every served request; an
/// external subscriber (the live dashboard) disseminates them. The hub is
/// a single owner task fed by register/unregister/broadcast messages, so
/// no lock is shared with request handlers. Each subscriber holds a
/// bounded queue; a subscriber that falls behind is dropped and
/// unregistered rather than ever blocking the broadcaster.
use crate::models::RateCategory;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{
    self,
    error::TrySendError,
    Receiver, Sender, UnboundedReceiver, UnboundedSender,
};
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

/// Bounded depth of each subscriber's queue.
const SUBSCRIBER_QUEUE_DEPTH: usize = 32;

/// Unique identifier for one hub subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// One live-update message, tagged on the wire as
/// `{"type":"stats"|"recent","data":{...}}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum LiveEvent {
    Stats(StatsSnapshot),
    Recent(RecentRequest),
}

/// Aggregate counters since process start.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub rate_limited: u64,
    pub upstream_errors: u64,
}

/// One recently served request.
#[derive(Debug, Clone, Serialize)]
pub struct RecentRequest {
    pub key_hint: String,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub cache_hit: bool,
    pub category: Option<RateCategory>,
    pub timestamp: DateTime<Utc>,
}

/// Process-wide request counters backing the `stats` events.
#[derive(Debug, Default)]
pub struct ProxyStats {
    total_requests: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    rate_limited: AtomicU64,
    upstream_errors: AtomicU64,
}

impl ProxyStats {
    pub fn record(&self, cache_hit: Option<bool>, status: u16) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        match cache_hit {
            Some(true) => self.cache_hits.fetch_add(1, Ordering::Relaxed),
            Some(false) => self.cache_misses.fetch_add(1, Ordering::Relaxed),
            None => match status {
                429 => self.rate_limited.fetch_add(1, Ordering::Relaxed),
                502 => self.upstream_errors.fetch_add(1, Ordering::Relaxed),
                _ => 0,
            },
        };
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            upstream_errors: self.upstream_errors.load(Ordering::Relaxed),
        }
    }
}

enum HubCommand {
    Register {
        id: SubscriberId,
        tx: Sender<LiveEvent>,
    },
    Unregister {
        id: SubscriberId,
    },
    Broadcast(LiveEvent),
    Count(oneshot::Sender<usize>),
}

/// Cloneable handle to the hub task.
#[derive(Clone)]
pub struct EventHub {
    tx: UnboundedSender<HubCommand>,
}

impl EventHub {
    /// Spawn the owner task and return a handle to it.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_hub(rx));
        Self { tx }
    }

    /// Register a new subscriber and return its id plus event stream.
    pub fn subscribe(&self) -> (SubscriberId, Receiver<LiveEvent>) {
        let (event_tx, event_rx) = mpsc::channel(SUBSCRIBER_QUEUE_DEPTH);
        let id = SubscriberId::new();
        let _ = self.tx.send(HubCommand::Register { id, tx: event_tx });
        (id, event_rx)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        let _ = self.tx.send(HubCommand::Unregister { id });
    }

    /// Fan an event out to every live subscriber. Never blocks.
    pub fn publish(&self, event: LiveEvent) {
        let _ = self.tx.send(HubCommand::Broadcast(event));
    }

    /// Current number of registered subscribers.
    pub async fn subscriber_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(HubCommand::Count(tx)).is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

async fn run_hub(mut rx: UnboundedReceiver<HubCommand>) {
    let mut subscribers: HashMap<SubscriberId, Sender<LiveEvent>> = HashMap::new();

    while let Some(command) = rx.recv().await {
        match command {
            HubCommand::Register { id, tx } => {
                subscribers.insert(id, tx);
                debug!(total = subscribers.len(), "Event subscriber registered");
            }
            HubCommand::Unregister { id } => {
                subscribers.remove(&id);
            }
            HubCommand::Broadcast(event) => {
                subscribers.retain(|id, tx| match tx.try_send(event.clone()) {
                    Ok(()) => true,
                    Err(TrySendError::Full(_)) => {
                        debug!(?id, "Dropping slow event subscriber");
                        false
                    }
                    Err(TrySendError::Closed(_)) => false,
                });
            }
            HubCommand::Count(reply) => {
                let _ = reply.send(subscribers.len());
            }
        }
    }
}
