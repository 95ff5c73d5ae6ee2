//! SimBridge (C10): the run-scoped multiplexer between the scheduler and
//! external subscribers.
//!
//! Direct structural descendant of the teacher's `phago_web::state::
//! AppState` (`tokio::sync::broadcast` event fan-out) and `routes/ws.rs`'s
//! `handle_socket` (`tokio::select!` between broadcast-recv and
//! socket-recv, `Lagged`/`Closed` handling). The teacher's broadcast
//! channel alone only supports "drop oldest of everything" via its
//! internal ring buffer; spec §4.10 requires a priority order (drop oldest
//! *non-tick* first, then oldest tick), so a bounded priority deque sits
//! between the broadcast channel and each subscriber's socket-writer task,
//! the same layering style as the teacher's `DocumentChannel` wrapping a
//! plain `tokio::sync::mpsc` channel to add `try_send`-returns-bool
//! semantics.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, Notify};

use crate::message::BridgeMessage;

/// Default bound on the backbone broadcast channel. Generous relative to
/// per-subscriber queue depth since slow subscribers are bounded by their
/// own `Subscription`, not by this channel.
const BROADCAST_CAPACITY: usize = 4096;

/// Per-run message bus. `publish` is non-blocking and never awaits a
/// subscriber; `subscribe` hands back an independent, priority-bounded
/// stream of messages.
pub struct SimBridge {
    tx: broadcast::Sender<BridgeMessage>,
    dropped_total: Arc<AtomicU64>,
    default_queue_capacity: usize,
}

impl SimBridge {
    pub fn new(default_queue_capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            tx,
            dropped_total: Arc::new(AtomicU64::new(0)),
            default_queue_capacity,
        }
    }

    /// Publish one message to all current and future subscribers. Never
    /// blocks the scheduler: if there are no subscribers this is a no-op
    /// (per `tokio::sync::broadcast`'s semantics), and a lagging
    /// subscriber only affects its own `Subscription`, never the sender.
    pub fn publish(&self, message: BridgeMessage) {
        let _ = self.tx.send(message);
    }

    pub fn dropped_total(&self) -> u64 {
        self.dropped_total.load(Ordering::Relaxed)
    }

    /// Subscribe to this bridge, returning an independent bounded stream.
    /// Spawns a forwarding task that drains the shared broadcast channel
    /// into this subscription's own priority queue, so one slow consumer
    /// never head-of-line-blocks another.
    pub fn subscribe(&self) -> Subscription {
        self.subscribe_with_capacity(self.default_queue_capacity)
    }

    pub fn subscribe_with_capacity(&self, capacity: usize) -> Subscription {
        let rx = self.tx.subscribe();
        let queue = Arc::new(PriorityQueue::new(capacity));
        let dropped_total = self.dropped_total.clone();
        let forward_queue = queue.clone();
        let handle = tokio::spawn(async move {
            forward(rx, forward_queue, dropped_total).await;
        });
        Subscription { queue, _task: handle }
    }
}

async fn forward(
    mut rx: broadcast::Receiver<BridgeMessage>,
    queue: Arc<PriorityQueue>,
    dropped_total: Arc<AtomicU64>,
) {
    loop {
        match rx.recv().await {
            Ok(message) => {
                if queue.push(message) {
                    dropped_total.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(broadcast::error::RecvError::Lagged(_)) => {
                // The backbone channel itself dropped messages before we
                // could drain them (BROADCAST_CAPACITY exceeded); count
                // them the same as a subscriber-side drop and continue.
                dropped_total.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// A single subscriber's bounded view of the bridge. `recv` is the only
/// way to consume messages; dropping a `Subscription` tears down its
/// forwarding task.
pub struct Subscription {
    queue: Arc<PriorityQueue>,
    _task: tokio::task::JoinHandle<()>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<BridgeMessage> {
        self.queue.pop().await
    }
}

/// Bounded deque with the priority-aware eviction policy of spec §4.10:
/// on overflow, drop the oldest non-tick message first; if none exists,
/// drop the oldest tick.
struct PriorityQueue {
    capacity: usize,
    inner: Mutex<VecDeque<BridgeMessage>>,
    notify: Notify,
}

impl PriorityQueue {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    /// Push one message, evicting per policy if at capacity. Returns
    /// `true` if a message was dropped to make room.
    fn push(&self, message: BridgeMessage) -> bool {
        let mut dropped = false;
        {
            let mut q = self.inner.lock().unwrap_or_else(|p| p.into_inner());
            if q.len() >= self.capacity {
                if let Some(pos) = q.iter().position(|m| !m.is_tick()) {
                    q.remove(pos);
                } else {
                    q.pop_front();
                }
                dropped = true;
            }
            q.push_back(message);
        }
        self.notify.notify_one();
        dropped
    }

    async fn pop(&self) -> Option<BridgeMessage> {
        loop {
            {
                let mut q = self.inner.lock().unwrap_or_else(|p| p.into_inner());
                if let Some(m) = q.pop_front() {
                    return Some(m);
                }
            }
            self.notify.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ufog_core::ids::Step;

    fn stats_msg(step: Step) -> BridgeMessage {
        BridgeMessage::Tick {
            step,
            agent_updates: Vec::new(),
        }
    }

    #[tokio::test]
    async fn publish_then_subscribe_delivers_in_order() {
        let bridge = SimBridge::new(8);
        bridge.publish(stats_msg(1));
        let mut sub = bridge.subscribe();
        bridge.publish(stats_msg(2));
        let first = sub.recv().await.unwrap();
        assert!(matches!(first, BridgeMessage::Tick { step: 2, .. }));
    }

    #[tokio::test]
    async fn drops_oldest_non_tick_before_oldest_tick() {
        let bridge = SimBridge::new(2);
        let mut sub = bridge.subscribe();
        bridge.publish(stats_msg(1));
        bridge.publish(BridgeMessage::Error {
            error: "e".into(),
            detail: "d".into(),
            step: None,
        });
        // Queue now full (tick(1), error). A third message should evict
        // the error, not the tick.
        bridge.publish(stats_msg(2));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let first = sub.recv().await.unwrap();
        assert!(matches!(first, BridgeMessage::Tick { step: 1, .. }));
        let second = sub.recv().await.unwrap();
        assert!(matches!(second, BridgeMessage::Tick { step: 2, .. }));
    }
}
