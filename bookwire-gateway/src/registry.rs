//! Subscription / user-channel registries and per-connection outbound
//! queues.
//!
//! The registries are mutated under fine-grained locks keyed by stream name
//! and by address; broadcasts iterate over a snapshot of the subscriber set
//! so no lock is held across queue pushes. Each connection owns a bounded
//! outbound queue drained by a single writer task, giving per-connection
//! FIFO delivery with explicit backpressure.

use fnv::{FnvHashMap, FnvHashSet};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Registry-scoped connection identifier.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, derive_more::Display,
)]
pub struct ConnectionId(u64);

/// One outbound wire frame: pre-serialized payload plus its drop class.
/// Critical frames (executionReport, balanceUpdate) are never dropped.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    pub payload: String,
    pub critical: bool,
}

impl OutboundFrame {
    pub fn public(payload: String) -> Self {
        Self {
            payload,
            critical: false,
        }
    }

    pub fn critical(payload: String) -> Self {
        Self {
            payload,
            critical: true,
        }
    }
}

/// Bounded per-connection outbound queue.
///
/// Overflow drops the oldest non-critical frame and flags backpressure; if
/// the queue is full of critical frames the connection is poisoned (closed
/// by its writer) rather than dropping one.
#[derive(Debug)]
pub struct OutboundQueue {
    frames: Mutex<VecDeque<OutboundFrame>>,
    notify: Notify,
    capacity: usize,
    closed: AtomicBool,
    backpressured: AtomicBool,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            capacity,
            closed: AtomicBool::new(false),
            backpressured: AtomicBool::new(false),
        }
    }

    /// Enqueue a frame without blocking. Returns false when the push
    /// poisoned the connection (critical overflow).
    pub fn push(&self, frame: OutboundFrame) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }

        let mut frames = self.frames.lock();
        if frames.len() >= self.capacity {
            self.backpressured.store(true, Ordering::Release);
            match frames.iter().position(|queued| !queued.critical) {
                Some(index) => {
                    frames.remove(index);
                }
                None => {
                    if frame.critical {
                        // Never drop a critical frame: close instead.
                        drop(frames);
                        self.close();
                        return false;
                    }
                    // Queue full of critical frames; the incoming public
                    // frame is the one to shed.
                    return true;
                }
            }
        }
        frames.push_back(frame);
        drop(frames);
        self.notify.notify_one();
        true
    }

    /// Await the next frame; `None` once closed and drained.
    pub async fn pop(&self) -> Option<OutboundFrame> {
        loop {
            let notified = self.notify.notified();
            if let Some(frame) = self.frames.lock().pop_front() {
                return Some(frame);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            notified.await;
        }
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn is_backpressured(&self) -> bool {
        self.backpressured.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone)]
struct ConnectionHandle {
    queue: Arc<OutboundQueue>,
    user: Option<String>,
}

/// Gateway statistics surfaced by `/health`.
#[derive(Debug, Default)]
pub struct GatewayStats {
    pub connections: AtomicU64,
    pub messages_sent: AtomicU64,
    pub messages_dropped: AtomicU64,
}

/// Serializable snapshot of [`GatewayStats`] plus registry sizes.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct GatewayStatsView {
    pub connections: u64,
    pub streams: u64,
    pub users: u64,
    pub messages_sent: u64,
    pub messages_dropped: u64,
}

/// Shared subscriber state: stream name → connections, lowercased address →
/// connections, connection → handle.
#[derive(Debug, Default)]
pub struct Registry {
    next_id: AtomicU64,
    streams: RwLock<FnvHashMap<String, FnvHashSet<ConnectionId>>>,
    users: RwLock<FnvHashMap<String, FnvHashSet<ConnectionId>>>,
    connections: RwLock<FnvHashMap<ConnectionId, ConnectionHandle>>,
    stats: GatewayStats,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection, optionally bound to a lowercased user address.
    pub fn register(&self, queue: Arc<OutboundQueue>, user: Option<String>) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.connections
            .write()
            .insert(id, ConnectionHandle { queue, user: user.clone() });
        if let Some(user) = user {
            self.users.write().entry(user).or_default().insert(id);
        }
        self.stats.connections.fetch_add(1, Ordering::Relaxed);
        id
    }

    /// Remove a connection from every registry and close its queue.
    pub fn unregister(&self, id: ConnectionId) {
        let Some(handle) = self.connections.write().remove(&id) else {
            return;
        };
        handle.queue.close();
        if let Some(user) = &handle.user {
            let mut users = self.users.write();
            if let Some(set) = users.get_mut(user) {
                set.remove(&id);
                if set.is_empty() {
                    users.remove(user);
                }
            }
        }
        let mut streams = self.streams.write();
        streams.retain(|_, subscribers| {
            subscribers.remove(&id);
            !subscribers.is_empty()
        });
        self.stats.connections.fetch_sub(1, Ordering::Relaxed);
        debug!(%id, "connection unregistered");
    }

    pub fn subscribe(&self, id: ConnectionId, stream: &str) {
        self.streams
            .write()
            .entry(stream.to_string())
            .or_default()
            .insert(id);
    }

    pub fn unsubscribe(&self, id: ConnectionId, stream: &str) {
        let mut streams = self.streams.write();
        if let Some(subscribers) = streams.get_mut(stream) {
            subscribers.remove(&id);
            if subscribers.is_empty() {
                streams.remove(stream);
            }
        }
    }

    /// Send `payload` to every subscriber of `stream`. Non-blocking; slow
    /// consumers shed their oldest public frame.
    pub fn broadcast_to_stream(&self, stream: &str, payload: &str) {
        let subscribers = {
            let streams = self.streams.read();
            match streams.get(stream) {
                Some(subscribers) => subscribers.iter().copied().collect::<Vec<_>>(),
                None => return,
            }
        };
        self.deliver(&subscribers, || OutboundFrame::public(payload.to_string()));
    }

    /// Send `payload` directly to every connection bound to `user`
    /// (lowercased address). Critical delivery: overflow closes the
    /// connection instead of dropping the frame.
    pub fn send_to_user(&self, user: &str, payload: &str) {
        let subscribers = {
            let users = self.users.read();
            match users.get(user) {
                Some(subscribers) => subscribers.iter().copied().collect::<Vec<_>>(),
                None => return,
            }
        };
        self.deliver(&subscribers, || OutboundFrame::critical(payload.to_string()));
    }

    fn deliver<F>(&self, subscribers: &[ConnectionId], frame: F)
    where
        F: Fn() -> OutboundFrame,
    {
        let connections = self.connections.read();
        for id in subscribers {
            let Some(handle) = connections.get(id) else {
                continue;
            };
            if handle.queue.push(frame()) {
                self.stats.messages_sent.fetch_add(1, Ordering::Relaxed);
            } else {
                self.stats.messages_dropped.fetch_add(1, Ordering::Relaxed);
                warn!(connection = %id, "outbound queue poisoned, connection closing");
            }
        }
    }

    pub fn stats(&self) -> GatewayStatsView {
        GatewayStatsView {
            connections: self.stats.connections.load(Ordering::Relaxed),
            streams: self.streams.read().len() as u64,
            users: self.users.read().len() as u64,
            messages_sent: self.stats.messages_sent.load(Ordering::Relaxed),
            messages_dropped: self.stats.messages_dropped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(payload: &str, critical: bool) -> OutboundFrame {
        OutboundFrame {
            payload: payload.to_string(),
            critical,
        }
    }

    #[tokio::test]
    async fn test_queue_overflow_drops_oldest_public_frame() {
        let queue = OutboundQueue::new(2);
        assert!(queue.push(frame("a", false)));
        assert!(queue.push(frame("b", true)));
        // Overflow: "a" (oldest non-critical) is shed for "c".
        assert!(queue.push(frame("c", false)));
        assert!(queue.is_backpressured());

        assert_eq!(queue.pop().await.unwrap().payload, "b");
        assert_eq!(queue.pop().await.unwrap().payload, "c");
    }

    #[tokio::test]
    async fn test_queue_full_of_critical_frames_poisons_on_critical_push() {
        let queue = OutboundQueue::new(2);
        assert!(queue.push(frame("a", true)));
        assert!(queue.push(frame("b", true)));

        // A public frame is shed silently; the queue stays open.
        assert!(queue.push(frame("c", false)));
        assert!(!queue.is_closed());

        // A critical frame cannot be dropped: the connection is poisoned.
        assert!(!queue.push(frame("d", true)));
        assert!(queue.is_closed());
    }

    #[tokio::test]
    async fn test_broadcast_and_user_routing() {
        let registry = Registry::new();

        let public_queue = Arc::new(OutboundQueue::new(8));
        let public_id = registry.register(Arc::clone(&public_queue), None);
        registry.subscribe(public_id, "wethusdc@trade");

        let user_queue = Arc::new(OutboundQueue::new(8));
        registry.register(Arc::clone(&user_queue), Some("0xabc".to_string()));

        registry.broadcast_to_stream("wethusdc@trade", "trade-frame");
        registry.send_to_user("0xabc", "report-frame");
        registry.send_to_user("0xdef", "misrouted");

        assert_eq!(public_queue.pop().await.unwrap().payload, "trade-frame");
        assert_eq!(user_queue.pop().await.unwrap().payload, "report-frame");
        assert_eq!(registry.stats().messages_sent, 2);

        registry.unregister(public_id);
        assert_eq!(registry.stats().connections, 1);
        assert_eq!(registry.stats().streams, 0);
    }
}
