//! Per-connection WebSocket session actors.
//!
//! Each connection runs a reader (control plane: subscriptions, rate limit,
//! liveness) in the upgrade task and a writer task draining the bounded
//! outbound queue, so outbound delivery is a single-writer FIFO per
//! connection.

use crate::{
    GatewayConfig,
    error::GatewayError,
    registry::{OutboundFrame, OutboundQueue, Registry},
    wire::{ControlMethod, ControlRequest, ControlResponse, ErrorFrame, StreamName},
};
use axum::extract::ws::{Message, WebSocket};
use fnv::FnvHashSet;
use futures::{SinkExt, StreamExt};
use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::{Duration, Instant},
};
use tracing::{debug, warn};

/// Error codes carried by outbound error frames.
pub const CODE_RATE_LIMITED: i64 = -1003;
pub const CODE_INVALID_MESSAGE: i64 = -1000;
pub const CODE_INVALID_STREAM: i64 = -1121;

/// Consecutive rate-limit violations tolerated before the connection is
/// closed.
const MAX_RATE_LIMIT_STRIKES: u32 = 5;

/// Sliding short-window counter bounding inbound control messages.
#[derive(Debug)]
pub struct SlidingWindow {
    max: usize,
    window: Duration,
    hits: VecDeque<Instant>,
}

impl SlidingWindow {
    pub fn new(max: usize, window: Duration) -> Self {
        Self {
            max,
            window,
            hits: VecDeque::with_capacity(max),
        }
    }

    /// Record an arrival at `now`; false when the window is already full.
    pub fn allow_at(&mut self, now: Instant) -> bool {
        while let Some(first) = self.hits.front() {
            if now.duration_since(*first) >= self.window {
                self.hits.pop_front();
            } else {
                break;
            }
        }
        if self.hits.len() >= self.max {
            return false;
        }
        self.hits.push_back(now);
        true
    }

    pub fn allow(&mut self) -> bool {
        self.allow_at(Instant::now())
    }
}

/// Run one accepted WebSocket connection until it disconnects.
///
/// `user` is the lowercased address for `/ws/<address>` connections.
pub async fn run_session(
    socket: WebSocket,
    registry: Arc<Registry>,
    config: GatewayConfig,
    user: Option<String>,
) {
    let queue = Arc::new(OutboundQueue::new(config.outbound_queue_capacity));
    let connection = registry.register(Arc::clone(&queue), user.clone());
    debug!(%connection, ?user, "websocket connected");

    let (mut sink, mut stream) = socket.split();
    let missed_pings = Arc::new(AtomicU32::new(0));

    // Writer: drains the outbound queue and owns keep-alive pings. The
    // queue closing (unregister / backpressure poisoning) ends the task.
    let writer = {
        let queue = Arc::clone(&queue);
        let missed_pings = Arc::clone(&missed_pings);
        let ping_interval = config.ping_interval;
        let max_missed = config.max_missed_pings;
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + ping_interval;
            let mut ping = tokio::time::interval_at(start, ping_interval);
            loop {
                tokio::select! {
                    frame = queue.pop() => match frame {
                        Some(OutboundFrame { payload, .. }) => {
                            if sink.send(Message::Text(payload.into())).await.is_err() {
                                break;
                            }
                        }
                        None => {
                            let _ = sink.send(Message::Close(None)).await;
                            break;
                        }
                    },
                    _ = ping.tick() => {
                        if missed_pings.fetch_add(1, Ordering::AcqRel) >= max_missed {
                            debug!("closing stale connection after missed pings");
                            let _ = sink.send(Message::Close(None)).await;
                            break;
                        }
                        if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                            break;
                        }
                    }
                }
            }
        })
    };

    let mut session = SessionControl {
        registry: Arc::clone(&registry),
        queue: Arc::clone(&queue),
        connection,
        subscriptions: FnvHashSet::default(),
        limiter: SlidingWindow::new(config.rate_limit_max, config.rate_limit_window),
        strikes: 0,
    };

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if !session.on_text(&text) {
                    break;
                }
            }
            Ok(Message::Pong(_)) => {
                missed_pings.store(0, Ordering::Release);
            }
            Ok(Message::Ping(_)) => {
                // Pong replies are handled by the protocol layer; a ping
                // still proves liveness.
                missed_pings.store(0, Ordering::Release);
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
        if queue.is_closed() {
            break;
        }
    }

    registry.unregister(connection);
    let _ = writer.await;
    debug!(%connection, "websocket disconnected");
}

struct SessionControl {
    registry: Arc<Registry>,
    queue: Arc<OutboundQueue>,
    connection: crate::registry::ConnectionId,
    subscriptions: FnvHashSet<String>,
    limiter: SlidingWindow,
    strikes: u32,
}

impl SessionControl {
    /// Handle one inbound control frame. Returns false to close the
    /// connection.
    fn on_text(&mut self, text: &str) -> bool {
        if !self.limiter.allow() {
            self.strikes += 1;
            self.reply_error(ErrorFrame::new(
                CODE_RATE_LIMITED,
                "too many requests",
                None,
            ));
            if self.strikes >= MAX_RATE_LIMIT_STRIKES {
                warn!(connection = %self.connection, "rate limit strikes exhausted");
                return false;
            }
            return true;
        }
        self.strikes = 0;

        let request = match serde_json::from_str::<ControlRequest>(text) {
            Ok(request) => request,
            Err(error) => {
                self.reply_error(ErrorFrame::new(
                    CODE_INVALID_MESSAGE,
                    format!("invalid control message: {error}"),
                    None,
                ));
                return true;
            }
        };

        match request.method {
            ControlMethod::Subscribe => self.on_subscribe(request),
            ControlMethod::Unsubscribe => self.on_unsubscribe(request),
            ControlMethod::ListSubscriptions => {
                let mut names = self.subscriptions.iter().cloned().collect::<Vec<_>>();
                names.sort_unstable();
                self.reply(ControlResponse {
                    result: serde_json::json!(names),
                    id: request.id,
                });
            }
            ControlMethod::Ping => {
                self.reply(ControlResponse {
                    result: serde_json::json!("pong"),
                    id: request.id,
                });
            }
        }
        true
    }

    fn on_subscribe(&mut self, request: ControlRequest) {
        for param in &request.params {
            match StreamName::parse(param) {
                Ok(name) => {
                    let name = name.to_string();
                    self.registry.subscribe(self.connection, &name);
                    self.subscriptions.insert(name);
                }
                Err(GatewayError::InvalidStreamName(name)) => {
                    self.reply_error(ErrorFrame::new(
                        CODE_INVALID_STREAM,
                        format!("invalid stream name: {name}"),
                        request.id.clone(),
                    ));
                    return;
                }
                Err(error) => {
                    self.reply_error(ErrorFrame::new(
                        CODE_INVALID_MESSAGE,
                        error.to_string(),
                        request.id.clone(),
                    ));
                    return;
                }
            }
        }
        self.reply(ControlResponse {
            result: serde_json::Value::Null,
            id: request.id,
        });
    }

    fn on_unsubscribe(&mut self, request: ControlRequest) {
        for param in &request.params {
            self.registry.unsubscribe(self.connection, param);
            self.subscriptions.remove(param);
        }
        self.reply(ControlResponse {
            result: serde_json::Value::Null,
            id: request.id,
        });
    }

    fn reply(&self, response: ControlResponse) {
        if let Ok(payload) = serde_json::to_string(&response) {
            self.queue.push(OutboundFrame::critical(payload));
        }
    }

    fn reply_error(&self, frame: ErrorFrame) {
        if let Ok(payload) = serde_json::to_string(&frame) {
            self.queue.push(OutboundFrame::critical(payload));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sliding_window_rate_limit() {
        let mut limiter = SlidingWindow::new(3, Duration::from_secs(1));
        let start = Instant::now();

        assert!(limiter.allow_at(start));
        assert!(limiter.allow_at(start + Duration::from_millis(100)));
        assert!(limiter.allow_at(start + Duration::from_millis(200)));
        // Window full.
        assert!(!limiter.allow_at(start + Duration::from_millis(300)));
        // The first hit ages out.
        assert!(limiter.allow_at(start + Duration::from_millis(1100)));
    }
}
