//! In-memory broker with at-least-once delivery semantics.
//!
//! Queues are created on demand and live for the broker's lifetime. Each
//! queue keeps a deque of ready messages plus a map of unacknowledged
//! deliveries keyed by delivery tag; nacking moves a delivery back to the
//! front of the ready deque with its redelivered flag set, which is what
//! lets the rest of the pipeline exercise real duplicate/retry paths
//! without an external broker.

use super::{Delivery, MessageConsumer, MessagePublisher, TransportError, TransportResult};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify, RwLock};
use tracing::trace;

#[derive(Default)]
pub struct InMemoryBroker {
    queues: RwLock<HashMap<String, Arc<QueueInner>>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the queue named `name` and return a handle to it.
    /// Handles are cheap to clone and all clones share the same queue.
    pub async fn declare(&self, name: &str) -> QueueHandle {
        {
            let queues = self.queues.read().await;
            if let Some(inner) = queues.get(name) {
                return QueueHandle {
                    inner: Arc::clone(inner),
                };
            }
        }

        let mut queues = self.queues.write().await;
        let inner = queues
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(QueueInner::new(name)));
        QueueHandle {
            inner: Arc::clone(inner),
        }
    }

    /// Close a queue: publishing stops, consumers drain what is ready and
    /// then observe end-of-queue.
    pub async fn close(&self, name: &str) -> TransportResult<()> {
        let inner = self.get(name).await?;
        let mut state = inner.state.lock().await;
        state.closed = true;
        drop(state);
        inner.notify.notify_waiters();
        trace!(queue = name, "queue closed");
        Ok(())
    }

    /// Number of ready (not yet delivered) messages.
    pub async fn depth(&self, name: &str) -> TransportResult<usize> {
        let inner = self.get(name).await?;
        let state = inner.state.lock().await;
        Ok(state.ready.len())
    }

    /// Number of delivered but unacknowledged messages.
    pub async fn unacked(&self, name: &str) -> TransportResult<usize> {
        let inner = self.get(name).await?;
        let state = inner.state.lock().await;
        Ok(state.unacked.len())
    }

    async fn get(&self, name: &str) -> TransportResult<Arc<QueueInner>> {
        let queues = self.queues.read().await;
        queues
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| TransportError::unknown_queue(name))
    }
}

/// Publisher + consumer handle for one queue.
#[derive(Clone)]
pub struct QueueHandle {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    name: String,
    state: Mutex<QueueState>,
    notify: Notify,
}

impl QueueInner {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        }
    }
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<QueuedMessage>,
    unacked: HashMap<u64, QueuedMessage>,
    next_tag: u64,
    closed: bool,
}

struct QueuedMessage {
    payload: Vec<u8>,
    redelivered: bool,
}

#[async_trait]
impl MessagePublisher for QueueHandle {
    async fn publish(&self, payload: Vec<u8>) -> TransportResult<()> {
        let mut state = self.inner.state.lock().await;
        if state.closed {
            return Err(TransportError::queue_closed(&self.inner.name));
        }
        state.ready.push_back(QueuedMessage {
            payload,
            redelivered: false,
        });
        drop(state);
        self.inner.notify.notify_one();
        Ok(())
    }
}

#[async_trait]
impl MessageConsumer for QueueHandle {
    async fn receive(&self) -> TransportResult<Option<Delivery>> {
        loop {
            // The notified future must exist before the state check, or a
            // publish landing between check and await could be missed.
            let notified = self.inner.notify.notified();

            {
                let mut state = self.inner.state.lock().await;
                if let Some(message) = state.ready.pop_front() {
                    let tag = state.next_tag;
                    state.next_tag += 1;
                    let delivery = Delivery {
                        payload: message.payload.clone(),
                        delivery_tag: tag,
                        redelivered: message.redelivered,
                    };
                    state.unacked.insert(tag, message);
                    if !state.ready.is_empty() {
                        // Notify stores at most one permit, so chain wakeups
                        // for messages that arrived while nobody waited.
                        self.inner.notify.notify_one();
                    }
                    trace!(
                        queue = %self.inner.name,
                        tag,
                        redelivered = delivery.redelivered,
                        "delivery handed out"
                    );
                    return Ok(Some(delivery));
                }
                if state.closed {
                    return Ok(None);
                }
            }

            notified.await;
        }
    }

    async fn ack(&self, delivery: &Delivery) -> TransportResult<()> {
        let mut state = self.inner.state.lock().await;
        state
            .unacked
            .remove(&delivery.delivery_tag)
            .ok_or_else(|| {
                TransportError::unknown_delivery_tag(&self.inner.name, delivery.delivery_tag)
            })?;
        trace!(queue = %self.inner.name, tag = delivery.delivery_tag, "delivery acked");
        Ok(())
    }

    async fn nack_requeue(&self, delivery: &Delivery) -> TransportResult<()> {
        let mut state = self.inner.state.lock().await;
        let message = state
            .unacked
            .remove(&delivery.delivery_tag)
            .ok_or_else(|| {
                TransportError::unknown_delivery_tag(&self.inner.name, delivery.delivery_tag)
            })?;
        state.ready.push_front(QueuedMessage {
            payload: message.payload,
            redelivered: true,
        });
        drop(state);
        self.inner.notify.notify_one();
        trace!(queue = %self.inner.name, tag = delivery.delivery_tag, "delivery requeued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_then_receive_preserves_fifo_order() {
        let broker = InMemoryBroker::new();
        let queue = broker.declare("q").await;

        queue.publish(b"first".to_vec()).await.unwrap();
        queue.publish(b"second".to_vec()).await.unwrap();

        let a = queue.receive().await.unwrap().unwrap();
        let b = queue.receive().await.unwrap().unwrap();
        assert_eq!(a.payload, b"first");
        assert_eq!(b.payload, b"second");
        assert!(!a.redelivered);
    }

    #[tokio::test]
    async fn ack_settles_delivery() {
        let broker = InMemoryBroker::new();
        let queue = broker.declare("q").await;
        queue.publish(b"msg".to_vec()).await.unwrap();

        let delivery = queue.receive().await.unwrap().unwrap();
        assert_eq!(broker.unacked("q").await.unwrap(), 1);

        queue.ack(&delivery).await.unwrap();
        assert_eq!(broker.unacked("q").await.unwrap(), 0);
        assert_eq!(broker.depth("q").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn double_ack_is_an_error() {
        let broker = InMemoryBroker::new();
        let queue = broker.declare("q").await;
        queue.publish(b"msg".to_vec()).await.unwrap();

        let delivery = queue.receive().await.unwrap().unwrap();
        queue.ack(&delivery).await.unwrap();
        assert!(matches!(
            queue.ack(&delivery).await,
            Err(TransportError::UnknownDeliveryTag { .. })
        ));
    }

    #[tokio::test]
    async fn nack_requeues_at_front_with_redelivered_flag() {
        let broker = InMemoryBroker::new();
        let queue = broker.declare("q").await;
        queue.publish(b"first".to_vec()).await.unwrap();
        queue.publish(b"second".to_vec()).await.unwrap();

        let delivery = queue.receive().await.unwrap().unwrap();
        queue.nack_requeue(&delivery).await.unwrap();

        let retried = queue.receive().await.unwrap().unwrap();
        assert_eq!(retried.payload, b"first");
        assert!(retried.redelivered);
        assert_ne!(retried.delivery_tag, delivery.delivery_tag);
    }

    #[tokio::test]
    async fn close_drains_ready_messages_then_ends() {
        let broker = InMemoryBroker::new();
        let queue = broker.declare("q").await;
        queue.publish(b"leftover".to_vec()).await.unwrap();
        broker.close("q").await.unwrap();

        let delivery = queue.receive().await.unwrap().unwrap();
        assert_eq!(delivery.payload, b"leftover");
        queue.ack(&delivery).await.unwrap();

        assert!(queue.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn publish_after_close_is_rejected() {
        let broker = InMemoryBroker::new();
        let queue = broker.declare("q").await;
        broker.close("q").await.unwrap();

        assert!(matches!(
            queue.publish(b"late".to_vec()).await,
            Err(TransportError::QueueClosed(_))
        ));
    }

    #[tokio::test]
    async fn close_wakes_blocked_consumers() {
        let broker = Arc::new(InMemoryBroker::new());
        let queue = broker.declare("q").await;

        let consumer = queue.clone();
        let waiter = tokio::spawn(async move { consumer.receive().await });

        tokio::task::yield_now().await;
        broker.close("q").await.unwrap();

        let received = waiter.await.unwrap().unwrap();
        assert!(received.is_none());
    }

    #[tokio::test]
    async fn operations_on_undeclared_queue_fail() {
        let broker = InMemoryBroker::new();
        assert!(matches!(
            broker.close("missing").await,
            Err(TransportError::UnknownQueue(_))
        ));
        assert!(matches!(
            broker.depth("missing").await,
            Err(TransportError::UnknownQueue(_))
        ));
    }

    #[tokio::test]
    async fn each_message_is_delivered_to_exactly_one_consumer() {
        let broker = Arc::new(InMemoryBroker::new());
        let queue = broker.declare("q").await;

        for i in 0..20u8 {
            queue.publish(vec![i]).await.unwrap();
        }
        broker.close("q").await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let consumer = queue.clone();
            handles.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Some(delivery) = consumer.receive().await.unwrap() {
                    seen.push(delivery.payload[0]);
                    consumer.ack(&delivery).await.unwrap();
                }
                seen
            }));
        }

        let mut all: Vec<u8> = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort_unstable();
        assert_eq!(all, (0..20u8).collect::<Vec<_>>());
    }
}
