//! Transport seam between pipeline components.
//!
//! Components never talk to a broker directly; they hold a consumer or
//! publisher trait object for one queue. The contract is at-least-once:
//! a delivery stays owned by its consumer until acknowledged, a negative
//! acknowledgement requeues it for redelivery (flagged as such), and
//! duplicates or reordering are the consumer's problem to tolerate. Every
//! loop in this crate follows a receive, process, ack discipline, so at
//! most one delivery per loop is unacknowledged at a time.

use async_trait::async_trait;
use thiserror::Error;

mod memory;

pub use memory::{InMemoryBroker, QueueHandle};

pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("queue '{0}' is closed")]
    QueueClosed(String),

    #[error("queue '{0}' has not been declared")]
    UnknownQueue(String),

    #[error("unknown delivery tag {tag} on queue '{queue}'")]
    UnknownDeliveryTag { queue: String, tag: u64 },
}

impl TransportError {
    pub fn queue_closed(name: impl Into<String>) -> Self {
        Self::QueueClosed(name.into())
    }

    pub fn unknown_queue(name: impl Into<String>) -> Self {
        Self::UnknownQueue(name.into())
    }

    pub fn unknown_delivery_tag(queue: impl Into<String>, tag: u64) -> Self {
        Self::UnknownDeliveryTag {
            queue: queue.into(),
            tag,
        }
    }
}

/// A message pulled from a queue, unacknowledged until its consumer settles it.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub payload: Vec<u8>,
    /// Identifies this delivery for ack/nack; unique per queue.
    pub delivery_tag: u64,
    /// True when the message was requeued by a previous consumer.
    pub redelivered: bool,
}

/// Consuming side of one queue.
#[async_trait]
pub trait MessageConsumer: Send + Sync {
    /// Wait for the next delivery. Returns `None` once the queue has been
    /// closed and every ready message has been handed out.
    async fn receive(&self) -> TransportResult<Option<Delivery>>;

    /// Settle a delivery as processed; it will never be delivered again.
    async fn ack(&self, delivery: &Delivery) -> TransportResult<()>;

    /// Return a delivery to the front of the queue for redelivery.
    async fn nack_requeue(&self, delivery: &Delivery) -> TransportResult<()>;
}

/// Publishing side of one queue.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(&self, payload: Vec<u8>) -> TransportResult<()>;
}
