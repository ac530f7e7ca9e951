use super::{InvalidationChannel, InvalidationEvent, Subscription};
use crate::error::{ChannelError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::warn;

const DEFAULT_CAPACITY: usize = 64;

/// In-process channel for single-instance deployments and tests.
///
/// Events are numbered from 1 in publish order.
#[derive(Debug)]
pub struct InMemoryChannel {
    sender: broadcast::Sender<InvalidationEvent>,
    sequence: AtomicU64,
}

impl InMemoryChannel {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a channel buffering up to `capacity` undelivered events per
    /// subscriber.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: AtomicU64::new(0),
        }
    }
}

impl Default for InMemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InvalidationChannel for InMemoryChannel {
    async fn publish(&self) -> Result<InvalidationEvent> {
        let id = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let event = InvalidationEvent { id: id.to_string() };

        // Without subscribers there is nobody to notify.
        let _ = self.sender.send(event.clone());
        Ok(event)
    }

    async fn subscribe(&self) -> Result<Box<dyn Subscription>> {
        Ok(Box::new(InMemorySubscription {
            receiver: self.sender.subscribe(),
        }))
    }
}

struct InMemorySubscription {
    receiver: broadcast::Receiver<InvalidationEvent>,
}

#[async_trait]
impl Subscription for InMemorySubscription {
    async fn next(&mut self) -> Result<InvalidationEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Ok(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Events carry no payload; the next one has the same effect.
                    warn!(skipped, "invalidation subscriber lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => return Err(ChannelError::Closed),
            }
        }
    }
}
