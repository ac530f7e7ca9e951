//! Cross-instance cache invalidation.
//!
//! A [`CacheInvalidator`] clears the local [`RuleCache`] and publishes a
//! clear event on an [`InvalidationChannel`] shared by every instance. Each
//! instance runs an [`InvalidationListener`] that clears its own cache on
//! every event it receives (including its own) and warms it up again.

mod memory;
mod redis_stream;

pub use memory::InMemoryChannel;
pub use redis_stream::{RedisStreamChannel, RedisStreamConfig, DEFAULT_STREAM_KEY};

use crate::cache::RuleCache;
use crate::error::{ChannelError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Delay before reading again after a failed receive.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// A delivered "clear cache" signal. The event carries no payload besides
/// the id assigned by the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationEvent {
    pub id: String,
}

/// An ordered, at-least-once channel carrying clear-cache events to every
/// subscribed instance.
#[async_trait]
pub trait InvalidationChannel: Send + Sync + 'static {
    /// Publishes a clear-cache event and returns it as recorded by the channel.
    async fn publish(&self) -> Result<InvalidationEvent>;

    /// Subscribes to events published after this call returns.
    async fn subscribe(&self) -> Result<Box<dyn Subscription>>;
}

#[async_trait]
pub trait Subscription: Send + 'static {
    /// Waits for the next event. Returns [`ChannelError::Closed`] once no
    /// further events can arrive.
    async fn next(&mut self) -> Result<InvalidationEvent>;
}

/// Publisher half: clears this instance and notifies all the others.
#[derive(Clone)]
pub struct CacheInvalidator {
    cache: Arc<RuleCache>,
    channel: Arc<dyn InvalidationChannel>,
}

impl CacheInvalidator {
    pub fn new(cache: Arc<RuleCache>, channel: Arc<dyn InvalidationChannel>) -> Self {
        Self { cache, channel }
    }

    /// Clears the local cache, then publishes a clear event.
    ///
    /// The local clear has happened even when publishing fails.
    pub async fn clear_all(&self) -> Result<InvalidationEvent> {
        self.cache.clear().await;

        match self.channel.publish().await {
            Ok(event) => {
                debug!(event_id = %event.id, "published cache invalidation");
                Ok(event)
            }
            Err(e) => {
                error!(error = %e, "failed to publish cache invalidation, other instances keep their rules");
                Err(e)
            }
        }
    }
}

/// Subscriber half: applies every received event to the local cache.
pub struct InvalidationListener;

impl InvalidationListener {
    /// Subscribes to `channel` and spawns a task clearing and reloading
    /// `cache` on every event.
    ///
    /// The subscription is in place when this returns, so events published
    /// afterwards are not missed. The task ends when the channel closes.
    pub async fn spawn(
        cache: Arc<RuleCache>,
        channel: Arc<dyn InvalidationChannel>,
    ) -> Result<JoinHandle<()>> {
        let mut subscription = channel.subscribe().await?;

        Ok(tokio::spawn(async move {
            loop {
                match subscription.next().await {
                    Ok(event) => {
                        info!(event_id = %event.id, "received cache invalidation");
                        cache.clear().await;
                        cache.ensure_loaded().await;
                    }
                    Err(ChannelError::Closed) => {
                        warn!("invalidation channel closed, stopping listener");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to receive cache invalidation, retrying");
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                }
            }
        }))
    }
}
