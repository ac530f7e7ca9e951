use super::{InvalidationChannel, InvalidationEvent, Subscription};
use crate::error::{ChannelError, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{StreamMaxlen, StreamRangeReply, StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{trace, warn};
use typed_builder::TypedBuilder;

pub const DEFAULT_STREAM_KEY: &str = "rewriter:cache-invalidation";
pub const DEFAULT_MAX_LEN: usize = 1000;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_BATCH_SIZE: usize = 16;

/// Id preceding every entry of a stream.
const STREAM_START: &str = "0-0";
const EVENT_FIELD: &str = "event";
const CLEAR_CACHE: &str = "clear-cache";

#[derive(Debug, Clone, TypedBuilder)]
pub struct RedisStreamConfig {
    /// Key of the stream shared by all instances.
    #[builder(default = DEFAULT_STREAM_KEY.to_string(), setter(into))]
    pub stream_key: String,

    /// Approximate number of entries kept in the stream.
    #[builder(default = DEFAULT_MAX_LEN)]
    pub max_len: usize,

    /// How long a subscriber waits before reading again when the stream
    /// had no new entries.
    #[builder(default = DEFAULT_POLL_INTERVAL)]
    pub poll_interval: Duration,

    #[builder(default = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
}

impl Default for RedisStreamConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Redis Stream implementation of [`InvalidationChannel`].
///
/// Events are appended with `XADD` and survive subscriber restarts up to the
/// configured stream length. Every subscriber reads the whole stream on its
/// own (no consumer groups), so every instance sees every event in order.
/// Subscribers poll with non-blocking `XREAD` calls, which keeps the shared
/// connection free for other commands.
///
/// The connection is re-established after Redis drops it. A subscriber
/// resumes reading after the last entry it delivered, so events appended
/// while it was disconnected are still delivered unless trimmed meanwhile.
#[derive(Clone)]
pub struct RedisStreamChannel {
    conn: ConnectionManager,
    config: RedisStreamConfig,
}

impl std::fmt::Debug for RedisStreamChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStreamChannel")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn map_redis_error(operation: &str, err: redis::RedisError) -> ChannelError {
    let message = format!("{operation}: {err}");
    if err.is_timeout() {
        ChannelError::Timeout(message)
    } else if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() {
        ChannelError::Unavailable(message)
    } else {
        ChannelError::Operation(message)
    }
}

impl RedisStreamChannel {
    /// Creates a channel on an existing connection.
    ///
    /// # Arguments
    ///
    /// * `conn` - A reconnecting Redis connection
    /// * `config` - Stream key, trimming and polling settings
    pub fn new(conn: ConnectionManager, config: RedisStreamConfig) -> Self {
        Self { conn, config }
    }

    /// Connects to the Redis server at `url`.
    pub async fn connect(url: &str, config: RedisStreamConfig) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| ChannelError::Unavailable(format!("invalid Redis URL: {e}")))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| map_redis_error("failed to connect to Redis", e))?;
        Ok(Self::new(conn, config))
    }

    pub fn config(&self) -> &RedisStreamConfig {
        &self.config
    }

    /// Returns the id of the newest entry, or the stream start when empty.
    async fn tail_id(&self) -> Result<String> {
        let mut conn = self.conn.clone();
        let reply: StreamRangeReply = conn
            .xrevrange_count(&self.config.stream_key, "+", "-", 1)
            .await
            .map_err(|e| map_redis_error("failed to read stream tail", e))?;

        Ok(reply
            .ids
            .into_iter()
            .next()
            .map_or_else(|| STREAM_START.to_string(), |entry| entry.id))
    }
}

#[async_trait]
impl InvalidationChannel for RedisStreamChannel {
    async fn publish(&self) -> Result<InvalidationEvent> {
        let mut conn = self.conn.clone();
        let id: String = conn
            .xadd_maxlen(
                &self.config.stream_key,
                StreamMaxlen::Approx(self.config.max_len),
                "*",
                &[(EVENT_FIELD, CLEAR_CACHE)],
            )
            .await
            .map_err(|e| map_redis_error("failed to append invalidation event", e))?;

        trace!(stream = %self.config.stream_key, id = %id, "appended invalidation event");
        Ok(InvalidationEvent { id })
    }

    async fn subscribe(&self) -> Result<Box<dyn Subscription>> {
        let last_id = self.tail_id().await?;
        trace!(stream = %self.config.stream_key, last_id = %last_id, "subscribed to invalidation stream");

        Ok(Box::new(RedisStreamSubscription {
            conn: self.conn.clone(),
            config: self.config.clone(),
            last_id,
            pending: VecDeque::new(),
        }))
    }
}

struct RedisStreamSubscription {
    conn: ConnectionManager,
    config: RedisStreamConfig,
    last_id: String,
    pending: VecDeque<InvalidationEvent>,
}

impl RedisStreamSubscription {
    async fn read_batch(&mut self) -> Result<()> {
        let options = StreamReadOptions::default().count(self.config.batch_size);
        let reply: Option<StreamReadReply> = self
            .conn
            .xread_options(&[&self.config.stream_key], &[&self.last_id], &options)
            .await
            .map_err(|e| map_redis_error("failed to read invalidation stream", e))?;

        let entries = reply
            .into_iter()
            .flat_map(|reply| reply.keys)
            .flat_map(|key| key.ids);

        for entry in entries {
            if !entry.map.contains_key(EVENT_FIELD) {
                warn!(id = %entry.id, "invalidation stream entry without event field");
            }
            self.last_id.clone_from(&entry.id);
            self.pending.push_back(InvalidationEvent { id: entry.id });
        }
        Ok(())
    }
}

#[async_trait]
impl Subscription for RedisStreamSubscription {
    async fn next(&mut self) -> Result<InvalidationEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(event);
            }

            self.read_batch().await?;

            if self.pending.is_empty() {
                tokio::time::sleep(self.config.poll_interval).await;
            }
        }
    }
}
