//! Process-local rule cache and cross-instance cache invalidation.

pub mod cache;
pub mod error;
pub mod invalidation;
pub mod rule_set;

pub use cache::{CacheStatus, RuleCache};
pub use error::{ChannelError, Result};
pub use invalidation::{
    CacheInvalidator, InMemoryChannel, InvalidationChannel, InvalidationEvent,
    InvalidationListener, RedisStreamChannel, RedisStreamConfig, Subscription,
};
pub use rule_set::RuleSet;
