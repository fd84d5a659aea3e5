//! Redis hot tier
//!
//! Points live in one hash per `(slot, name)`:
//!
//! ```text
//! {slot}:{name}   → HASH { "<unix ts>" → "<float>" }
//! ```
//!
//! # Features
//!
//! - One multiplexed connection per server, bounded by a semaphore
//! - Command timeouts with retry and exponential backoff
//! - Client-side sharding over several servers
//! - Pipelined multi-key reads
//! - Credentials stripped from every logged URL
//!
//! # Example
//!
//! ```rust,no_run
//! use kuba_graphite::engine::traits::HashStore;
//! use kuba_graphite::redis::{RedisConfig, RedisHashStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RedisHashStore::connect(vec![RedisConfig::default()]).await?;
//! store.ping().await?;
//! assert_eq!(store.backend_id(), "redis-hash-v1");
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod hash_store;
pub mod util;

pub use connection::{RedisConfig, RedisPool};
pub use hash_store::RedisHashStore;
