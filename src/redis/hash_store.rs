//! Redis implementation of [`HashStore`]
//!
//! Keys are spread over one pool per configured address with a stable
//! FNV-1a hash, so a given key always lands on the same server. Batched
//! reads are grouped per shard and sent as one pipeline each.

use super::connection::{RedisConfig, RedisPool};
use super::util::shard_hash;
use crate::engine::traits::HashStore;
use crate::error::StorageError;
use async_trait::async_trait;
use futures::future::try_join_all;
use redis::AsyncCommands;
use std::collections::HashMap;
use tracing::debug;

/// Hot tier over one or more Redis servers
pub struct RedisHashStore {
    shards: Vec<RedisPool>,
}

impl RedisHashStore {
    /// Connect to every server in `configs`
    pub async fn connect(configs: Vec<RedisConfig>) -> Result<Self, StorageError> {
        if configs.is_empty() {
            return Err(StorageError::backend("no hot store address configured"));
        }
        let shards = try_join_all(configs.into_iter().map(RedisPool::new)).await?;
        debug!(shards = shards.len(), "Redis hash store ready");
        Ok(Self { shards })
    }

    /// Build from already-connected pools
    pub fn from_pools(shards: Vec<RedisPool>) -> Result<Self, StorageError> {
        if shards.is_empty() {
            return Err(StorageError::backend("no hot store address configured"));
        }
        Ok(Self { shards })
    }

    /// Number of servers in the ring
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard_index(&self, key: &str) -> usize {
        shard_for(key, self.shards.len())
    }

    fn shard(&self, key: &str) -> &RedisPool {
        &self.shards[self.shard_index(key)]
    }
}

/// Ring position of `key` among `shards` servers
pub(crate) fn shard_for(key: &str, shards: usize) -> usize {
    if shards <= 1 {
        return 0;
    }
    (shard_hash(key) % shards as u64) as usize
}

/// Group key positions by shard, preserving key order inside each group
fn group_by_shard(keys: &[String], shards: usize) -> Vec<Vec<usize>> {
    let mut groups = vec![Vec::new(); shards.max(1)];
    for (position, key) in keys.iter().enumerate() {
        groups[shard_for(key, shards)].push(position);
    }
    groups
}

#[async_trait]
impl HashStore for RedisHashStore {
    fn backend_id(&self) -> &str {
        "redis-hash-v1"
    }

    async fn ping(&self) -> Result<(), StorageError> {
        try_join_all(self.shards.iter().map(|pool| pool.ping())).await?;
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StorageError> {
        self.shard(key)
            .execute(|mut conn| {
                let key = key.to_string();
                async move { conn.hgetall::<_, HashMap<String, String>>(key).await }
            })
            .await
    }

    async fn hgetall_batch(
        &self,
        keys: &[String],
    ) -> Result<Vec<HashMap<String, String>>, StorageError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let groups = group_by_shard(keys, self.shards.len());
        let requests = groups
            .iter()
            .enumerate()
            .filter(|(_, positions)| !positions.is_empty())
            .map(|(shard, positions)| {
                let shard_keys: Vec<String> = positions.iter().map(|&p| keys[p].clone()).collect();
                async move {
                    let hashes = self.shards[shard]
                        .execute(|mut conn| {
                            let mut pipe = redis::pipe();
                            for key in &shard_keys {
                                pipe.hgetall(key);
                            }
                            async move {
                                pipe.query_async::<Vec<HashMap<String, String>>>(&mut conn)
                                    .await
                            }
                        })
                        .await?;
                    Ok::<_, StorageError>((positions, hashes))
                }
            });

        let mut out = vec![HashMap::new(); keys.len()];
        for (positions, hashes) in try_join_all(requests).await? {
            if hashes.len() != positions.len() {
                return Err(StorageError::decode(format!(
                    "pipeline returned {} replies for {} keys",
                    hashes.len(),
                    positions.len()
                )));
            }
            for (&position, hash) in positions.iter().zip(hashes) {
                out[position] = hash;
            }
        }
        Ok(out)
    }

    async fn hlen(&self, key: &str) -> Result<usize, StorageError> {
        self.shard(key)
            .execute(|mut conn| {
                let key = key.to_string();
                async move { conn.hlen::<_, usize>(key).await }
            })
            .await
    }

    async fn hset_multiple(
        &self,
        key: &str,
        fields: &[(String, String)],
    ) -> Result<(), StorageError> {
        if fields.is_empty() {
            return Ok(());
        }
        self.shard(key)
            .execute(|mut conn| {
                let key = key.to_string();
                let fields = fields.to_vec();
                async move { conn.hset_multiple::<_, _, _, ()>(key, &fields).await }
            })
            .await
    }

    async fn del(&self, key: &str) -> Result<(), StorageError> {
        self.shard(key)
            .execute(|mut conn| {
                let key = key.to_string();
                async move { conn.del::<_, ()>(key).await }
            })
            .await
    }
}
