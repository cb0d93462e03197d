//! Per-account mutual exclusion over a fixed pool of shards.
//!
//! An account identifier is hashed onto one of N shard mutexes. Memory use is
//! bounded by N no matter how many accounts are seen. Two accounts that land
//! on the same shard serialize each other even though they are unrelated;
//! that false serialization is the price of the constant-size pool.
//!
//! Locking hands back a guard; dropping it releases the shard, so every exit
//! path (including `?` and panics) unlocks.

use tokio::sync::{Mutex, MutexGuard};

/// Default number of shards.
pub const DEFAULT_SHARDS: usize = 16;

const FNV_OFFSET: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// Fixed-size pool of binary locks indexed by account identifier.
#[derive(Debug)]
pub struct ShardedLock {
    shards: Box<[Mutex<()>]>,
}

/// Holds one shard until dropped.
#[derive(Debug)]
pub struct ShardGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl ShardedLock {
    /// Create a pool with `size` shards (at least one).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            shards: (0..size).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Wait until `key`'s shard is free and take it.
    pub async fn lock(&self, key: &str) -> ShardGuard<'_> {
        let shard = self.shard_for(key);
        let guard = self.shards[shard].lock().await;
        tracing::trace!(key = key, shard = shard, "Account shard locked");
        ShardGuard { _guard: guard }
    }

    /// Take `key`'s shard only if nobody holds it.
    pub fn try_lock(&self, key: &str) -> Option<ShardGuard<'_>> {
        self.shards[self.shard_for(key)]
            .try_lock()
            .ok()
            .map(|guard| ShardGuard { _guard: guard })
    }

    /// Shard index for `key`.
    pub fn shard_for(&self, key: &str) -> usize {
        (index_for(key) as usize) % self.shards.len()
    }
}

impl Default for ShardedLock {
    fn default() -> Self {
        Self::new(DEFAULT_SHARDS)
    }
}

/// 32-bit FNV hash of `key`: multiply by the prime, then xor each byte.
pub fn index_for(key: &str) -> u32 {
    key.bytes().fold(FNV_OFFSET, |hash, byte| {
        hash.wrapping_mul(FNV_PRIME) ^ u32::from(byte)
    })
}
