//! Per-epoch distributed mutex
//!
//! Atomic set-if-absent with expiry on the lock service. The lock value is
//! an opaque token: holder identity is not verified because the completion
//! marker provides the authoritative idempotence. Any lock-service failure
//! makes `acquire` report false, so a degraded Redis never lets two workers
//! into the same epoch.

use std::time::Duration;

use redis::aio::ConnectionManager;
use tracing::{debug, info, warn};

/// Opaque lock value
const LOCK_TOKEN: &str = "processing";

/// Lock service error (connection establishment only; runtime failures
/// degrade to "not acquired")
#[derive(Debug)]
pub struct LockError(pub String);

impl std::fmt::Display for LockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Lock service error: {}", self.0)
    }
}

impl std::error::Error for LockError {}

/// Distributed per-epoch lock client
#[derive(Clone)]
pub struct EpochLockService {
    manager: ConnectionManager,
    namespace: String,
}

impl EpochLockService {
    /// Connect to the lock service and verify it answers.
    pub async fn connect(redis_url: &str, namespace: &str) -> Result<Self, LockError> {
        info!(namespace = %namespace, "Initializing EpochLockService");

        let client = redis::Client::open(redis_url)
            .map_err(|e| LockError(format!("Invalid Redis URL: {}", e)))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| LockError(format!("Connection failed: {}", e)))?;

        Ok(Self {
            manager,
            namespace: namespace.to_string(),
        })
    }

    fn key(&self, epoch: u64) -> String {
        format!("lock:{}:epoch:{}", self.namespace, epoch)
    }

    /// Try to take exclusive ownership of an epoch.
    ///
    /// Returns true iff the caller now owns the lock. Fails closed: an
    /// unreachable lock service reads as "not acquired".
    pub async fn acquire(&self, epoch: u64, ttl: Duration) -> bool {
        let key = self.key(epoch);
        let mut conn = self.manager.clone();

        let result: Result<Option<String>, redis::RedisError> = redis::cmd("SET")
            .arg(&key)
            .arg(LOCK_TOKEN)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await;

        match result {
            Ok(Some(_)) => {
                debug!(epoch = epoch, key = %key, "Lock acquired");
                true
            }
            Ok(None) => {
                debug!(epoch = epoch, key = %key, "Lock held elsewhere");
                false
            }
            Err(e) => {
                warn!(epoch = epoch, error = %e, "Lock service unreachable, failing closed");
                false
            }
        }
    }

    /// Unconditionally drop the epoch's lock key.
    pub async fn release(&self, epoch: u64) {
        let key = self.key(epoch);
        let mut conn = self.manager.clone();

        let result: Result<(), redis::RedisError> =
            redis::cmd("DEL").arg(&key).query_async(&mut conn).await;

        if let Err(e) = result {
            // TTL expiry cleans the key up eventually
            warn!(epoch = epoch, error = %e, "Failed to release lock");
        }
    }

    /// Reset the lock expiry for a long-running pipeline.
    pub async fn extend(&self, epoch: u64, ttl: Duration) -> bool {
        let key = self.key(epoch);
        let mut conn = self.manager.clone();

        let result: Result<i64, redis::RedisError> = redis::cmd("EXPIRE")
            .arg(&key)
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await;

        match result {
            Ok(1) => true,
            Ok(_) => {
                warn!(epoch = epoch, "Lock expired before extension");
                false
            }
            Err(e) => {
                warn!(epoch = epoch, error = %e, "Failed to extend lock");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_key_format() {
        // Key derivation without a live connection
        let namespace = "prediction";
        let epoch = 426_236u64;
        let key = format!("lock:{}:epoch:{}", namespace, epoch);
        assert_eq!(key, "lock:prediction:epoch:426236");
    }
}
