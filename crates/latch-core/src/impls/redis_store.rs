//! Redis-backed lease, checkpoint, queue and denylist stores (feature `redis`).
//!
//! Key layout:
//! - `latch:lock:{name}`                      lock record (exists once created)
//! - `latch:lease:{name}`                     current lease token, `PX` expiry
//! - `latch:checkpoint:{task}:{partition}`    JSON `CheckpointRecord`
//! - `latch:queues`                           set of created queue names
//! - `latch:queue:{name}`                     list of payloads
//! - `latch:denylist`                         hash of lowercase domain to JSON entry
//!
//! Checkpoint segments escape `%` and `:` so distinct keys never share a
//! Redis key.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::Script;
use redis::aio::ConnectionManager;
use tracing::info;

use crate::domain::{
    AcquireOutcome, CheckpointKey, CheckpointRecord, CreateOutcome, LeaseToken, ReleaseOutcome, StoreError,
};
use crate::ports::{
    CheckpointBackend, DenylistEntry, DenylistRepository, IdGenerator, LeaseStore, MessageQueue, SystemClock,
    UlidGenerator,
};

const QUEUE_REGISTRY: &str = "latch:queues";
const DENYLIST: &str = "latch:denylist";

/// Compare-and-delete: only the current holder may drop the lease.
const RELEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
else
    return 0
end
"#;

#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
    ids: UlidGenerator<SystemClock>,
}

impl fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisBackend")
            .field("connection", &"ConnectionManager")
            .finish()
    }
}

fn backend_error(err: redis::RedisError) -> StoreError {
    StoreError::Unavailable(format!("redis: {err}"))
}

fn lock_key(name: &str) -> String {
    format!("latch:lock:{name}")
}

fn lease_key(name: &str) -> String {
    format!("latch:lease:{name}")
}

fn key_segment(raw: &str) -> String {
    raw.replace('%', "%25").replace(':', "%3A")
}

fn checkpoint_key(key: &CheckpointKey) -> String {
    format!(
        "latch:checkpoint:{}:{}",
        key_segment(key.task_name()),
        key_segment(key.partition_key())
    )
}

fn queue_key(queue: &str) -> String {
    format!("latch:queue:{queue}")
}

impl RedisBackend {
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        info!(target: "latch::redis", "connecting to redis");
        let client = redis::Client::open(redis_url).map_err(backend_error)?;
        let conn = ConnectionManager::new(client).await.map_err(backend_error)?;
        Ok(Self {
            conn,
            ids: UlidGenerator::new(SystemClock),
        })
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<CreateOutcome, StoreError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(backend_error)?;
        Ok(match reply {
            Some(_) => CreateOutcome::Created,
            None => CreateOutcome::AlreadyExists,
        })
    }

    async fn queue_registered(&self, queue: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("SISMEMBER")
            .arg(QUEUE_REGISTRY)
            .arg(queue)
            .query_async::<bool>(&mut conn)
            .await
            .map_err(backend_error)
    }

    async fn require_queue(&self, queue: &str) -> Result<(), StoreError> {
        if self.queue_registered(queue).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("queue {queue}")))
        }
    }
}

#[async_trait]
impl LeaseStore for RedisBackend {
    async fn create_if_absent(&self, key: &str) -> Result<CreateOutcome, StoreError> {
        self.set_if_absent(&lock_key(key), "").await
    }

    async fn acquire_lease(&self, key: &str, duration: Duration) -> Result<AcquireOutcome, StoreError> {
        let mut conn = self.conn.clone();
        let exists: bool = redis::cmd("EXISTS")
            .arg(lock_key(key))
            .query_async(&mut conn)
            .await
            .map_err(backend_error)?;
        if !exists {
            return Err(StoreError::NotFound(format!("lease record {key}")));
        }

        let token = LeaseToken::new(self.ids.generate_lease_id().to_string());
        let ttl_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX).max(1);
        let reply: Option<String> = redis::cmd("SET")
            .arg(lease_key(key))
            .arg(token.expose())
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(backend_error)?;

        Ok(match reply {
            Some(_) => AcquireOutcome::Acquired(token),
            None => AcquireOutcome::Conflict,
        })
    }

    async fn release_lease(&self, key: &str, token: &LeaseToken) -> Result<ReleaseOutcome, StoreError> {
        let mut conn = self.conn.clone();
        let deleted: i64 = Script::new(RELEASE_SCRIPT)
            .key(lease_key(key))
            .arg(token.expose())
            .invoke_async(&mut conn)
            .await
            .map_err(backend_error)?;
        Ok(if deleted == 1 {
            ReleaseOutcome::Released
        } else {
            ReleaseOutcome::Conflict
        })
    }
}

#[async_trait]
impl CheckpointBackend for RedisBackend {
    async fn get(&self, key: &CheckpointKey) -> Result<Option<CheckpointRecord>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(checkpoint_key(key))
            .query_async(&mut conn)
            .await
            .map_err(backend_error)?;
        raw.map(|json| serde_json::from_str(&json).map_err(|e| StoreError::Corrupt(format!("checkpoint {key}: {e}"))))
            .transpose()
    }

    async fn put(&self, key: &CheckpointKey, record: CheckpointRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(&record).map_err(|e| StoreError::Other(e.to_string()))?;
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(checkpoint_key(key))
            .arg(json)
            .query_async::<()>(&mut conn)
            .await
            .map_err(backend_error)
    }

    async fn create_if_absent(
        &self,
        key: &CheckpointKey,
        record: CheckpointRecord,
    ) -> Result<CreateOutcome, StoreError> {
        let json = serde_json::to_string(&record).map_err(|e| StoreError::Other(e.to_string()))?;
        self.set_if_absent(&checkpoint_key(key), &json).await
    }
}

#[async_trait]
impl MessageQueue for RedisBackend {
    async fn ensure_exists(&self, queue: &str) -> Result<CreateOutcome, StoreError> {
        let mut conn = self.conn.clone();
        let added: i64 = redis::cmd("SADD")
            .arg(QUEUE_REGISTRY)
            .arg(queue)
            .query_async(&mut conn)
            .await
            .map_err(backend_error)?;
        Ok(if added == 1 {
            CreateOutcome::Created
        } else {
            CreateOutcome::AlreadyExists
        })
    }

    async fn send(&self, queue: &str, payload: String) -> Result<(), StoreError> {
        self.require_queue(queue).await?;
        let mut conn = self.conn.clone();
        redis::cmd("RPUSH")
            .arg(queue_key(queue))
            .arg(payload)
            .query_async::<()>(&mut conn)
            .await
            .map_err(backend_error)
    }

    async fn approximate_count(&self, queue: &str) -> Result<u64, StoreError> {
        self.require_queue(queue).await?;
        let mut conn = self.conn.clone();
        redis::cmd("LLEN")
            .arg(queue_key(queue))
            .query_async::<u64>(&mut conn)
            .await
            .map_err(backend_error)
    }

    async fn peek(&self, queue: &str) -> Result<Option<String>, StoreError> {
        self.require_queue(queue).await?;
        let mut conn = self.conn.clone();
        redis::cmd("LINDEX")
            .arg(queue_key(queue))
            .arg(0)
            .query_async::<Option<String>>(&mut conn)
            .await
            .map_err(backend_error)
    }
}

#[async_trait]
impl DenylistRepository for RedisBackend {
    async fn contains(&self, domain: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("HEXISTS")
            .arg(DENYLIST)
            .arg(domain.to_lowercase())
            .query_async::<bool>(&mut conn)
            .await
            .map_err(backend_error)
    }

    async fn insert(&self, entry: DenylistEntry) -> Result<(), StoreError> {
        let json = serde_json::json!({
            "source": entry.source,
            "addedAt": entry.added_at,
        })
        .to_string();
        let mut conn = self.conn.clone();
        redis::cmd("HSET")
            .arg(DENYLIST)
            .arg(entry.domain.to_lowercase())
            .arg(json)
            .query_async::<()>(&mut conn)
            .await
            .map_err(backend_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced() {
        assert_eq!(lock_key("import"), "latch:lock:import");
        assert_eq!(lease_key("import"), "latch:lease:import");
        assert_eq!(
            checkpoint_key(&CheckpointKey::new("import", "p1")),
            "latch:checkpoint:import:p1"
        );
        assert_eq!(queue_key("suspects"), "latch:queue:suspects");
    }

    #[test]
    fn separators_inside_checkpoint_segments_cannot_collide() {
        let left = checkpoint_key(&CheckpointKey::new("a:b", "c"));
        let right = checkpoint_key(&CheckpointKey::new("a", "b:c"));
        assert_ne!(left, right);
        assert_eq!(left, "latch:checkpoint:a%3Ab:c");
        assert_ne!(
            checkpoint_key(&CheckpointKey::new("a%3Ab", "c")),
            checkpoint_key(&CheckpointKey::new("a:b", "c"))
        );
    }

    async fn live_backend() -> RedisBackend {
        let url = std::env::var("LATCH_TEST_REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        RedisBackend::connect(&url).await.unwrap()
    }

    /// Fresh per-test name so runs against a shared server stay apart.
    fn unique(prefix: &str) -> String {
        format!("{prefix}-{}", ulid::Ulid::new())
    }

    #[tokio::test]
    #[ignore = "requires a running redis; set LATCH_TEST_REDIS_URL and run with --ignored"]
    async fn lease_acquire_conflict_and_release() {
        let redis = live_backend().await;
        let name = unique("lock");

        let err = redis.acquire_lease(&name, Duration::from_secs(30)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        assert_eq!(LeaseStore::create_if_absent(&redis, &name).await.unwrap(), CreateOutcome::Created);
        assert_eq!(
            LeaseStore::create_if_absent(&redis, &name).await.unwrap(),
            CreateOutcome::AlreadyExists
        );

        let AcquireOutcome::Acquired(token) = redis.acquire_lease(&name, Duration::from_secs(30)).await.unwrap()
        else {
            panic!("expected a lease");
        };
        assert_eq!(
            redis.acquire_lease(&name, Duration::from_secs(30)).await.unwrap(),
            AcquireOutcome::Conflict
        );

        let stranger = LeaseToken::new("not-the-holder");
        assert_eq!(redis.release_lease(&name, &stranger).await.unwrap(), ReleaseOutcome::Conflict);
        assert_eq!(redis.release_lease(&name, &token).await.unwrap(), ReleaseOutcome::Released);
        assert_eq!(redis.release_lease(&name, &token).await.unwrap(), ReleaseOutcome::Conflict);
        assert!(redis.acquire_lease(&name, Duration::from_secs(30)).await.unwrap().is_acquired());
    }

    #[tokio::test]
    #[ignore = "requires a running redis; set LATCH_TEST_REDIS_URL and run with --ignored"]
    async fn expired_lease_cannot_release_its_successor() {
        let redis = live_backend().await;
        let name = unique("lock");
        LeaseStore::create_if_absent(&redis, &name).await.unwrap();

        let AcquireOutcome::Acquired(lapsed) = redis.acquire_lease(&name, Duration::from_millis(100)).await.unwrap()
        else {
            panic!("expected a lease");
        };
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert!(redis.acquire_lease(&name, Duration::from_secs(30)).await.unwrap().is_acquired());
        assert_eq!(redis.release_lease(&name, &lapsed).await.unwrap(), ReleaseOutcome::Conflict);
        assert_eq!(
            redis.acquire_lease(&name, Duration::from_secs(30)).await.unwrap(),
            AcquireOutcome::Conflict
        );
    }

    #[tokio::test]
    #[ignore = "requires a running redis; set LATCH_TEST_REDIS_URL and run with --ignored"]
    async fn checkpoint_create_keeps_the_first_value() {
        let redis = live_backend().await;
        let key = CheckpointKey::new(unique("task"), "profile:a");
        let first = CheckpointRecord::new(
            chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        );
        let second = CheckpointRecord::new(
            chrono::DateTime::from_timestamp(1_800_000_000, 0).unwrap(),
            chrono::DateTime::from_timestamp(1_800_000_000, 0).unwrap(),
        );

        assert_eq!(redis.get(&key).await.unwrap(), None);
        assert_eq!(
            CheckpointBackend::create_if_absent(&redis, &key, first.clone()).await.unwrap(),
            CreateOutcome::Created
        );
        assert_eq!(
            CheckpointBackend::create_if_absent(&redis, &key, second.clone()).await.unwrap(),
            CreateOutcome::AlreadyExists
        );
        assert_eq!(redis.get(&key).await.unwrap(), Some(first));

        redis.put(&key, second.clone()).await.unwrap();
        assert_eq!(redis.get(&key).await.unwrap(), Some(second));
    }
}
