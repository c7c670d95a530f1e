//! The retry-wrapped store client.

use super::conn::Connection;
use super::error::StoreError;
use super::resp::Frame;
use super::retry::RetryPolicy;
use super::topology::StoreTopology;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Server-side wait used for each blocking pop, so `acquire_slot` releases
/// the shared connection between waits instead of pinning it.
const SLOT_WAIT_SECS: u64 = 1;

/// Reconnecting client for the key/value + publish/subscribe store.
///
/// The connection is process-wide state: share one client behind an `Arc`.
/// Connecting is lazy (first operation) and reconnecting is idempotent; on
/// any connection-level failure the broken connection is dropped, the
/// topology re-resolved, and the operation retried under the bounded
/// [`RetryPolicy`]. Exhausting the budget surfaces
/// [`StoreError::Connection`], which callers treat as fatal for that one
/// operation only.
pub struct StoreClient {
    topology: StoreTopology,
    retry: RetryPolicy,
    conn: Mutex<Option<Connection>>,
}

impl StoreClient {
    /// Creates a client; no I/O happens until the first operation.
    pub fn new(topology: StoreTopology, retry: RetryPolicy) -> Self {
        Self {
            topology,
            retry,
            conn: Mutex::new(None),
        }
    }

    /// Single-endpoint client with the default retry policy.
    pub fn single(addr: impl Into<String>) -> Self {
        Self::new(StoreTopology::single(addr), RetryPolicy::default())
    }

    /// Health probe, used at startup to fail fast when no store is
    /// reachable at all (a configuration-level error for the caller).
    pub async fn ping(&self) -> Result<(), StoreError> {
        match self.request(&[b"PING"]).await? {
            Frame::Simple(s) if s == "PONG" => Ok(()),
            other => Err(StoreError::Protocol(format!(
                "unexpected PING reply: {other:?}"
            ))),
        }
    }

    /// Reads a key. `None` when the key is absent.
    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.request(&[b"GET", key.as_bytes()]).await?.into_text()
    }

    /// Writes a key.
    pub async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        match self
            .request(&[b"SET", key.as_bytes(), value.as_bytes()])
            .await?
        {
            Frame::Simple(_) => Ok(()),
            other => Err(StoreError::Protocol(format!(
                "unexpected SET reply: {other:?}"
            ))),
        }
    }

    /// Deletes a key. Deleting an absent key is not an error.
    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.expect_integer(&[b"DEL", key.as_bytes()], "DEL")
            .await
            .map(|_| ())
    }

    /// Publishes a value on a channel, returning the subscriber count.
    pub async fn publish(&self, channel: &str, value: &str) -> Result<i64, StoreError> {
        let receivers = self
            .expect_integer(&[b"PUBLISH", channel.as_bytes(), value.as_bytes()], "PUBLISH")
            .await?;
        debug!(%channel, receivers, "published");
        Ok(receivers)
    }

    /// Pushes a value onto the head of a list.
    pub async fn lpush(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.expect_integer(&[b"LPUSH", key.as_bytes(), value.as_bytes()], "LPUSH")
            .await
            .map(|_| ())
    }

    /// Pops from the tail of a list without blocking.
    pub async fn rpop(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.request(&[b"RPOP", key.as_bytes()]).await?.into_text()
    }

    /// Blocking pop from the head of a list, waiting up to `timeout_secs`
    /// server-side. `None` when the wait timed out.
    pub async fn blpop(&self, key: &str, timeout_secs: u64) -> Result<Option<String>, StoreError> {
        let reply = self
            .request(&[
                b"BLPOP",
                key.as_bytes(),
                timeout_secs.to_string().as_bytes(),
            ])
            .await?;
        match reply {
            Frame::Array(Some(mut parts)) if parts.len() == 2 => {
                parts.remove(0);
                match parts.remove(0).into_text()? {
                    Some(value) => Ok(Some(value)),
                    None => Err(StoreError::Protocol("BLPOP returned a nil value".to_string())),
                }
            }
            frame if frame.is_nil() => Ok(None),
            other => Err(StoreError::Protocol(format!(
                "unexpected BLPOP reply: {other:?}"
            ))),
        }
    }

    /// Blocks until a slot token can be popped from the named semaphore
    /// list. The wait is a loop of short server-side blocking pops so other
    /// users of this client are not starved of the connection.
    pub async fn acquire_slot(&self, semaphore: &str) -> Result<(), StoreError> {
        loop {
            if self.blpop(semaphore, SLOT_WAIT_SECS).await?.is_some() {
                return Ok(());
            }
        }
    }

    /// Returns a slot token to the named semaphore list.
    pub async fn release_slot(&self, semaphore: &str) -> Result<(), StoreError> {
        self.lpush(semaphore, "1").await
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    async fn expect_integer(&self, args: &[&[u8]], verb: &str) -> Result<i64, StoreError> {
        match self.request(args).await? {
            Frame::Integer(n) => Ok(n),
            other => Err(StoreError::Protocol(format!(
                "unexpected {verb} reply: {other:?}"
            ))),
        }
    }

    /// Runs one command under the bounded-retry policy.
    async fn request(&self, args: &[&[u8]]) -> Result<Frame, StoreError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.try_request(args).await {
                Ok(frame) => return Ok(frame),
                Err(error) if error.is_connection_level() => {
                    if attempt >= self.retry.attempts {
                        warn!(attempts = attempt, %error, "store retry budget exhausted");
                        return Err(StoreError::Connection { attempts: attempt });
                    }
                    warn!(
                        attempt,
                        limit = self.retry.attempts,
                        %error,
                        "store operation failed, retrying"
                    );
                    tokio::time::sleep(self.retry.pause).await;
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// One attempt: connect if needed, send, read. A connection-level
    /// failure drops the connection so the next attempt reconnects, which
    /// re-runs primary discovery after a failover.
    async fn try_request(&self, args: &[&[u8]]) -> Result<Frame, StoreError> {
        let mut slot = self.conn.lock().await;
        let conn = match slot.as_mut() {
            Some(conn) => conn,
            None => {
                let addr = self.topology.primary_addr().await?;
                debug!(%addr, "connecting to store");
                slot.insert(Connection::open(&addr).await?)
            }
        };
        match conn.request(args).await {
            Ok(frame) => Ok(frame),
            Err(error) => {
                if error.is_connection_level() {
                    *slot = None;
                }
                Err(error)
            }
        }
    }
}

impl std::fmt::Debug for StoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreClient")
            .field("topology", &self.topology)
            .field("retry", &self.retry)
            .finish()
    }
}
