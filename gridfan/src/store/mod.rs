//! Resilient store client.
//!
//! A reconnecting client for the external key/value + publish/subscribe
//! store the scheduler uses for out-of-band result correlation and for the
//! admission-control semaphore that throttles remote submissions.
//!
//! # Architecture
//!
//! The store speaks the RESP wire protocol over TCP; this module implements
//! only the client side, in four layers:
//!
//! 1. [`resp`] - frame encoding and incremental decoding
//! 2. `conn` - one TCP connection, request/reply
//! 3. [`StoreTopology`] - endpoint selection: a fixed endpoint, or
//!    discovery of the current primary through a sentinel directory
//! 4. [`StoreClient`] - the retry-wrapped operations the rest of the crate
//!    calls; lazy connect on first use, idempotent reconnect on failure
//!
//! Every operation is wrapped in a bounded-retry policy ([`RetryPolicy`]):
//! connection-level failures sleep a fixed pause and retry up to a hard
//! attempt ceiling, after which the typed
//! [`StoreError::Connection`] surfaces to the caller. Callers treat that as
//! fatal for the one operation, never for the whole batch.
//!
//! [`SlotSemaphore`] builds the admission throttle on the store's list
//! operations: a list primed with N tokens, popped to acquire and pushed to
//! release.

mod client;
mod conn;
mod error;
pub mod resp;
mod retry;
mod semaphore;
mod topology;

pub use client::StoreClient;
pub use error::StoreError;
pub use retry::{RetryPolicy, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_PAUSE};
pub use semaphore::SlotSemaphore;
pub use topology::StoreTopology;
