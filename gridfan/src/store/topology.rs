//! Connection topologies.
//!
//! The client either talks to one fixed endpoint, or discovers the current
//! primary of a replicated deployment through a sentinel directory and
//! reconnects to whichever node wins the next election.

use super::conn::Connection;
use super::error::StoreError;
use super::resp::Frame;
use tracing::{debug, warn};

/// Where the client connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTopology {
    /// One fixed `host:port` endpoint.
    Single { addr: String },

    /// High-availability deployment: ask the sentinel directory which node
    /// is currently primary for `service_name`, and connect there.
    Sentinel {
        sentinels: Vec<String>,
        service_name: String,
    },
}

impl StoreTopology {
    /// Convenience constructor for the single-endpoint topology.
    pub fn single(addr: impl Into<String>) -> Self {
        StoreTopology::Single { addr: addr.into() }
    }

    /// Convenience constructor for the sentinel topology.
    pub fn sentinel(sentinels: Vec<String>, service_name: impl Into<String>) -> Self {
        StoreTopology::Sentinel {
            sentinels,
            service_name: service_name.into(),
        }
    }

    /// Resolves the address to connect to right now.
    ///
    /// For the sentinel topology each directory node is asked in turn; the
    /// first that names a primary wins. A full pass with no answer is a
    /// [`StoreError::Discovery`] failure, which the client's bounded-retry
    /// loop treats exactly like a connection failure.
    pub(crate) async fn primary_addr(&self) -> Result<String, StoreError> {
        match self {
            StoreTopology::Single { addr } => Ok(addr.clone()),
            StoreTopology::Sentinel {
                sentinels,
                service_name,
            } => {
                for sentinel in sentinels {
                    match ask_sentinel(sentinel, service_name).await {
                        Ok(Some(addr)) => {
                            debug!(%sentinel, primary = %addr, "sentinel named the primary");
                            return Ok(addr);
                        }
                        Ok(None) => {
                            debug!(%sentinel, service = %service_name, "sentinel does not know the service");
                        }
                        Err(error) => {
                            warn!(%sentinel, %error, "sentinel unreachable");
                        }
                    }
                }
                Err(StoreError::Discovery {
                    service: service_name.clone(),
                })
            }
        }
    }
}

impl From<&crate::config::StoreSettings> for StoreTopology {
    fn from(settings: &crate::config::StoreSettings) -> Self {
        match settings.topology {
            crate::config::StoreTopologyKind::Single => {
                StoreTopology::single(settings.endpoint.clone())
            }
            crate::config::StoreTopologyKind::Sentinel => StoreTopology::sentinel(
                settings.sentinels.clone(),
                settings.service_name.clone(),
            ),
        }
    }
}

/// Asks one sentinel for the primary of `service`.
async fn ask_sentinel(addr: &str, service: &str) -> Result<Option<String>, StoreError> {
    let mut conn = Connection::open(addr).await?;
    let reply = conn
        .request(&[b"SENTINEL", b"get-master-addr-by-name", service.as_bytes()])
        .await?;
    match reply {
        Frame::Array(Some(parts)) if parts.len() == 2 => {
            let mut parts = parts.into_iter();
            let host = take_text(parts.next())?;
            let port = take_text(parts.next())?;
            Ok(Some(format!("{host}:{port}")))
        }
        frame if frame.is_nil() => Ok(None),
        other => Err(StoreError::Protocol(format!(
            "unexpected discovery reply: {other:?}"
        ))),
    }
}

fn take_text(frame: Option<Frame>) -> Result<String, StoreError> {
    frame
        .ok_or_else(|| StoreError::Protocol("discovery reply truncated".to_string()))?
        .into_text()?
        .ok_or_else(|| StoreError::Protocol("discovery reply held a nil part".to_string()))
}
