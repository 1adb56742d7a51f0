//! Transport sinks: push one already-serialized payload to its destination.
//!
//! Delivery is at-most-once and best effort. Nothing is retried or buffered, a failed send is
//! reported to the caller and the message is gone.
use std::{fmt, future::Future, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{config::SimConfig, protocol::EmittedMessage, Error, TGResult};

pub mod pubsub;
pub mod udp;

pub use pubsub::PubSubSink;
pub use udp::UdpSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Multicast,
    Broadcast,
    #[serde(rename = "zmq", alias = "pubsub")]
    PubSub,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Multicast => "multicast",
            TransportKind::Broadcast => "broadcast",
            TransportKind::PubSub => "zmq",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multicast" => Ok(TransportKind::Multicast),
            "broadcast" => Ok(TransportKind::Broadcast),
            "zmq" | "pubsub" => Ok(TransportKind::PubSub),
            _ => Err(Error::Config(format!("unknown transport {s:?}"))),
        }
    }
}

/// Where one channel's messages go. Fixed once the send loop starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportTarget {
    pub kind: TransportKind,
    pub host: String,
    pub port: u16,
    /// Multicast TTL; ignored by the other kinds.
    pub ttl: u32,
    /// Pub/sub topic prefix; ignored by UDP.
    pub topic: Option<String>,
}

impl TransportTarget {
    pub fn from_config(config: &SimConfig, port: u16) -> Self {
        Self {
            kind: config.transport,
            host: config.host.clone(),
            port,
            ttl: config.ttl,
            topic: config.topic.clone(),
        }
    }

    pub(crate) fn setup_error(&self, reason: impl fmt::Display) -> Error {
        Error::TransportSetup {
            target: self.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for TransportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TransportKind::PubSub => write!(f, "zmq tcp://{}:{}", self.host, self.port),
            kind => write!(f, "{kind} {}:{}", self.host, self.port),
        }
    }
}

/// Something a scheduler loop can hand payloads to.
pub trait TransportSink: Send + Sized {
    fn send(&mut self, msg: &EmittedMessage) -> impl Future<Output = TGResult<()>> + Send;

    /// Release the socket. Consumes the sink so nothing can be sent afterwards.
    fn close(self) -> impl Future<Output = ()> + Send;
}

/// Sink for any configured transport kind.
pub enum Sink {
    Udp(UdpSink),
    PubSub(PubSubSink),
}

impl Sink {
    /// Create and configure the socket. Failure here is fatal for the run.
    pub async fn open(target: &TransportTarget) -> TGResult<Self> {
        match target.kind {
            TransportKind::Multicast | TransportKind::Broadcast => {
                Ok(Sink::Udp(UdpSink::open(target).await?))
            }
            TransportKind::PubSub => Ok(Sink::PubSub(PubSubSink::open(target).await?)),
        }
    }
}

impl TransportSink for Sink {
    async fn send(&mut self, msg: &EmittedMessage) -> TGResult<()> {
        match self {
            Sink::Udp(s) => s.send(msg).await,
            Sink::PubSub(s) => s.send(msg).await,
        }
    }

    async fn close(self) {
        match self {
            Sink::Udp(s) => s.close().await,
            Sink::PubSub(s) => s.close().await,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_transport_kind_names() {
        for kind in [
            TransportKind::Multicast,
            TransportKind::Broadcast,
            TransportKind::PubSub,
        ] {
            assert_eq!(kind.as_str().parse::<TransportKind>().unwrap(), kind);
        }
        assert_eq!(
            "pubsub".parse::<TransportKind>().unwrap(),
            TransportKind::PubSub
        );
        assert!("tcp".parse::<TransportKind>().is_err());
    }

    #[test]
    fn test_target_display() {
        let mut config = SimConfig::default();
        let target = TransportTarget::from_config(&config, 4224);
        assert_eq!(target.to_string(), "multicast 224.0.0.1:4224");
        config.transport = TransportKind::PubSub;
        config.host = "0.0.0.0".into();
        let target = TransportTarget::from_config(&config, 4225);
        assert_eq!(target.to_string(), "zmq tcp://0.0.0.0:4225");
    }
}
