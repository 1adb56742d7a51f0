//! UDP multicast / broadcast sender. One datagram per message, no group membership.
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use tokio::net::UdpSocket;
use tracing::{debug, info};

use super::{TransportKind, TransportSink, TransportTarget};
use crate::{protocol::EmittedMessage, Error, TGResult};

pub struct UdpSink {
    socket: UdpSocket,
    dest: SocketAddr,
    label: String,
}

impl UdpSink {
    pub async fn open(target: &TransportTarget) -> TGResult<Self> {
        let group: Ipv4Addr = target
            .host
            .parse()
            .map_err(|e| target.setup_error(format!("{:?}: {e}", target.host)))?;
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(|e| target.setup_error(e))?;
        match target.kind {
            TransportKind::Multicast => socket
                .set_multicast_ttl_v4(target.ttl)
                .map_err(|e| target.setup_error(e))?,
            TransportKind::Broadcast => socket
                .set_broadcast(true)
                .map_err(|e| target.setup_error(e))?,
            TransportKind::PubSub => {
                return Err(target.setup_error("not a UDP transport"));
            }
        }
        let dest = SocketAddr::V4(SocketAddrV4::new(group, target.port));
        info!("{} sender ready, ttl {}", target, target.ttl);
        Ok(Self {
            socket,
            dest,
            label: target.to_string(),
        })
    }

    pub fn dest(&self) -> SocketAddr {
        self.dest
    }
}

impl TransportSink for UdpSink {
    async fn send(&mut self, msg: &EmittedMessage) -> TGResult<()> {
        let sent = self
            .socket
            .send_to(&msg.payload, self.dest)
            .await
            .map_err(|e| Error::TransportSend {
                target: self.label.clone(),
                reason: e.to_string(),
            })?;
        debug!("{} -> {}: {} bytes", msg.dialect, self.label, sent);
        Ok(())
    }

    async fn close(self) {
        debug!("closing {}", self.label);
        drop(self.socket);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::protocol::Dialect;
    use std::time::Duration;

    fn target(kind: TransportKind, host: &str, port: u16) -> TransportTarget {
        TransportTarget {
            kind,
            host: host.to_string(),
            port,
            ttl: 1,
            topic: None,
        }
    }

    #[tokio::test]
    async fn test_udp_sink_delivers_one_datagram_per_message() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();
        let mut sink = UdpSink::open(&target(TransportKind::Broadcast, "127.0.0.1", port))
            .await
            .unwrap();
        let msg = EmittedMessage {
            dialect: Dialect::BasicIdJson,
            payload: br#"{"Basic ID":{}}"#.to_vec(),
        };
        sink.send(&msg).await.unwrap();
        sink.send(&msg).await.unwrap();

        let mut buf = [0u8; 1024];
        for _ in 0..2 {
            let (n, _) = tokio::time::timeout(Duration::from_secs(2), receiver.recv_from(&mut buf))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(&buf[..n], msg.payload.as_slice());
        }
        sink.close().await;
    }

    #[tokio::test]
    async fn test_multicast_sink_sets_ttl() {
        let mut t = target(TransportKind::Multicast, "224.0.0.1", 6969);
        t.ttl = 3;
        let sink = UdpSink::open(&t).await.unwrap();
        assert_eq!(sink.socket.multicast_ttl_v4().unwrap(), 3);
        assert_eq!(sink.dest(), "224.0.0.1:6969".parse::<SocketAddr>().unwrap());
    }

    #[tokio::test]
    async fn test_bad_address_is_a_setup_error() {
        let res = UdpSink::open(&target(TransportKind::Multicast, "not-an-ip", 6969)).await;
        assert!(matches!(res, Err(Error::TransportSetup { .. })));
        let res = UdpSink::open(&target(TransportKind::PubSub, "127.0.0.1", 6969)).await;
        assert!(matches!(res, Err(Error::TransportSetup { .. })));
    }
}
