//! ZeroMQ PUB socket sink, plus the frame helpers subscribers use to read it.
//!
//! PUB/SUB drops frames for slow or absent subscribers. That is the contract of the pattern and
//! the sink keeps it: a send with nobody listening succeeds and the frame is lost.
use nom::{
    bytes::complete::{tag, take_till1, take_while1},
    character::complete::{char, u16},
    combinator::all_consuming,
    Finish, IResult,
};
use tracing::{debug, info};
use zeromq::{PubSocket, Socket, SocketSend, ZmqMessage};

use super::{TransportSink, TransportTarget};
use crate::{protocol::EmittedMessage, Error, TGResult};

pub struct PubSubSink {
    socket: PubSocket,
    endpoint: String,
    topic: Option<String>,
}

impl PubSubSink {
    /// Bind once; the socket lives until [`TransportSink::close`].
    pub async fn open(target: &TransportTarget) -> TGResult<Self> {
        let mut socket = PubSocket::new();
        let requested = format!("tcp://{}:{}", target.host, target.port);
        let bound = socket
            .bind(&requested)
            .await
            .map_err(|e| target.setup_error(e))?;
        let endpoint = bound.to_string();
        info!("publisher bound at {}", endpoint);
        Ok(Self {
            socket,
            endpoint,
            topic: target.topic.clone(),
        })
    }

    /// Actual bound endpoint, which differs from the requested one when binding port 0.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl TransportSink for PubSubSink {
    async fn send(&mut self, msg: &EmittedMessage) -> TGResult<()> {
        let text = frame(self.topic.as_deref(), msg.as_str());
        self.socket
            .send(ZmqMessage::from(text))
            .await
            .map_err(|e| Error::TransportSend {
                target: self.endpoint.clone(),
                reason: e.to_string(),
            })?;
        debug!("{} -> {}", msg.dialect, self.endpoint);
        Ok(())
    }

    async fn close(self) {
        debug!("unbinding {}", self.endpoint);
        drop(self.socket);
    }
}

/// `"<topic> <payload>"` when a topic is set, otherwise the bare payload.
pub fn frame(topic: Option<&str>, payload: &str) -> String {
    match topic {
        Some(topic) => format!("{topic} {payload}"),
        None => payload.to_string(),
    }
}

/// Split a received frame into its topic (if any) and payload.
///
/// Payloads are JSON or XML, so a frame starting with `{`, `[` or `<` has no topic.
pub fn split_frame(frame: &str) -> (Option<&str>, &str) {
    match nom_topic(frame) {
        Ok((payload, topic)) => (Some(topic), payload),
        Err(_) => (None, frame),
    }
}

fn nom_topic(input: &str) -> IResult<&str, &str> {
    let (rest, topic) =
        take_till1(|c: char| c.is_whitespace() || matches!(c, '{' | '[' | '<'))(input)?;
    let (rest, _) = char(' ')(rest)?;
    Ok((rest, topic))
}

/// Parse `tcp://<host>:<port>` into its parts.
pub fn parse_endpoint(endpoint: &str) -> TGResult<(String, u16)> {
    all_consuming(nom_endpoint)(endpoint)
        .finish()
        .map(|(_, (host, port))| (host.to_string(), port))
        .map_err(|e| e.into())
}

fn nom_endpoint(input: &str) -> IResult<&str, (&str, u16)> {
    let (rest, _) = tag("tcp://")(input)?;
    let (rest, host) = take_while1(|c: char| c != ':')(rest)?;
    let (rest, _) = char(':')(rest)?;
    let (rest, port) = u16(rest)?;
    Ok((rest, (host, port)))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{lazy_init_tracing, protocol::Dialect, transport::TransportKind};
    use std::time::Duration;
    use zeromq::{SocketRecv, SubSocket};

    fn target(port: u16, topic: Option<&str>) -> TransportTarget {
        TransportTarget {
            kind: TransportKind::PubSub,
            host: "127.0.0.1".to_string(),
            port,
            ttl: 1,
            topic: topic.map(str::to_string),
        }
    }

    #[test]
    fn test_frames() {
        assert_eq!(frame(Some("DroneID"), "{}"), "DroneID {}");
        assert_eq!(frame(None, "{}"), "{}");
        assert_eq!(
            split_frame(r#"DroneID {"Basic ID":{}}"#),
            (Some("DroneID"), r#"{"Basic ID":{}}"#)
        );
        assert_eq!(split_frame(r#"{"a": 1}"#), (None, r#"{"a": 1}"#));
        assert_eq!(split_frame("<event/>"), (None, "<event/>"));
        assert_eq!(split_frame("AUX_ADV_IND <event/>"), (Some("AUX_ADV_IND"), "<event/>"));
    }

    #[test]
    fn test_parse_endpoint() {
        assert_eq!(
            parse_endpoint("tcp://0.0.0.0:4224").unwrap(),
            ("0.0.0.0".to_string(), 4224)
        );
        assert!(matches!(
            parse_endpoint("udp://0.0.0.0:4224"),
            Err(Error::Parse(_))
        ));
        assert!(parse_endpoint("tcp://0.0.0.0:99999").is_err());
        assert!(parse_endpoint("tcp://0.0.0.0:4224/x").is_err());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_silent() {
        let mut sink = PubSubSink::open(&target(0, None)).await.unwrap();
        let msg = EmittedMessage {
            dialect: Dialect::StatusJson,
            payload: b"{}".to_vec(),
        };
        for _ in 0..10 {
            sink.send(&msg).await.unwrap();
        }
        sink.close().await;
    }

    #[tokio::test]
    async fn test_subscriber_receives_topic_frames() {
        lazy_init_tracing();
        let mut sink = PubSubSink::open(&target(0, Some("DroneID"))).await.unwrap();
        let (host, port) = parse_endpoint(sink.endpoint()).unwrap();
        assert_eq!(host, "127.0.0.1");
        assert_ne!(port, 0);

        let mut sub = SubSocket::new();
        sub.connect(sink.endpoint()).await.unwrap();
        sub.subscribe("DroneID").await.unwrap();

        let msg = EmittedMessage {
            dialect: Dialect::BasicIdJson,
            payload: br#"{"index":0}"#.to_vec(),
        };
        // subscribers joining late miss frames, so keep publishing until one lands
        let received = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                sink.send(&msg).await.unwrap();
                if let Ok(Ok(m)) =
                    tokio::time::timeout(Duration::from_millis(100), sub.recv()).await
                {
                    return m;
                }
            }
        })
        .await
        .unwrap();
        let text = String::try_from(received).unwrap();
        assert_eq!(split_frame(&text), (Some("DroneID"), r#"{"index":0}"#));
    }

    #[tokio::test]
    async fn test_port_in_use_is_a_setup_error() {
        let first = PubSubSink::open(&target(0, None)).await.unwrap();
        let (_, port) = parse_endpoint(first.endpoint()).unwrap();
        let second = PubSubSink::open(&target(port, None)).await;
        assert!(matches!(second, Err(Error::TransportSetup { .. })));
        first.close().await;
    }
}
