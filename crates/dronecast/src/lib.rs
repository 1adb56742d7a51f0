/// Synthetic drone telemetry simulation and multi-transport publishing.
///
/// *Samplers* ([`sample`], [`model`]) draw bounded [`sample::SyntheticSample`]s each tick.
/// *Protocols* ([`protocol`]) turn a sample plus a [`clock::Stamp`] into one serialized message
/// per [`protocol::Dialect`]. *Transports* ([`transport`]) push the bytes out over UDP multicast,
/// UDP broadcast or a pub/sub socket, and the [`scheduler`] drives the whole thing on a fixed
/// interval until cancelled.
use std::sync::Once;

use thiserror::Error;

pub mod clock;
pub mod config;
pub mod coord;
pub mod model;
pub mod protocol;
pub mod runner;
pub mod sample;
pub mod scheduler;
pub mod transport;

/// Result type for this library
pub type TGResult<T> = std::result::Result<T, Error>;

/// Error type for this library
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Invalid coordinate: {0}")]
    InvalidCoord(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Transport setup failed for {target}: {reason}")]
    TransportSetup { target: String, reason: String },
    #[error("Send to {target} failed: {reason}")]
    TransportSend { target: String, reason: String },
    #[error("Encode error: {0}")]
    Encode(String),
}

impl From<nom::error::Error<&str>> for Error {
    fn from(err: nom::error::Error<&str>) -> Self {
        Error::Parse(format!("{:?}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Parse(err.to_string())
    }
}

/// Test binary helper to init tracing. This is usually the responsibility of the consumer of the
/// library crate.
pub fn lazy_init_tracing() {
    {
        static INIT: Once = Once::new();
        &INIT
    }
    .call_once(|| {
        tracing_subscriber::fmt::init();
    });
}
