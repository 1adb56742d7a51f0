use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{clock::Stamp, config::SimConfig, sample::SyntheticSample, Error, TGResult};

pub mod cot;
pub mod remote_id;
pub mod status;

/// Trait implemented by protocols for generating messages from a sample.
///
/// Implementations must be pure: the same sample, stamp and options always give the same bytes.
pub trait TelemMsg: Sized {
    fn from_sample(sample: &SyntheticSample, stamp: &Stamp, opts: &DialectOptions) -> Self;
    fn with_identity(self, identity: &str) -> Self;
    fn to_bytes(&self) -> TGResult<Vec<u8>>;
}

/// Message schema variants emitted by the simulator.
///
/// Variant order is the send order within one tick: drone telemetry first, then host status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dialect {
    /// Cursor-on-Target event for a drone.
    EventXml,
    /// Remote ID style JSON.
    BasicIdJson,
    /// Sensor host health as JSON.
    StatusJson,
    /// Sensor host health as a Cursor-on-Target event.
    StatusXml,
}

/// Which configured port a dialect is published on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Telemetry,
    Status,
}

impl Dialect {
    pub const ALL: [Dialect; 4] = [
        Dialect::EventXml,
        Dialect::BasicIdJson,
        Dialect::StatusJson,
        Dialect::StatusXml,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::EventXml => "event-xml",
            Dialect::BasicIdJson => "basic-id-json",
            Dialect::StatusJson => "status-json",
            Dialect::StatusXml => "status-xml",
        }
    }

    pub fn channel(&self) -> Channel {
        match self {
            Dialect::EventXml | Dialect::BasicIdJson => Channel::Telemetry,
            Dialect::StatusJson | Dialect::StatusXml => Channel::Status,
        }
    }

    /// Serialize one message of this dialect.
    pub fn build(
        &self,
        sample: &SyntheticSample,
        stamp: &Stamp,
        opts: &DialectOptions,
    ) -> TGResult<EmittedMessage> {
        let payload = match self {
            Dialect::EventXml => encode::<cot::DroneEvent>(sample, stamp, opts)?,
            Dialect::BasicIdJson => encode::<remote_id::BasicIdMessage>(sample, stamp, opts)?,
            Dialect::StatusJson => encode::<status::StatusMessage>(sample, stamp, opts)?,
            Dialect::StatusXml => encode::<cot::StatusEvent>(sample, stamp, opts)?,
        };
        Ok(EmittedMessage {
            dialect: *self,
            payload,
        })
    }
}

fn encode<M: TelemMsg>(
    sample: &SyntheticSample,
    stamp: &Stamp,
    opts: &DialectOptions,
) -> TGResult<Vec<u8>> {
    M::from_sample(sample, stamp, opts).to_bytes()
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dialect::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| Error::Config(format!("unknown message kind {s:?}")))
    }
}

/// Per-dialect knobs that do not come from the sample.
#[derive(Debug, Clone, PartialEq)]
pub struct DialectOptions {
    /// Replaces the random drone id in every drone message.
    pub identity: Option<String>,
    /// Replaces the random host serial in every status message.
    pub host_identity: Option<String>,
    pub telemetry_stale_minutes: u32,
    pub status_stale_minutes: u32,
}

impl Default for DialectOptions {
    fn default() -> Self {
        Self {
            identity: None,
            host_identity: None,
            telemetry_stale_minutes: 5,
            status_stale_minutes: 10,
        }
    }
}

impl From<&SimConfig> for DialectOptions {
    fn from(config: &SimConfig) -> Self {
        Self {
            identity: config.identity.clone(),
            host_identity: config.host_serial.clone(),
            telemetry_stale_minutes: config.telemetry_stale_minutes,
            status_stale_minutes: config.status_stale_minutes,
        }
    }
}

/// One serialized payload, consumed exactly once by a transport sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedMessage {
    pub dialect: Dialect,
    pub payload: Vec<u8>,
}

impl EmittedMessage {
    /// Payloads are always UTF-8 text (XML or JSON).
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.payload).unwrap_or_default()
    }
}
