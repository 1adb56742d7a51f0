/// Simulator configuration: one explicit struct handed to the runner, loadable from YAML.
use std::{net::Ipv4Addr, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{coord::BBoxWGS, protocol::Dialect, transport::TransportKind, Error, TGResult};

pub const MIN_INTERVAL_SECS: f64 = 0.1;
pub const MAX_INTERVAL_SECS: f64 = 60.0;
pub const MAX_STALE_MINUTES: u32 = 24 * 60;

/// Inclusive `[min, max]` range for a sampled value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, v: f64) -> bool {
        (self.min..=self.max).contains(&v)
    }

    fn validate(&self, name: &str, non_negative: bool) -> TGResult<()> {
        if !self.min.is_finite() || !self.max.is_finite() || self.min > self.max {
            return Err(Error::Config(format!(
                "{name}: invalid range [{}, {}]",
                self.min, self.max
            )));
        }
        if non_negative && self.min < 0.0 {
            return Err(Error::Config(format!("{name}: must not be negative")));
        }
        Ok(())
    }
}

/// Synthetic geography: the box positions are drawn from plus the flight envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoBounds {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
    pub altitude_m: ValueRange,
    pub height_agl_m: ValueRange,
    pub speed_mps: ValueRange,
    pub vertical_speed_mps: ValueRange,
}

impl Default for GeoBounds {
    fn default() -> Self {
        Self {
            lat_min: 39.724129,
            lat_max: 39.734129,
            lon_min: -105.080828,
            lon_max: -105.060828,
            altitude_m: ValueRange::new(50.0, 400.0),
            height_agl_m: ValueRange::new(20.0, 200.0),
            speed_mps: ValueRange::new(0.0, 30.0),
            vertical_speed_mps: ValueRange::new(-5.0, 5.0),
        }
    }
}

impl GeoBounds {
    pub fn bbox(&self) -> TGResult<BBoxWGS> {
        BBoxWGS::from_ranges(self.lat_min, self.lat_max, self.lon_min, self.lon_max)
    }
}

/// Maximum offsets, in degrees, for points derived from the drone position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JitterConfig {
    pub pilot_deg: f64,
    pub home_deg: f64,
}

impl Default for JitterConfig {
    fn default() -> Self {
        Self {
            pilot_deg: 0.001,
            home_deg: 0.0004,
        }
    }
}

/// How successive positions relate to each other.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "kebab-case")]
pub enum Motion {
    /// Every tick draws an independent position from the box.
    #[default]
    Uniform,
    /// Positions follow a bounded random walk.
    RandomWalk { max_velocity_mps: f32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub transport: TransportKind,
    /// Multicast group, broadcast address, or pub/sub bind host.
    pub host: String,
    pub telemetry_port: u16,
    pub status_port: u16,
    pub ttl: u32,
    /// Pub/sub topic prefix, sent as `"<topic> <payload>"`.
    pub topic: Option<String>,
    pub interval_secs: f64,
    pub kinds: Vec<Dialect>,
    pub bounds: GeoBounds,
    pub jitter: JitterConfig,
    pub motion: Motion,
    /// Fixed drone id reused by every drone message instead of a fresh random one.
    pub identity: Option<String>,
    /// Fixed sensor host serial for status messages instead of a fresh random one.
    pub host_serial: Option<String>,
    pub telemetry_stale_minutes: u32,
    pub status_stale_minutes: u32,
    /// Probability that a Basic-ID message reports no GPS fix.
    pub no_fix_ratio: f64,
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Multicast,
            host: "224.0.0.1".to_string(),
            telemetry_port: 6969,
            status_port: 6969,
            ttl: 1,
            topic: None,
            interval_secs: 1.0,
            kinds: vec![Dialect::EventXml, Dialect::BasicIdJson, Dialect::StatusJson],
            bounds: GeoBounds::default(),
            jitter: JitterConfig::default(),
            motion: Motion::default(),
            identity: None,
            host_serial: None,
            telemetry_stale_minutes: 5,
            status_stale_minutes: 10,
            no_fix_ratio: 0.0,
            seed: None,
        }
    }
}

impl SimConfig {
    pub fn from_yaml_str(yaml: &str) -> TGResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: impl AsRef<Path>) -> TGResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {e}", path.display())))?;
        Self::from_yaml_str(&text)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_secs)
    }

    /// Reject anything that would otherwise surface as a failure once the loops are running.
    pub fn validate(&self) -> TGResult<()> {
        if !(MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS).contains(&self.interval_secs) {
            return Err(Error::Config(format!(
                "interval {}s outside [{MIN_INTERVAL_SECS}, {MAX_INTERVAL_SECS}]",
                self.interval_secs
            )));
        }
        if self.telemetry_port == 0 || self.status_port == 0 {
            return Err(Error::Config("port 0 is not a valid destination".into()));
        }
        if !(1..=255).contains(&self.ttl) {
            return Err(Error::Config(format!("ttl {} outside [1, 255]", self.ttl)));
        }
        self.validate_host()?;
        if let Some(topic) = &self.topic {
            if topic.is_empty() || topic.contains(char::is_whitespace) {
                return Err(Error::Config(format!("topic {topic:?} must be one word")));
            }
        }
        if self.kinds.is_empty() {
            return Err(Error::Config("no message kinds enabled".into()));
        }

        self.bounds.bbox()?;
        self.bounds.altitude_m.validate("altitude_m", true)?;
        self.bounds.height_agl_m.validate("height_agl_m", true)?;
        self.bounds.speed_mps.validate("speed_mps", true)?;
        self.bounds.vertical_speed_mps.validate("vertical_speed_mps", false)?;
        for (name, deg) in [
            ("jitter.pilot_deg", self.jitter.pilot_deg),
            ("jitter.home_deg", self.jitter.home_deg),
        ] {
            if !(0.0..=1.0).contains(&deg) {
                return Err(Error::Config(format!("{name} {deg} outside [0, 1]")));
            }
        }
        if let Motion::RandomWalk { max_velocity_mps } = self.motion {
            if !(max_velocity_mps.is_finite() && max_velocity_mps > 0.0) {
                return Err(Error::Config(format!(
                    "random walk velocity {max_velocity_mps} must be positive"
                )));
            }
        }

        for (name, minutes) in [
            ("telemetry_stale_minutes", self.telemetry_stale_minutes),
            ("status_stale_minutes", self.status_stale_minutes),
        ] {
            if !(1..=MAX_STALE_MINUTES).contains(&minutes) {
                return Err(Error::Config(format!(
                    "{name} {minutes} outside [1, {MAX_STALE_MINUTES}]"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.no_fix_ratio) {
            return Err(Error::Config(format!(
                "no_fix_ratio {} outside [0, 1]",
                self.no_fix_ratio
            )));
        }
        Ok(())
    }

    fn validate_host(&self) -> TGResult<()> {
        match self.transport {
            TransportKind::Multicast => {
                let addr: Ipv4Addr = self.host.parse().map_err(|_| {
                    Error::Config(format!("multicast group {:?} is not IPv4", self.host))
                })?;
                if !addr.is_multicast() {
                    return Err(Error::Config(format!("{addr} is not a multicast group")));
                }
            }
            TransportKind::Broadcast => {
                self.host.parse::<Ipv4Addr>().map_err(|_| {
                    Error::Config(format!("broadcast address {:?} is not IPv4", self.host))
                })?;
            }
            TransportKind::PubSub => {
                if self.host.is_empty() || self.host.contains(char::is_whitespace) {
                    return Err(Error::Config(format!("bind host {:?}", self.host)));
                }
            }
        }
        Ok(())
    }
}
