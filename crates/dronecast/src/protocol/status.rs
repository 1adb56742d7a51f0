//! Sensor host health as JSON.
use serde::{Deserialize, Serialize};

use super::{DialectOptions, TelemMsg};
use crate::{
    clock::Stamp,
    sample::{SyntheticSample, Usage},
    Error, TGResult,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub serial_number: String,
    pub runtime: u64,
    pub timestamp: String,
    pub stale: String,
    pub gps_data: GpsData,
    pub system_stats: SystemStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsData {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStats {
    pub cpu_usage: f64,
    pub memory: MemoryStats,
    pub disk: DiskStats,
    pub temperature: f64,
    pub uptime: u64,
}

/// Bytes. `used + free == total`; `available` mirrors `free` for older readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total: u64,
    pub available: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
}

/// Bytes. `used + free == total`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskStats {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
}

impl From<Usage> for MemoryStats {
    fn from(u: Usage) -> Self {
        Self {
            total: u.total,
            available: u.free,
            used: u.used,
            free: u.free,
            percent: u.percent(),
        }
    }
}

impl From<Usage> for DiskStats {
    fn from(u: Usage) -> Self {
        Self {
            total: u.total,
            used: u.used,
            free: u.free,
            percent: u.percent(),
        }
    }
}

impl TelemMsg for StatusMessage {
    fn from_sample(sample: &SyntheticSample, stamp: &Stamp, opts: &DialectOptions) -> Self {
        let host = &sample.host;
        let msg = StatusMessage {
            serial_number: host.serial_number.clone(),
            runtime: stamp.runtime_secs,
            timestamp: stamp.time(),
            stale: stamp.stale(opts.status_stale_minutes),
            gps_data: GpsData {
                latitude: host.gps.0,
                longitude: host.gps.1,
                altitude: host.gps_altitude_m,
            },
            system_stats: SystemStats {
                cpu_usage: host.cpu_percent,
                memory: host.memory.into(),
                disk: host.disk.into(),
                temperature: host.temperature_c,
                uptime: stamp.runtime_secs,
            },
        };
        match &opts.host_identity {
            Some(id) => msg.with_identity(id),
            None => msg,
        }
    }

    fn with_identity(mut self, identity: &str) -> Self {
        self.serial_number = identity.to_string();
        self
    }

    fn to_bytes(&self) -> TGResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Encode(e.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        clock::SessionClock,
        config::{GeoBounds, JitterConfig},
        sample::GeoSampler,
    };
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_status_usage_is_consistent() {
        let mut rng = StdRng::seed_from_u64(31);
        let sampler =
            GeoSampler::new(&GeoBounds::default(), &JitterConfig::default(), 0.0).unwrap();
        let mut clock = SessionClock::new();
        let opts = DialectOptions::default();
        for _ in 0..1_000 {
            let sample = sampler.sample(&mut rng);
            let stamp = clock.stamp();
            let msg = StatusMessage::from_sample(&sample, &stamp, &opts);
            let mem = &msg.system_stats.memory;
            assert_eq!(mem.percent, mem.used as f64 / mem.total as f64 * 100.0);
            let disk = &msg.system_stats.disk;
            assert_eq!(disk.percent, disk.used as f64 / disk.total as f64 * 100.0);

            let bytes = msg.to_bytes().unwrap();
            let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            let mem = &v["system_stats"]["memory"];
            let (total, used, free) = (
                mem["total"].as_u64().unwrap(),
                mem["used"].as_u64().unwrap(),
                mem["free"].as_u64().unwrap(),
            );
            assert_eq!(used + free, total);
            assert_eq!(mem["available"].as_u64(), Some(free));
            assert!((0.0..=100.0).contains(&mem["percent"].as_f64().unwrap()));

            let status: StatusMessage = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(status, msg);
            let disk = &status.system_stats.disk;
            assert_eq!(disk.used + disk.free, disk.total);
            assert!((0.0..=100.0).contains(&disk.percent));
            assert!((0.0..=100.0).contains(&status.system_stats.cpu_usage));
            assert_eq!(status.system_stats.uptime, status.runtime);
            assert!(status.timestamp.ends_with('Z') && status.stale.ends_with('Z'));
        }
    }

    #[test]
    fn test_status_host_identity() {
        let mut rng = StdRng::seed_from_u64(32);
        let sampler =
            GeoSampler::new(&GeoBounds::default(), &JitterConfig::default(), 0.0).unwrap();
        let sample = sampler.sample(&mut rng);
        let stamp = SessionClock::new().stamp();
        let random = StatusMessage::from_sample(&sample, &stamp, &DialectOptions::default());
        let digits = random.serial_number.strip_prefix("DRAGON").unwrap();
        assert!((100..=999).contains(&digits.parse::<u32>().unwrap()));
        let opts = DialectOptions {
            host_identity: Some("DRAGON042".to_string()),
            ..Default::default()
        };
        let fixed = StatusMessage::from_sample(&sample, &stamp, &opts);
        assert_eq!(fixed.serial_number, "DRAGON042");
        assert_eq!(fixed.stale, stamp.stale(10));
    }
}
