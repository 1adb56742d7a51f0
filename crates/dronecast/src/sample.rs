/// Synthetic sample types and the uniform geo sampler.
///
/// Samplers never own an RNG: the caller passes one in, so a loop can seed its own generator
/// and tests can replay a sequence.
use rand::{seq::SliceRandom, Rng};

use crate::{
    config::{GeoBounds, JitterConfig, ValueRange},
    coord::{BBoxWGS, Point2d},
    TGResult,
};

//  _____
// |_   _|   _ _ __   ___  ___
//   | || | | | '_ \ / _ \/ __|
//   | || |_| | |_) |  __/\__ \
//   |_| \__, | .__/ \___||___/
//       |___/|_|

/// Everything one tick's messages are built from. Regenerated every tick, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSample {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: f64,
    pub height_agl_m: f64,
    pub speed_mps: f64,
    pub vertical_speed_mps: f64,
    pub direction_deg: f64,
    /// Operator position, near the drone.
    pub pilot: Point2d,
    /// Take-off point, near the drone.
    pub home: Point2d,
    pub drone: DroneIdentity,
    pub id_type: IdType,
    pub cot_type: String,
    pub rssi: Option<i32>,
    /// False when the receiver should report no GPS fix.
    pub has_fix: bool,
    pub host: HostStats,
}

/// The same drone seen through the id formats the different dialects use.
#[derive(Debug, Clone, PartialEq)]
pub struct DroneIdentity {
    /// `DRONE###`
    pub callsign: String,
    /// ANSI/CTA-2063-A style serial, e.g. `12345678Q291`.
    pub serial: String,
    /// Lowercase colon separated MAC.
    pub mac: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdType {
    SerialNumber,
    CaaRegistration,
    UtmAssigned,
    OperatorId,
}

impl IdType {
    pub const ALL: [IdType; 4] = [
        IdType::SerialNumber,
        IdType::CaaRegistration,
        IdType::UtmAssigned,
        IdType::OperatorId,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IdType::SerialNumber => "Serial Number (ANSI/CTA-2063-A)",
            IdType::CaaRegistration => "CAA Registration ID",
            IdType::UtmAssigned => "UTM (USS) Assigned ID",
            IdType::OperatorId => "Operator ID",
        }
    }
}

/// Byte counts with `used + free == total` by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

impl Usage {
    /// `used` is capped at `total`.
    pub fn new(total: u64, used: u64) -> Self {
        let used = used.min(total);
        Self {
            total,
            used,
            free: total - used,
        }
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.used as f64 / self.total as f64 * 100.0
    }
}

/// Health of the (simulated) sensor host publishing the drone traffic.
#[derive(Debug, Clone, PartialEq)]
pub struct HostStats {
    pub serial_number: String,
    pub cpu_percent: f64,
    pub memory: Usage,
    pub disk: Usage,
    pub temperature_c: f64,
    pub gps: Point2d,
    pub gps_altitude_m: f64,
}

pub const HOST_MEMORY_BYTES: u64 = 8 * 1024 * 1024 * 1024;
pub const HOST_DISK_BYTES: u64 = 64 * 1024 * 1024 * 1024;
/// The host always keeps at least this much memory available.
const HOST_MEMORY_RESERVE: u64 = 2 * 1024 * 1024 * 1024;

const COT_TYPE_BASE: &str = "a-f-G-U";
const COT_TYPE_SUFFIXES: [&str; 5] = ["", "-C", "-S", "-R", "-F"];

//   ____                  ____                        _
//  / ___| ___  ___       / ___|  __ _ _ __ ___  _ __ | | ___ _ __
// | |  _ / _ \/ _ \ _____\___ \ / _` | '_ ` _ \| '_ \| |/ _ \ '__|
// | |_| |  __/ (_) |_____|__) | (_| | | | | | | |_) | |  __/ |
//  \____|\___|\___/     |____/ \__,_|_| |_| |_| .__/|_|\___|_|
//                                             |_|

/// Draws [`SyntheticSample`]s from validated bounds.
#[derive(Debug, Clone)]
pub struct GeoSampler {
    bbox: BBoxWGS,
    bounds: GeoBounds,
    jitter: JitterConfig,
    no_fix_ratio: f64,
}

impl GeoSampler {
    pub fn new(bounds: &GeoBounds, jitter: &JitterConfig, no_fix_ratio: f64) -> TGResult<Self> {
        Ok(Self {
            bbox: bounds.bbox()?,
            bounds: bounds.clone(),
            jitter: jitter.clone(),
            no_fix_ratio: no_fix_ratio.clamp(0.0, 1.0),
        })
    }

    pub fn bbox(&self) -> &BBoxWGS {
        &self.bbox
    }

    /// Independent uniform draw of every field.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> SyntheticSample {
        let position = self.bbox.sample(rng);
        self.sample_at(rng, position)
    }

    /// Draw everything except the drone position, which the caller supplies.
    pub fn sample_at<R: Rng + ?Sized>(&self, rng: &mut R, position: Point2d) -> SyntheticSample {
        let drone_pos = self.bbox.clamp(round_point(position));
        let Point2d(lat, lon) = drone_pos;
        let pilot = round_point(drone_pos.jitter(rng, self.jitter.pilot_deg));
        let home = round_point(drone_pos.jitter(rng, self.jitter.home_deg));

        let mut cot_type = format!(
            "{COT_TYPE_BASE}{}",
            COT_TYPE_SUFFIXES.choose(rng).copied().unwrap_or_default()
        );
        if rng.gen_bool(0.5) {
            cot_type.push_str("-O");
        }

        SyntheticSample {
            latitude: lat,
            longitude: lon,
            altitude_m: draw(rng, &self.bounds.altitude_m, 1),
            height_agl_m: draw(rng, &self.bounds.height_agl_m, 1),
            speed_mps: draw(rng, &self.bounds.speed_mps, 1),
            vertical_speed_mps: draw(rng, &self.bounds.vertical_speed_mps, 1),
            direction_deg: rng.gen_range(0..360) as f64,
            pilot,
            home,
            drone: random_identity(rng),
            id_type: IdType::ALL.choose(rng).copied().unwrap_or(IdType::SerialNumber),
            cot_type,
            rssi: Some(rng.gen_range(-90..=-40)),
            has_fix: !rng.gen_bool(self.no_fix_ratio),
            host: self.host_stats(rng),
        }
    }

    fn host_stats<R: Rng + ?Sized>(&self, rng: &mut R) -> HostStats {
        let gps = self.bbox.sample(rng);
        HostStats {
            serial_number: format!("DRAGON{}", rng.gen_range(100..=999)),
            cpu_percent: round_to(rng.gen_range(0.0..=100.0), 1),
            memory: Usage::new(
                HOST_MEMORY_BYTES,
                rng.gen_range(0..=HOST_MEMORY_BYTES - HOST_MEMORY_RESERVE),
            ),
            disk: Usage::new(HOST_DISK_BYTES, rng.gen_range(0..=HOST_DISK_BYTES)),
            temperature_c: round_to(rng.gen_range(30.0..=70.0), 1),
            gps: round_point(gps),
            gps_altitude_m: round_to(rng.gen_range(0.0..=100.0), 1),
        }
    }
}

fn random_identity<R: Rng + ?Sized>(rng: &mut R) -> DroneIdentity {
    let letter = char::from(b'A' + rng.gen_range(0..26u8));
    let mac: [u8; 6] = rng.gen();
    DroneIdentity {
        callsign: format!("DRONE{}", rng.gen_range(100..=999)),
        serial: format!("{}{letter}291", rng.gen_range(10_000_000..=99_999_999)),
        mac: mac
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(":"),
    }
}

/// Uniform draw, rounded, and kept inside the range after rounding.
fn draw<R: Rng + ?Sized>(rng: &mut R, range: &ValueRange, places: i32) -> f64 {
    round_to(rng.gen_range(range.min..=range.max), places).clamp(range.min, range.max)
}

fn round_point(p: Point2d) -> Point2d {
    Point2d(round_to(p.0, 6), round_to(p.1, 6))
}

pub(crate) fn round_to(v: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (v * scale).round() / scale
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn sampler() -> GeoSampler {
        GeoSampler::new(&GeoBounds::default(), &JitterConfig::default(), 0.0).unwrap()
    }

    #[test]
    fn test_samples_stay_in_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        let bounds = GeoBounds {
            lat_min: 25.0,
            lat_max: 49.0,
            lon_min: -125.0,
            lon_max: -67.0,
            ..Default::default()
        };
        let sampler = GeoSampler::new(&bounds, &JitterConfig::default(), 0.0).unwrap();
        for _ in 0..10_000 {
            let s = sampler.sample(&mut rng);
            assert!((bounds.lat_min..=bounds.lat_max).contains(&s.latitude));
            assert!((bounds.lon_min..=bounds.lon_max).contains(&s.longitude));
            assert!(bounds.altitude_m.contains(s.altitude_m));
            assert!(bounds.height_agl_m.contains(s.height_agl_m));
            assert!(bounds.speed_mps.contains(s.speed_mps));
            assert!(bounds.vertical_speed_mps.contains(s.vertical_speed_mps));
            assert!(s.altitude_m >= 0.0 && s.height_agl_m >= 0.0);
            assert!((-90..=-40).contains(&s.rssi.unwrap()));
        }
    }

    #[test]
    fn test_tiny_box_edges_survive_rounding() {
        let mut rng = StdRng::seed_from_u64(3);
        let bounds = GeoBounds {
            lat_min: 10.00000049,
            lat_max: 10.00000051,
            lon_min: 20.00000049,
            lon_max: 20.00000051,
            ..Default::default()
        };
        let sampler = GeoSampler::new(&bounds, &JitterConfig::default(), 0.0).unwrap();
        for _ in 0..1_000 {
            let s = sampler.sample(&mut rng);
            assert!((bounds.lat_min..=bounds.lat_max).contains(&s.latitude));
            assert!((bounds.lon_min..=bounds.lon_max).contains(&s.longitude));
        }
    }

    #[test]
    fn test_pilot_and_home_are_nearby() {
        let mut rng = StdRng::seed_from_u64(5);
        let sampler = sampler();
        for _ in 0..1_000 {
            let s = sampler.sample(&mut rng);
            assert!((s.pilot.0 - s.latitude).abs() <= 0.001 + 1e-6);
            assert!((s.pilot.1 - s.longitude).abs() <= 0.001 + 1e-6);
            assert!((s.home.0 - s.latitude).abs() <= 0.0004 + 1e-6);
            assert!((s.home.1 - s.longitude).abs() <= 0.0004 + 1e-6);
        }
    }

    #[test]
    fn test_host_usage_is_consistent() {
        let mut rng = StdRng::seed_from_u64(9);
        let sampler = sampler();
        for _ in 0..1_000 {
            let host = sampler.sample(&mut rng).host;
            for usage in [host.memory, host.disk] {
                assert_eq!(usage.used + usage.free, usage.total);
                assert!((0.0..=100.0).contains(&usage.percent()));
            }
            assert!(host.memory.free >= HOST_MEMORY_RESERVE);
        }
        assert_eq!(Usage::new(10, 20), Usage::new(10, 10));
        assert_eq!(Usage::new(0, 0).percent(), 0.0);
    }

    #[test]
    fn test_identity_formats() {
        let mut rng = StdRng::seed_from_u64(1);
        let s = sampler().sample(&mut rng);
        assert!(s.drone.callsign.starts_with("DRONE"));
        assert_eq!(s.drone.callsign.len(), 8);
        assert_eq!(s.drone.serial.len(), 12);
        assert!(s.drone.serial.ends_with("291"));
        assert_eq!(s.drone.mac.split(':').count(), 6);
        assert!(s.cot_type.starts_with("a-f-G-U"));
        assert!(s.host.serial_number.starts_with("DRAGON"));
        assert_eq!(s.host.serial_number.len(), 9);
    }

    #[test]
    fn test_no_fix_ratio() {
        let mut rng = StdRng::seed_from_u64(2);
        let always =
            GeoSampler::new(&GeoBounds::default(), &JitterConfig::default(), 1.0).unwrap();
        assert!(!always.sample(&mut rng).has_fix);
        assert!(sampler().sample(&mut rng).has_fix);
    }

    #[test]
    fn test_seeded_samplers_repeat() {
        let sampler = sampler();
        let a = sampler.sample(&mut StdRng::seed_from_u64(77));
        let b = sampler.sample(&mut StdRng::seed_from_u64(77));
        assert_eq!(a, b);
    }
}
