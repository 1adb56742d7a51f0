/// Motion models: how one tick's drone position relates to the previous one.
///
/// Positions never leave the configured box; the walk turns around when it reaches an edge.
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::{
    config::Motion,
    coord::{BBoxWGS, Heading, Point2d},
    sample::{round_to, GeoSampler, SyntheticSample},
    TGResult,
};

//  _____
// |_   _|   _ _ __   ___  ___
//   | || | | | '_ \ / _ \/ __|
//   | || |_| | |_) |  __/\__ \
//   |_| \__, | .__/ \___||___/
//       |___/|_|

/// API for a stream of synthetic samples.
pub trait SampleSource {
    fn next_sample<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        delta_t: TimeDelta,
    ) -> TGResult<SyntheticSample>;
}

/// Time delta since last sample, with [`Default`] and conversion from [`Duration`] for
/// convenience.
#[derive(Debug, Clone, Copy)]
pub struct TimeDelta {
    msec: u32,
}

impl Default for TimeDelta {
    fn default() -> Self {
        Self { msec: 1000 }
    }
}

impl From<Duration> for TimeDelta {
    fn from(d: Duration) -> Self {
        Self {
            msec: d.as_millis().min(u32::MAX as u128) as u32,
        }
    }
}

impl TimeDelta {
    pub fn seconds(&self) -> f32 {
        self.msec as f32 / 1000.0
    }
}

/// Uniform sampling is memoryless, every tick is an independent draw.
impl SampleSource for GeoSampler {
    fn next_sample<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        _delta_t: TimeDelta,
    ) -> TGResult<SyntheticSample> {
        Ok(self.sample(rng))
    }
}

//  ____                 _                  __        __    _ _
// |  _ \ __ _ _ __   __| | ___  _ __ ___   \ \      / /_ _| | | __
// | |_) / _` | '_ \ / _` |/ _ \| '_ ` _ \   \ \ /\ / / _` | | |/ /
// |  _ < (_| | | | | (_| | (_) | | | | | |   \ V  V / (_| | |   <
// |_| \_\__,_|_| |_|\__,_|\___/|_| |_| |_|    \_/\_/ \__,_|_|_|\_\

/// Bounded random walk: small heading changes, speed redrawn every step.
#[derive(Debug, Clone)]
pub struct RandomWalk {
    sampler: GeoSampler,
    max_velocity_mps: f32,
    pub(crate) last_pos: Point2d,
    heading: Heading,
}

impl RandomWalk {
    pub fn new<R: Rng + ?Sized>(sampler: GeoSampler, max_velocity_mps: f32, rng: &mut R) -> Self {
        let start_pos = sampler.bbox().midpoint();
        let random_deg = rng.gen::<f32>() * 360.0;
        Self {
            sampler,
            max_velocity_mps,
            last_pos: start_pos,
            heading: Heading::from(random_deg),
        }
    }

    fn step<R: Rng + ?Sized>(&mut self, rng: &mut R, delta_t: TimeDelta) -> TGResult<f32> {
        let bbox = self.sampler.bbox();
        let vel = rng.gen::<f32>() * self.max_velocity_mps;

        let turn = (rng.gen::<f32>() - 0.5) * 10.0;
        self.heading.rot(turn);
        debug!("heading after {} turn: {}", turn, self.heading.0);

        // calculate meters to move then convert to degrees; heading 0 is north
        let dist_m = (delta_t.seconds() * vel) as f64;
        let delta_x = dist_m * self.heading.to_radians().sin() as f64;
        let delta_y = dist_m * self.heading.to_radians().cos() as f64;
        let delta_lat = delta_y / BBoxWGS::meter_per_deg_lat(self.last_pos.0)?;
        let delta_lon = delta_x / BBoxWGS::meter_per_deg_lon(self.last_pos.0)?;
        debug!(
            "delta_lat: {:.6} ({:.2} m), delta_lon: {:.6} ({:.2} m)",
            delta_lat, delta_y, delta_lon, delta_x
        );
        let wanted = Point2d(self.last_pos.0 + delta_lat, self.last_pos.1 + delta_lon);

        // clamp to bbox and turn around at the edge
        let clamped = bbox.clamp(wanted);
        if clamped != wanted {
            debug!("out of bounds: {:?} -> {:?}", wanted, clamped);
            self.heading.rot(180.0);
        }
        self.last_pos = clamped;
        Ok(vel)
    }
}

impl SampleSource for RandomWalk {
    fn next_sample<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        delta_t: TimeDelta,
    ) -> TGResult<SyntheticSample> {
        let vel = self.step(rng, delta_t)?;
        let mut sample = self.sampler.sample_at(rng, self.last_pos);
        sample.speed_mps = round_to(vel as f64, 1);
        sample.direction_deg = round_to(self.heading.0 as f64, 1);
        Ok(sample)
    }
}

/// Motion model selected by configuration.
#[derive(Debug, Clone)]
pub enum MotionModel {
    Uniform(GeoSampler),
    Walk(RandomWalk),
}

impl MotionModel {
    pub fn new<R: Rng + ?Sized>(motion: &Motion, sampler: GeoSampler, rng: &mut R) -> Self {
        match motion {
            Motion::Uniform => MotionModel::Uniform(sampler),
            Motion::RandomWalk { max_velocity_mps } => {
                MotionModel::Walk(RandomWalk::new(sampler, *max_velocity_mps, rng))
            }
        }
    }
}

impl SampleSource for MotionModel {
    fn next_sample<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        delta_t: TimeDelta,
    ) -> TGResult<SyntheticSample> {
        match self {
            MotionModel::Uniform(s) => s.next_sample(rng, delta_t),
            MotionModel::Walk(w) => w.next_sample(rng, delta_t),
        }
    }
}
