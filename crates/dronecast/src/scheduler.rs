//! Scheduler loop: one per channel, ticking on a fixed interval until cancelled.
//!
//! Each tick draws one sample, then builds and sends every enabled dialect in [`Dialect`] order
//! before the next sleep. The loop owns its clock and RNG, so concurrent loops share nothing
//! mutable.
use std::{fmt, time::Duration};

use rand::{rngs::StdRng, SeedableRng};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::{
    clock::SessionClock,
    config::SimConfig,
    model::{MotionModel, SampleSource, TimeDelta},
    protocol::{Dialect, DialectOptions},
    sample::GeoSampler,
    transport::{Sink, TransportSink, TransportTarget},
    TGResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Configured, no socket yet.
    Idle,
    Running,
    /// Cancelled and the socket has been released.
    Stopped,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoopState::Idle => "idle",
            LoopState::Running => "running",
            LoopState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// One destination and the dialects published to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPlan {
    pub target: TransportTarget,
    /// Sorted, no duplicates.
    pub kinds: Vec<Dialect>,
}

impl ChannelPlan {
    pub fn new(target: TransportTarget, mut kinds: Vec<Dialect>) -> Self {
        kinds.sort();
        kinds.dedup();
        Self { target, kinds }
    }
}

/// What a loop did before it stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopReport {
    pub target: String,
    pub ticks: u64,
    pub sent: u64,
    pub failed: u64,
    pub state: LoopState,
}

impl LoopReport {
    fn new(target: &TransportTarget) -> Self {
        Self {
            target: target.to_string(),
            ticks: 0,
            sent: 0,
            failed: 0,
            state: LoopState::Idle,
        }
    }
}

pub struct Scheduler {
    plan: ChannelPlan,
    interval: Duration,
    opts: DialectOptions,
    source: MotionModel,
    rng: StdRng,
    state: LoopState,
}

impl Scheduler {
    /// `seed` makes the sample stream reproducible; `None` seeds from the OS.
    pub fn new(config: &SimConfig, plan: ChannelPlan, seed: Option<u64>) -> TGResult<Self> {
        let sampler = GeoSampler::new(&config.bounds, &config.jitter, config.no_fix_ratio)?;
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let source = MotionModel::new(&config.motion, sampler, &mut rng);
        Ok(Self {
            plan,
            interval: config.interval(),
            opts: DialectOptions::from(config),
            source,
            rng,
            state: LoopState::Idle,
        })
    }

    pub fn plan(&self) -> &ChannelPlan {
        &self.plan
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Open the configured sink and run until `cancel` fires.
    pub async fn start(self, cancel: CancellationToken) -> TGResult<LoopReport> {
        let sink = Sink::open(&self.plan.target).await?;
        Ok(self.run_with_sink(sink, cancel).await)
    }

    /// Run on an already open sink. The sink is closed on return, whatever the exit path.
    pub async fn run_with_sink<S: TransportSink>(
        mut self,
        mut sink: S,
        cancel: CancellationToken,
    ) -> LoopReport {
        let mut report = LoopReport::new(&self.plan.target);
        let mut clock = SessionClock::new();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.transition(LoopState::Running);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.tick(&mut sink, &mut clock, &mut report).await;
        }

        sink.close().await;
        self.transition(LoopState::Stopped);
        report.state = self.state;
        info!(
            "{}: {} ticks, {} sent, {} failed",
            report.target, report.ticks, report.sent, report.failed
        );
        report
    }

    async fn tick<S: TransportSink>(
        &mut self,
        sink: &mut S,
        clock: &mut SessionClock,
        report: &mut LoopReport,
    ) {
        report.ticks += 1;
        let sample = match self
            .source
            .next_sample(&mut self.rng, TimeDelta::from(self.interval))
        {
            Ok(sample) => sample,
            Err(e) => {
                warn!("{}: sampling failed: {}", report.target, e);
                report.failed += self.plan.kinds.len() as u64;
                return;
            }
        };
        for dialect in &self.plan.kinds {
            let stamp = clock.stamp();
            let msg = match dialect.build(&sample, &stamp, &self.opts) {
                Ok(msg) => msg,
                Err(e) => {
                    warn!("{}: {}", dialect, e);
                    report.failed += 1;
                    continue;
                }
            };
            trace!("{}", msg.as_str());
            match sink.send(&msg).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    warn!("{}", e);
                    report.failed += 1;
                }
            }
        }
    }

    fn transition(&mut self, to: LoopState) {
        debug!("{}: {} -> {}", self.plan.target, self.state, to);
        if to != LoopState::Idle {
            info!("{} {}", self.plan.target, to);
        }
        self.state = to;
    }
}
