//! Multi-channel runner: plan the channels, open every sink, then run one scheduler per channel.
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    config::SimConfig,
    protocol::{Channel, Dialect},
    scheduler::{ChannelPlan, LoopReport, Scheduler},
    transport::{Sink, TransportSink, TransportTarget},
    TGResult,
};

/// Route drone dialects to the telemetry port and host dialects to the status port.
///
/// Equal ports share a single channel. Channels with nothing to send are left out.
pub fn plan_channels(config: &SimConfig) -> Vec<ChannelPlan> {
    let (telemetry, status): (Vec<Dialect>, Vec<Dialect>) = config
        .kinds
        .iter()
        .copied()
        .partition(|k| k.channel() == Channel::Telemetry);

    let channels = if config.telemetry_port == config.status_port {
        vec![(config.telemetry_port, config.kinds.clone())]
    } else {
        vec![
            (config.telemetry_port, telemetry),
            (config.status_port, status),
        ]
    };
    channels
        .into_iter()
        .filter(|(_, kinds)| !kinds.is_empty())
        .map(|(port, kinds)| ChannelPlan::new(TransportTarget::from_config(config, port), kinds))
        .collect()
}

/// Run every channel until `cancel` fires.
///
/// Configuration and socket setup errors are returned before any loop starts; sinks opened
/// before the failure are closed again.
pub async fn run(config: SimConfig, cancel: CancellationToken) -> TGResult<Vec<LoopReport>> {
    config.validate()?;

    let schedulers = plan_channels(&config)
        .into_iter()
        .enumerate()
        .map(|(i, plan)| {
            let seed = config.seed.map(|s| s.wrapping_add(i as u64));
            Scheduler::new(&config, plan, seed)
        })
        .collect::<TGResult<Vec<_>>>()?;

    let mut opened: Vec<(Scheduler, Sink)> = Vec::with_capacity(schedulers.len());
    for scheduler in schedulers {
        match Sink::open(&scheduler.plan().target).await {
            Ok(sink) => opened.push((scheduler, sink)),
            Err(e) => {
                error!("{}", e);
                for (_, sink) in opened {
                    sink.close().await;
                }
                return Err(e);
            }
        }
    }

    info!(
        "publishing every {:.1}s on {} channel(s)",
        config.interval_secs,
        opened.len()
    );
    let handles: Vec<JoinHandle<LoopReport>> = opened
        .into_iter()
        .map(|(scheduler, sink)| tokio::spawn(scheduler.run_with_sink(sink, cancel.clone())))
        .collect();

    let mut reports = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(report) => reports.push(report),
            Err(e) => warn!("scheduler task ended abnormally: {}", e),
        }
    }
    Ok(reports)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{lazy_init_tracing, scheduler::LoopState, transport::TransportKind, Error};
    use std::time::Duration;
    use tokio::net::UdpSocket;

    #[test]
    fn test_same_port_shares_one_channel() {
        let config = SimConfig {
            kinds: vec![
                Dialect::StatusJson,
                Dialect::EventXml,
                Dialect::BasicIdJson,
                Dialect::EventXml,
            ],
            ..Default::default()
        };
        let plans = plan_channels(&config);
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].target.port, 6969);
        assert_eq!(
            plans[0].kinds,
            vec![Dialect::EventXml, Dialect::BasicIdJson, Dialect::StatusJson]
        );
    }

    #[test]
    fn test_split_ports() {
        let config = SimConfig {
            telemetry_port: 4224,
            status_port: 4225,
            kinds: Dialect::ALL.to_vec(),
            ..Default::default()
        };
        let plans = plan_channels(&config);
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].target.port, 4224);
        assert_eq!(plans[0].kinds, vec![Dialect::EventXml, Dialect::BasicIdJson]);
        assert_eq!(plans[1].target.port, 4225);
        assert_eq!(plans[1].kinds, vec![Dialect::StatusJson, Dialect::StatusXml]);

        let status_only = SimConfig {
            kinds: vec![Dialect::StatusXml],
            ..config
        };
        let plans = plan_channels(&status_only);
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].target.port, 4225);
    }

    #[tokio::test]
    async fn test_invalid_config_never_starts() {
        let config = SimConfig {
            interval_secs: 0.0,
            ..Default::default()
        };
        let res = run(config, CancellationToken::new()).await;
        assert!(matches!(res, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_setup_failure_is_fatal() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        let config = SimConfig {
            transport: TransportKind::PubSub,
            host: "127.0.0.1".into(),
            telemetry_port: port,
            status_port: port,
            ..Default::default()
        };
        let res = run(config, CancellationToken::new()).await;
        assert!(matches!(res, Err(Error::TransportSetup { .. })));
    }

    #[tokio::test]
    async fn test_run_publishes_until_cancelled() {
        lazy_init_tracing();
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();
        let config = SimConfig {
            transport: TransportKind::Broadcast,
            host: "127.0.0.1".into(),
            telemetry_port: port,
            status_port: port,
            interval_secs: 0.1,
            kinds: Dialect::ALL.to_vec(),
            seed: Some(11),
            ..Default::default()
        };
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(config, cancel.clone()));

        let mut buf = vec![0u8; 64 * 1024];
        let mut seen = Vec::new();
        for _ in 0..Dialect::ALL.len() {
            let (n, _) = tokio::time::timeout(Duration::from_secs(5), receiver.recv_from(&mut buf))
                .await
                .unwrap()
                .unwrap();
            seen.push(String::from_utf8(buf[..n].to_vec()).unwrap());
        }
        cancel.cancel();
        let reports = task.await.unwrap().unwrap();

        assert!(seen[0].starts_with("<event"));
        assert!(seen[1].starts_with('{'));
        assert!(seen[2].starts_with('{'));
        assert!(seen[3].starts_with("<event"));
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].state, LoopState::Stopped);
        assert!(reports[0].sent >= Dialect::ALL.len() as u64);
        assert_eq!(reports[0].failed, 0);
    }
}
