//! Fans a candidate list out to a [`Prober`] and collects what answers.
//!
//! The engine owns the only mutable state of a scan: every probe runs in its
//! own task and hands its outcome back through the [`JoinSet`], where a single
//! collector records it and forwards a [`ProbeEvent`] to whoever is watching.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cozyscan_common::config::Config;
use cozyscan_common::network::device::DiscoveredDevice;
use tokio::sync::Notify;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::network::tcp::{ProbeError, Prober, TcpProber};
use crate::protocol::ProbeOutcome;

/// Emitted once for every probe that completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeEvent {
    pub address: Ipv4Addr,
    pub found: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Devices in completion order.
    pub devices: Vec<DiscoveredDevice>,
    /// One record per completed probe, in completion order.
    pub outcomes: Vec<ProbeEvent>,
    /// Probes that failed locally and were counted as absent.
    pub failures: usize,
    /// Set when the scan was stopped before every candidate was probed.
    pub interrupted: bool,
}

impl ScanResult {
    pub fn scanned(&self) -> usize {
        self.outcomes.len()
    }
}

/// Cloneable stop flag shared between the engine and whoever may abort it.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.flag.store(true, Ordering::Relaxed);
        self.notify.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    async fn stopped(&self) {
        while !self.is_stopped() {
            self.notify.notified().await;
        }
    }
}

pub struct DiscoveryEngine<P> {
    prober: Arc<P>,
    workers: usize,
    stop_signal: StopSignal,
}

impl<P> DiscoveryEngine<P>
where
    P: Prober + 'static,
{
    /// `workers` bounds the probes in flight; `1` (or `0`) scans sequentially.
    pub fn new(prober: P, workers: usize) -> Self {
        Self {
            prober: Arc::new(prober),
            workers: workers.max(1),
            stop_signal: StopSignal::new(),
        }
    }

    pub fn stop_handle(&self) -> StopSignal {
        self.stop_signal.clone()
    }

    /// Probes every candidate once.
    ///
    /// Dropping the returned future aborts the probes in flight.
    pub async fn scan(
        &self,
        candidates: &[Ipv4Addr],
        events: Option<UnboundedSender<ProbeEvent>>,
    ) -> ScanResult {
        info!(
            candidates = candidates.len(),
            workers = self.workers,
            "starting discovery"
        );

        let mut collector = Collector::new(events);
        if self.workers == 1 {
            self.scan_sequential(candidates, &mut collector).await;
        } else {
            self.scan_concurrent(candidates, &mut collector).await;
        }

        let result = collector.finish();
        info!(
            scanned = result.scanned(),
            found = result.devices.len(),
            failures = result.failures,
            interrupted = result.interrupted,
            "discovery finished"
        );
        result
    }

    async fn scan_sequential(&self, candidates: &[Ipv4Addr], collector: &mut Collector) {
        for &addr in candidates {
            if self.stop_signal.is_stopped() {
                collector.interrupted();
                return;
            }

            let outcome = tokio::select! {
                outcome = self.prober.probe(addr) => outcome,
                _ = self.stop_signal.stopped() => {
                    collector.interrupted();
                    return;
                }
            };
            collector.record(addr, outcome);
        }
    }

    async fn scan_concurrent(&self, candidates: &[Ipv4Addr], collector: &mut Collector) {
        let mut pending = candidates.iter().copied();
        let mut tasks: JoinSet<(Ipv4Addr, Result<ProbeOutcome, ProbeError>)> = JoinSet::new();
        // lets a panicked task still be reported against its address
        let mut in_flight: HashMap<Id, Ipv4Addr> = HashMap::new();

        loop {
            while tasks.len() < self.workers && !self.stop_signal.is_stopped() {
                let Some(addr) = pending.next() else {
                    break;
                };
                let prober = Arc::clone(&self.prober);
                let handle = tasks.spawn(async move { (addr, prober.probe(addr).await) });
                in_flight.insert(handle.id(), addr);
            }

            if tasks.is_empty() {
                if self.stop_signal.is_stopped() && pending.next().is_some() {
                    collector.interrupted();
                }
                return;
            }

            tokio::select! {
                joined = tasks.join_next_with_id() => {
                    if let Some(joined) = joined {
                        collector.absorb(joined, &mut in_flight);
                    }
                }
                _ = self.stop_signal.stopped() => {
                    tasks.abort_all();
                    while let Some(joined) = tasks.join_next_with_id().await {
                        collector.absorb(joined, &mut in_flight);
                    }
                    collector.interrupted();
                    return;
                }
            }
        }
    }
}

/// Scans `candidates` with the TCP identify probe configured by `cfg`.
pub async fn perform_discovery(
    candidates: &[Ipv4Addr],
    cfg: &Config,
    events: Option<UnboundedSender<ProbeEvent>>,
) -> ScanResult {
    let engine = DiscoveryEngine::new(TcpProber::from(cfg), cfg.workers);
    engine.scan(candidates, events).await
}

struct Collector {
    result: ScanResult,
    events: Option<UnboundedSender<ProbeEvent>>,
}

impl Collector {
    fn new(events: Option<UnboundedSender<ProbeEvent>>) -> Self {
        Self {
            result: ScanResult::default(),
            events,
        }
    }

    fn record(&mut self, address: Ipv4Addr, outcome: Result<ProbeOutcome, ProbeError>) {
        let found = match outcome {
            Ok(ProbeOutcome::Found(device)) => {
                debug!(%address, serial = %device.serial, pid = %device.product_id, "device identified");
                self.result.devices.push(device);
                true
            }
            Ok(ProbeOutcome::Absent) => false,
            Err(e) => {
                warn!("{e}");
                self.result.failures += 1;
                false
            }
        };

        self.emit(ProbeEvent { address, found });
    }

    fn emit(&mut self, event: ProbeEvent) {
        self.result.outcomes.push(event);
        if let Some(tx) = &self.events {
            // a closed receiver only means nobody is watching
            let _ = tx.send(event);
        }
    }

    /// Aborted tasks leave no trace. A panicked task counts as a failure and
    /// as an absent outcome for the address it was probing.
    fn absorb(
        &mut self,
        joined: Result<(Id, (Ipv4Addr, Result<ProbeOutcome, ProbeError>)), JoinError>,
        in_flight: &mut HashMap<Id, Ipv4Addr>,
    ) {
        match joined {
            Ok((id, (address, outcome))) => {
                in_flight.remove(&id);
                self.record(address, outcome);
            }
            Err(e) => {
                let address = in_flight.remove(&e.id());
                if e.is_cancelled() {
                    return;
                }
                error!("probe task failed: {e}");
                self.result.failures += 1;
                if let Some(address) = address {
                    self.emit(ProbeEvent {
                        address,
                        found: false,
                    });
                }
            }
        }
    }

    fn interrupted(&mut self) {
        self.result.interrupted = true;
    }

    fn finish(self) -> ScanResult {
        self.result
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::io;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Answers as a device on `devices`, fails locally on `broken`, and is
    /// silent everywhere else. Latency varies per address so completion order
    /// differs from candidate order.
    struct FixtureProber {
        devices: HashSet<Ipv4Addr>,
        broken: HashSet<Ipv4Addr>,
        panicking: HashSet<Ipv4Addr>,
        stop_on: Option<(Ipv4Addr, StopSignal)>,
    }

    impl FixtureProber {
        fn new(devices: &[Ipv4Addr]) -> Self {
            Self {
                devices: devices.iter().copied().collect(),
                broken: HashSet::new(),
                panicking: HashSet::new(),
                stop_on: None,
            }
        }
    }

    #[async_trait]
    impl Prober for FixtureProber {
        async fn probe(&self, addr: Ipv4Addr) -> Result<ProbeOutcome, ProbeError> {
            let last = addr.octets()[3];
            tokio::time::sleep(Duration::from_millis(u64::from(last % 4))).await;

            if let Some((trigger, signal)) = &self.stop_on {
                if *trigger == addr {
                    signal.stop();
                }
            }
            if self.panicking.contains(&addr) {
                panic!("prober bug on {addr}");
            }
            if self.broken.contains(&addr) {
                return Err(ProbeError::Internal {
                    address: addr,
                    source: io::Error::other("no buffer space available"),
                });
            }
            if self.devices.contains(&addr) {
                return Ok(ProbeOutcome::Found(DiscoveredDevice {
                    serial: format!("SERIAL{last:04}"),
                    product_id: "p1".to_string(),
                    mac: None,
                    ip: addr.to_string(),
                    address: addr,
                }));
            }
            Ok(ProbeOutcome::Absent)
        }
    }

    /// Stays silent for a long time on every address.
    struct StallingProber;

    #[async_trait]
    impl Prober for StallingProber {
        async fn probe(&self, _addr: Ipv4Addr) -> Result<ProbeOutcome, ProbeError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(ProbeOutcome::Absent)
        }
    }

    fn full_24() -> Vec<Ipv4Addr> {
        (1..=254).map(|i| Ipv4Addr::new(10, 9, 8, i)).collect()
    }

    fn responders() -> Vec<Ipv4Addr> {
        vec![
            Ipv4Addr::new(10, 9, 8, 3),
            Ipv4Addr::new(10, 9, 8, 77),
            Ipv4Addr::new(10, 9, 8, 254),
        ]
    }

    fn device_set(result: &ScanResult) -> HashSet<DiscoveredDevice> {
        result.devices.iter().cloned().collect()
    }

    #[tokio::test]
    async fn device_set_is_independent_of_worker_count() {
        let candidates = full_24();

        let sequential = DiscoveryEngine::new(FixtureProber::new(&responders()), 1)
            .scan(&candidates, None)
            .await;
        let concurrent = DiscoveryEngine::new(FixtureProber::new(&responders()), 32)
            .scan(&candidates, None)
            .await;

        assert_eq!(sequential.devices.len(), 3);
        assert_eq!(concurrent.devices.len(), 3);
        assert_eq!(device_set(&sequential), device_set(&concurrent));
        assert_eq!(sequential.scanned(), 254);
        assert_eq!(concurrent.scanned(), 254);
        assert!(!sequential.interrupted && !concurrent.interrupted);
    }

    #[tokio::test]
    async fn sequential_scan_keeps_probe_order() {
        let result = DiscoveryEngine::new(FixtureProber::new(&responders()), 1)
            .scan(&full_24(), None)
            .await;
        let found: Vec<Ipv4Addr> = result.devices.iter().map(|d| d.address).collect();
        assert_eq!(found, responders());

        let probed: Vec<Ipv4Addr> = result.outcomes.iter().map(|e| e.address).collect();
        assert_eq!(probed, full_24());
    }

    #[tokio::test]
    async fn progress_event_per_candidate() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = DiscoveryEngine::new(FixtureProber::new(&responders()), 16)
            .scan(&full_24(), Some(tx))
            .await;

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert_eq!(events.len(), 254);
        assert_eq!(events.iter().filter(|e| e.found).count(), 3);
        let addresses: HashSet<Ipv4Addr> = events.iter().map(|e| e.address).collect();
        assert_eq!(addresses.len(), 254);
        assert_eq!(events, result.outcomes);
    }

    #[tokio::test]
    async fn local_failures_do_not_halt_the_scan() {
        let mut prober = FixtureProber::new(&responders());
        prober.broken.insert(Ipv4Addr::new(10, 9, 8, 10));
        prober.broken.insert(Ipv4Addr::new(10, 9, 8, 11));

        let result = DiscoveryEngine::new(prober, 8).scan(&full_24(), None).await;

        assert_eq!(result.failures, 2);
        assert_eq!(result.devices.len(), 3);
        assert_eq!(result.scanned(), 254);
    }

    #[tokio::test]
    async fn panicked_probe_is_still_counted_against_its_address() {
        let broken_addr = Ipv4Addr::new(10, 9, 8, 42);
        let mut prober = FixtureProber::new(&responders());
        prober.panicking.insert(broken_addr);

        let result = DiscoveryEngine::new(prober, 8).scan(&full_24(), None).await;

        assert_eq!(result.failures, 1);
        assert_eq!(result.scanned(), 254);
        assert_eq!(result.devices.len(), 3);
        let event = result
            .outcomes
            .iter()
            .find(|e| e.address == broken_addr)
            .unwrap();
        assert!(!event.found);
    }

    #[tokio::test]
    async fn empty_candidate_list() {
        let result = DiscoveryEngine::new(FixtureProber::new(&[]), 4).scan(&[], None).await;
        assert_eq!(result.scanned(), 0);
        assert!(result.devices.is_empty());
        assert!(!result.interrupted);
    }

    #[tokio::test]
    async fn stopped_engine_probes_nothing() {
        for workers in [1, 8] {
            let engine = DiscoveryEngine::new(FixtureProber::new(&responders()), workers);
            engine.stop_handle().stop();

            let result = engine.scan(&full_24(), None).await;
            assert!(result.interrupted);
            assert_eq!(result.scanned(), 0);
        }
    }

    #[tokio::test]
    async fn sequential_stop_leaves_remaining_candidates_unprobed() {
        let signal = StopSignal::new();
        let mut prober = FixtureProber::new(&responders());
        prober.stop_on = Some((Ipv4Addr::new(10, 9, 8, 5), signal.clone()));

        let mut engine = DiscoveryEngine::new(prober, 1);
        engine.stop_signal = signal;

        let result = engine.scan(&full_24(), None).await;
        assert!(result.interrupted);
        assert_eq!(result.scanned(), 5);
        assert_eq!(result.devices.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_stop_aborts_probes_in_flight() {
        let engine = DiscoveryEngine::new(StallingProber, 16);
        let stop = engine.stop_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            stop.stop();
        });

        let result = tokio::time::timeout(Duration::from_secs(5), engine.scan(&full_24(), None))
            .await
            .expect("stop should end the scan promptly");
        assert!(result.interrupted);
        assert_eq!(result.scanned(), 0);
    }

    #[tokio::test]
    async fn perform_discovery_on_closed_port_finds_nothing() {
        let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let cfg = Config {
            port,
            timeout: Duration::from_millis(500),
            ..Config::default()
        };
        let result = perform_discovery(&[Ipv4Addr::LOCALHOST], &cfg, None).await;
        assert_eq!(result.scanned(), 1);
        assert!(result.devices.is_empty());
        assert_eq!(result.failures, 0);
    }
}
