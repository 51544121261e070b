use std::io::IsTerminal;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use colored::*;
use cozyscan_common::config::{Config, FragmentFormat};
use cozyscan_common::network::target::AddressRange;
use cozyscan_core::network::tcp::TcpProber;
use cozyscan_core::report::{self, Report};
use cozyscan_core::scanner::{DiscoveryEngine, ProbeEvent, ScanResult};
use tokio::sync::mpsc;
use tracing::{Instrument, info, info_span};

use crate::terminal::input::InputHandle;
use crate::terminal::{colors, print, spinner};

const INPUT_POLL: Duration = Duration::from_millis(100);

pub async fn discover(range: &AddressRange, cfg: &Config) -> anyhow::Result<()> {
    let candidates: Vec<Ipv4Addr> = range.candidates();
    if cfg.quiet == 0 {
        print::print_status(format!(
            "Scanning {} IP addresses for CozyLife devices on port {}",
            candidates.len().to_string().color(colors::ACCENT).bold(),
            cfg.port
        ));
    }

    let start_time: Instant = Instant::now();
    let result: ScanResult = run_scan(&candidates, cfg)
        .instrument(info_span!("discovery", target = %range))
        .await;

    discovery_ends(&result, start_time.elapsed(), cfg);
    Ok(())
}

/// Drives the engine while feeding the spinner and watching for a stop request.
async fn run_scan(candidates: &[Ipv4Addr], cfg: &Config) -> ScanResult {
    let engine = DiscoveryEngine::new(TcpProber::from(cfg), cfg.workers);
    let stop = engine.stop_handle();
    let (tx, mut rx) = mpsc::unbounded_channel::<ProbeEvent>();

    let mut input: Option<InputHandle> = None;
    if !cfg.disable_input && std::io::stdin().is_terminal() && cfg.quiet == 0 {
        let mut handle = InputHandle::new();
        handle.start();
        input = Some(handle);
    }
    spinner::start_scan(candidates.len(), input.is_some(), cfg.quiet);

    let mut scanned: usize = 0;
    let mut found: usize = 0;
    let mut track = |event: ProbeEvent| {
        scanned += 1;
        if event.found {
            found += 1;
        }
        spinner::report_discovery_progress(scanned, found);
    };

    let scan = engine.scan(candidates, Some(tx));
    tokio::pin!(scan);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut input_tick = tokio::time::interval(INPUT_POLL);

    let result = loop {
        tokio::select! {
            result = &mut scan => break result,
            Some(event) = rx.recv() => track(event),
            _ = &mut ctrl_c, if !stop.is_stopped() => {
                info!("interrupt received, stopping");
                stop.stop();
            }
            _ = input_tick.tick(), if input.is_some() && !stop.is_stopped() => {
                if input.as_ref().is_some_and(InputHandle::should_interrupt) {
                    info!("stop requested from keyboard");
                    stop.stop();
                }
            }
        }
    };

    drop(input);
    while let Ok(event) = rx.try_recv() {
        track(event);
    }
    spinner::finish();
    result
}

fn discovery_ends(result: &ScanResult, total_time: Duration, cfg: &Config) {
    let report: Report = report::format(result, cfg.fragment_format);

    if cfg.quiet < 2 {
        print::header("scan results", cfg.quiet);
        for line in report.summary_text.lines() {
            print::summary_line(line);
        }
        if result.devices.is_empty() {
            print::no_results();
        }
    }

    print::header("configuration", cfg.quiet);
    if cfg.quiet < 2 && cfg.fragment_format == FragmentFormat::Yaml {
        print::print(&format!(
            "{}",
            "# Copy-paste this into your configuration.yaml:".dimmed()
        ));
    }
    for line in report.config_fragment.lines() {
        print::print(line);
    }

    print_summary(result.devices.len(), total_time, cfg);
}

fn print_summary(devices: usize, total_time: Duration, cfg: &Config) {
    if cfg.quiet > 0 {
        return;
    }
    let found: ColoredString = format!("{devices} devices").bold().green();
    let total_time: ColoredString = format!("{:.2}s", total_time.as_secs_f64()).bold().yellow();
    let output: String = format!("Discovery Complete: {found} identified in {total_time}");

    print::fat_separator(cfg.quiet);
    print::centerln(&output);
}
