use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::time::Duration;

use cozyscan_common::config::{Config, FragmentFormat};
use cozyscan_common::network::device::DiscoveredDevice;
use cozyscan_common::network::target;
use cozyscan_core::report;
use cozyscan_core::scanner::{self, ScanResult};
use tokio::net::TcpListener;

use crate::utils::DeviceFleet;

fn config(port: u16, workers: usize) -> Config {
    Config {
        port,
        timeout: Duration::from_secs(2),
        workers,
        disable_input: true,
        ..Config::default()
    }
}

fn serials(result: &ScanResult) -> HashSet<String> {
    result.devices.iter().map(|d| d.serial.clone()).collect()
}

/// A single device on localhost is found and lands in the fragment.
#[tokio::test]
async fn discovery_single_loopback() -> anyhow::Result<()> {
    let localhost = Ipv4Addr::LOCALHOST;
    let fleet =
        DeviceFleet::spawn(localhost, HashMap::from([(localhost, "LOOP00ABCD".to_string())])).await?;

    let candidates = target::parse("127.0.0.1")?;
    let result = scanner::perform_discovery(&candidates, &config(fleet.port, 8), None).await;

    assert_eq!(result.scanned(), 1);
    assert_eq!(result.failures, 0);
    let device: &DiscoveredDevice = result.devices.first().expect("device on localhost");
    assert_eq!(device.serial, "LOOP00ABCD");
    assert_eq!(device.product_id, "dj7bvx");
    assert_eq!(device.ip, "127.0.0.1");

    let report = report::format(&result, FragmentFormat::Yaml);
    assert!(report.summary_text.contains("127.0.0.1 ✓ FOUND"));
    assert!(report.config_fragment.contains("- serial_number: LOOP00ABCD"));
    assert!(report.config_fragment.contains("alias: Device_ABCD"));
    assert!(report.config_fragment.contains("ip: 127.0.0.1"));
    Ok(())
}

/// A closed port yields no devices and an empty fragment.
#[tokio::test]
async fn discovery_closed_port_finds_nothing() -> anyhow::Result<()> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
    let port = listener.local_addr()?.port();
    drop(listener);

    let candidates = target::parse("127.0.0.1")?;
    let result = scanner::perform_discovery(&candidates, &config(port, 4), None).await;

    assert_eq!(result.scanned(), 1);
    assert!(result.devices.is_empty());
    assert!(report::device_entries(&result).is_empty());
    let report = report::format(&result, FragmentFormat::Yaml);
    assert!(report.config_fragment.ends_with("  devices: []\n"));
    assert!(report.summary_text.contains("127.0.0.1 ✗"));
    Ok(())
}

#[test]
fn malformed_specs_are_rejected_before_scanning() {
    let specs = [
        "",
        "192.168.1",
        "192.168.1.10-5",
        "10.0.0.0/33",
        "host.local",
        "10.0.0.1,10.0.0.2",
        "10.0.0.1-3,10.0.0.0/30",
        "010.0.0.1-5",
    ];
    for spec in specs {
        assert!(target::parse(spec).is_err(), "{spec:?} should not parse");
    }
}

/// Every 127.0.0.0/8 address reaches a wildcard listener on Linux, so one
/// fleet can stand in for a whole subnet.
#[cfg(target_os = "linux")]
mod loopback_subnet {
    use super::*;

    fn devices() -> HashMap<Ipv4Addr, String> {
        HashMap::from([
            (Ipv4Addr::new(127, 0, 0, 3), "SUBNET0003".to_string()),
            (Ipv4Addr::new(127, 0, 0, 77), "SUBNET0077".to_string()),
            (Ipv4Addr::new(127, 0, 0, 200), "SUBNET0200".to_string()),
        ])
    }

    #[tokio::test]
    async fn worker_count_does_not_change_what_is_found() -> anyhow::Result<()> {
        let fleet = DeviceFleet::spawn(Ipv4Addr::UNSPECIFIED, devices()).await?;
        let candidates = target::parse("127.0.0.1-254")?;
        assert_eq!(candidates.len(), 254);

        let sequential = scanner::perform_discovery(&candidates, &config(fleet.port, 1), None).await;
        let concurrent = scanner::perform_discovery(&candidates, &config(fleet.port, 64), None).await;

        assert_eq!(sequential.scanned(), 254);
        assert_eq!(concurrent.scanned(), 254);
        assert_eq!(serials(&sequential), serials(&concurrent));
        assert_eq!(
            serials(&concurrent),
            HashSet::from([
                "SUBNET0003".to_string(),
                "SUBNET0077".to_string(),
                "SUBNET0200".to_string(),
            ])
        );
        Ok(())
    }

    #[tokio::test]
    async fn cidr_scan_renders_fragment_in_address_order() -> anyhow::Result<()> {
        let fleet = DeviceFleet::spawn(Ipv4Addr::UNSPECIFIED, devices()).await?;
        let candidates = target::parse("127.0.0.0/24")?;
        assert_eq!(candidates.len(), 254);

        let result = scanner::perform_discovery(&candidates, &config(fleet.port, 32), None).await;
        let entries = report::device_entries(&result);
        let ips: Vec<&str> = entries.iter().map(|e| e.ip.as_str()).collect();
        assert_eq!(ips, vec!["127.0.0.3", "127.0.0.77", "127.0.0.200"]);
        assert_eq!(entries[1].alias, "Device_0077");

        let fragment = report::format(&result, FragmentFormat::Yaml).config_fragment;
        assert!(fragment.starts_with("hass_cozylife_local_pull:\n  lang: en\n  devices:\n"));
        assert_eq!(fragment.matches("- serial_number:").count(), 3);
        Ok(())
    }
}
