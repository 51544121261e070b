//! Discovery and identification of CozyLife devices.
//!
//! [`scanner::DiscoveryEngine`] fans a candidate list out to a [`network::tcp::Prober`],
//! [`protocol`] holds the identify handshake codec and [`report`] renders the results.

pub mod network;
pub mod protocol;
pub mod report;
pub mod scanner;
