//! Shared models for cozyscan: target parsing, discovered devices and the
//! scan configuration handed from the command line to the core.

pub mod config;
pub mod error;
pub mod network;
