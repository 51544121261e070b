//! End-to-end tests: range parsing, discovery against fake devices on
//! loopback, and report rendering.

#[cfg(test)]
mod discovery;
#[cfg(test)]
mod utils;
