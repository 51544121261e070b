use std::io::{self, Write};
use std::sync::OnceLock;
use std::time::Duration;

use colored::*;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::terminal::colors;

const STOP_TIP: &str = "You can press 'q' to finish early";

pub(crate) static SPINNER: OnceLock<ProgressBar> = OnceLock::new();

/// The shared progress bar. Hidden until [`start_scan`] shows it.
pub fn get_spinner() -> &'static ProgressBar {
    SPINNER.get_or_init(ProgressBar::hidden)
}

fn scan_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.blue} {bar:24.green/bright_black} {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━╸━")
        .tick_strings(&[
            "▁▁▁▁▁",
            "▁▂▂▂▁",
            "▁▄▂▄▁",
            "▂▄▆▄▂",
            "▄▆█▆▄",
            "▂▄▆▄▂",
            "▁▄▂▄▁",
            "▁▂▂▂▁",
        ])
}

pub fn start_scan(total: usize, show_tip: bool, q_level: u8) {
    if q_level > 0 {
        return;
    }
    let pb = get_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(scan_style());
    pb.set_length(total as u64);
    pb.set_position(0);
    if show_tip {
        pb.set_message(format!("{}", STOP_TIP.italic().white()));
    }
    pb.enable_steady_tick(Duration::from_millis(100));
}

pub fn report_discovery_progress(scanned: usize, found: usize) {
    let pb = get_spinner();
    pb.set_position(scanned as u64);
    pb.set_message(
        format!(
            "Identified {} so far...",
            format!("{found} devices").green().bold()
        )
        .color(colors::TEXT_DEFAULT)
        .to_string(),
    );
}

pub fn finish() {
    let pb = get_spinner();
    pb.finish_and_clear();
    pb.set_draw_target(ProgressDrawTarget::hidden());
}

/// Log sink that prints above the progress bar.
pub struct SpinnerWriter;

impl Write for SpinnerWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        get_spinner().suspend(|| io::stderr().write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}
