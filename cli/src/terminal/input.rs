use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::{sync::mpsc, thread};
use tracing::debug;

/// Watches the keyboard for 'q' or Ctrl-C while a scan runs.
///
/// Raw mode is on while the handle lives, so Ctrl-C arrives as a key press
/// rather than a signal.
pub struct InputHandle {
    rx: mpsc::Receiver<()>,
    tx: Option<mpsc::Sender<()>>,
}

impl InputHandle {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { rx, tx: Some(tx) }
    }

    pub fn start(&mut self) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        if let Err(e) = enable_raw_mode() {
            debug!("keyboard input disabled: {e}");
            return;
        }

        thread::spawn(move || {
            while let Ok(event) = event::read() {
                let Event::Key(key_event) = event else {
                    continue;
                };
                let is_q = key_event.code == KeyCode::Char('q');
                let is_ctrl_c = key_event.code == KeyCode::Char('c')
                    && key_event.modifiers.contains(KeyModifiers::CONTROL);

                if (is_q || is_ctrl_c) && key_event.kind == KeyEventKind::Press {
                    let _ = tx.send(());
                    break;
                }
            }
            let _ = disable_raw_mode();
        });
    }

    pub fn should_interrupt(&self) -> bool {
        self.rx.try_recv().is_ok()
    }
}

impl Drop for InputHandle {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}
