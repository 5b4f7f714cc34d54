// Terminal progress bar implementing ProgressLoadingView

use crate::work::contracts::{LoadingView, ProgressLoadingView};
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

const BAR_WIDTH: usize = 30;

struct BarState<W> {
    writer: W,
    running: bool,
    fraction: f32,
}

/// Renders `[#########          ]  45%` on a single line of `W`.
///
/// Start and end are idempotent. Write errors are logged and otherwise ignored
/// so a closed terminal never affects the work.
pub struct ConsoleLoadingView<W: Write + Send> {
    state: Mutex<BarState<W>>,
}

impl ConsoleLoadingView<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write + Send> ConsoleLoadingView<W> {
    pub fn new(writer: W) -> Self {
        Self {
            state: Mutex::new(BarState {
                writer,
                running: false,
                fraction: 0.0,
            }),
        }
    }

    /// Recover the underlying writer.
    pub fn into_writer(self) -> W {
        self.state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .writer
    }

    fn lock(&self) -> MutexGuard<'_, BarState<W>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn render(fraction: f32) -> String {
    let filled = (fraction * BAR_WIDTH as f32).round() as usize;
    let filled = filled.min(BAR_WIDTH);
    format!(
        "\r[{}{}] {:>3.0}%",
        "#".repeat(filled),
        " ".repeat(BAR_WIDTH - filled),
        fraction * 100.0
    )
}

fn draw<W: Write>(state: &mut BarState<W>, suffix: &str) {
    let line = render(state.fraction);
    if let Err(e) = write!(state.writer, "{}{}", line, suffix).and_then(|_| state.writer.flush()) {
        tracing::warn!("Failed to draw progress bar: {}", e);
    }
}

impl<W: Write + Send> LoadingView for ConsoleLoadingView<W> {
    fn is_running(&self) -> bool {
        self.lock().running
    }

    fn start(&self) {
        let mut state = self.lock();
        if state.running {
            return;
        }
        state.running = true;
        state.fraction = 0.0;
        draw(&mut state, "");
    }

    fn end(&self) {
        let mut state = self.lock();
        if !state.running {
            return;
        }
        state.running = false;
        draw(&mut state, "\n");
    }
}

impl<W: Write + Send> ProgressLoadingView for ConsoleLoadingView<W> {
    fn set_progress(&self, fraction: f32) {
        let mut state = self.lock();
        state.fraction = fraction.clamp(0.0, 1.0);
        if state.running {
            draw(&mut state, "");
        }
    }
}
