// Busy indicator shown while a blocking child process runs.

use std::borrow::Cow;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Frames of the bouncing bar. The last entry is shown once finished.
const TICKS: &[&str] = &[
    "|....", ".|...", "..|..", "...|.", "....|", "...|.", "..|..", ".|...", "     ",
];

const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// A spinner that ticks on its own thread for as long as the value lives.
///
/// Dropping the guard stops the ticker and clears the line, so the spinner
/// ends on every exit path of the code it wraps, early returns included.
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    pub fn start(message: impl Into<Cow<'static, str>>) -> Self {
        let style = ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        let bar = ProgressBar::new_spinner();
        bar.set_style(style);
        bar.set_message(message);
        bar.enable_steady_tick(TICK_INTERVAL);
        Self { bar }
    }

    pub fn set_message(&self, message: impl Into<Cow<'static, str>>) {
        self.bar.set_message(message);
    }

    pub fn is_running(&self) -> bool {
        !self.bar.is_finished()
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

/// Run `f` with a spinner showing `message`.
pub fn with_spinner<T>(message: impl Into<Cow<'static, str>>, f: impl FnOnce() -> T) -> T {
    let _spinner = Spinner::start(message);
    f()
}
