/// Spinner announcing the steps of an evaluation, with the time each took
pub (super) struct Progress {
    bar: ProgressBar,
    current: Option<(String, Instant)>,
}

impl Progress {

    pub (super) fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(ProgressStyle::default_spinner()
                      .template("{spinner} [{elapsed_precise}] {msg}")
                      .unwrap_or_else(|_| ProgressStyle::default_spinner()));
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar, current: None }
    }

    /// Finish the current step, if any, and start the next one
    pub (super) fn step(&mut self, message: &str) {
        self.finish_step();
        self.bar.set_message(format!("{message} ..."));
        self.current = Some((message.to_string(), Instant::now()));
    }

    fn finish_step(&mut self) {
        if let Some((message, start)) = self.current.take() {
            self.bar.println(format!("{message}: {} ms", group_digits(start.elapsed().as_millis())));
        }
    }

    pub (super) fn done(mut self) {
        self.finish_step();
        self.bar.finish_and_clear();
    }
}

// ----- Imports -----------------------------------------------------------------------------------------
use std::time::{Duration, Instant};
use indicatif::{ProgressBar, ProgressStyle};
use dosithyroid::utils::group_digits;
