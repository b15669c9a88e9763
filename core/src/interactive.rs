use std::{collections::HashMap, sync::Mutex};

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::grading::ProgressReporter;

pub mod util {
    use dialoguer::{theme::ColorfulTheme, Confirm};
    use std::io;

    fn theme() -> ColorfulTheme {
        ColorfulTheme::default()
    }

    pub fn confirm(prompt: &str) -> io::Result<bool> {
        Confirm::with_theme(&theme())
            .with_prompt(prompt)
            .default(false)
            .interact()
    }
}

/// One progress bar per stage label, stacked in the terminal.
pub struct BarProgress {
    container: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
    style: ProgressStyle,
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl BarProgress {
    pub fn new() -> Self {
        let style = ProgressStyle::default_bar()
            .template("{spinner} {msg:<28} [{bar:30.cyan/blue}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        Self {
            container: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
            style,
        }
    }

    /// Stops every bar that has not reached its end, e.g. after cancellation.
    pub fn abandon_all(&self) {
        let Ok(bars) = self.bars.lock() else {
            return;
        };
        for bar in bars.values().filter(|b| !b.is_finished()) {
            bar.abandon();
        }
    }
}

impl ProgressReporter for BarProgress {
    fn report(&self, done: usize, total: usize, label: &str) {
        let Ok(mut bars) = self.bars.lock() else {
            return;
        };
        let bar = bars.entry(label.to_owned()).or_insert_with(|| {
            self.container
                .add(ProgressBar::new(total as u64))
                .with_style(self.style.clone())
                .with_message(label.to_owned())
        });
        bar.set_length(total as u64);
        bar.set_position(done as u64);
        if done >= total {
            bar.finish();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use indicatif::ProgressDrawTarget;

    #[test]
    fn one_bar_per_label() {
        let p = BarProgress::new();
        p.container.set_draw_target(ProgressDrawTarget::hidden());
        p.report(1, 3, "[Q1] Compiling");
        p.report(2, 3, "[Q1] Compiling");
        p.report(1, 1, "[Q2] Compiling");

        let bars = p.bars.lock().unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars["[Q1] Compiling"].position(), 2);
        assert!(!bars["[Q1] Compiling"].is_finished());
        assert!(bars["[Q2] Compiling"].is_finished());
    }
}
