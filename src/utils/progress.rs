use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Console progress for multi-station runs. Silent mode keeps the refinery
/// usable from cron and tests, where a tty bar is just noise.
pub struct ProgressReporter {
    bar: Option<ProgressBar>,
    silent: bool,
}

impl ProgressReporter {
    pub fn new(total: u64, message: &str, silent: bool) -> Self {
        if silent {
            return Self {
                bar: None,
                silent: true,
            };
        }
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{msg}\n{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
                )
                .unwrap()
                .progress_chars("#>-"),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        Self {
            bar: Some(pb),
            silent: false,
        }
    }

    pub fn new_spinner(message: &str, silent: bool) -> Self {
        if silent {
            return Self {
                bar: None,
                silent: true,
            };
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap(),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        Self {
            bar: Some(pb),
            silent: false,
        }
    }

    pub fn increment(&self, delta: u64) {
        if let Some(ref pb) = self.bar {
            pb.inc(delta);
        }
    }

    pub fn set_message(&self, message: &str) {
        if let Some(ref pb) = self.bar {
            pb.set_message(message.to_string());
        }
    }

    pub fn finish_with_message(&self, message: &str) {
        if let Some(ref pb) = self.bar {
            pb.finish_with_message(message.to_string());
        }
    }

    /// Print above the bar without tearing it.
    pub fn println(&self, message: &str) {
        if self.silent {
            return;
        }
        if let Some(ref pb) = self.bar {
            pb.println(message);
        } else {
            println!("{message}");
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if let Some(ref pb) = self.bar {
            pb.finish();
        }
    }
}
