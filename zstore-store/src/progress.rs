//! Transfer progress bars
//!
//! Drivers own progress rendering; callers only pass a `quiet` flag
//! through. Bars are byte-denominated when the transfer size is known.

use indicatif::{ProgressBar, ProgressStyle};

/// Build a byte progress bar for a transfer of (optionally) known size.
pub(crate) fn transfer_bar(total: Option<u64>, message: &'static str) -> ProgressBar {
    let bar = match total {
        Some(len) => {
            let bar = ProgressBar::new(len);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta}) {msg}")
                    .unwrap()
                    .progress_chars("#>-"),
            );
            bar
        }
        None => ProgressBar::new_spinner(),
    };
    bar.set_message(message);
    bar
}
