//! Progress reporting for the scheduler and the file-statistics pass.
//!
//! The backend is picked from [`ProgressMode`] once per process and passed
//! down explicitly.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::io::config::ProgressMode;

const BAR_TEMPLATE: &str = "{prefix} [{elapsed_precise}] {wide_bar} {pos}/{len} ({eta})";

/// A progress sink counting completed units of work.
pub enum Progress {
    Bar(ProgressBar),
    Plain {
        label: String,
        total: u64,
        done: u64,
    },
    Hidden,
}

impl Progress {
    pub fn new(mode: ProgressMode, label: &str, total: u64) -> Self {
        match mode {
            ProgressMode::Bar => {
                let bar = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr());
                let style = ProgressStyle::with_template(BAR_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_bar());
                bar.set_style(style);
                bar.set_prefix(label.to_string());
                Self::Bar(bar)
            }
            ProgressMode::Plain => Self::Plain {
                label: label.to_string(),
                total,
                done: 0,
            },
            ProgressMode::Hidden => Self::Hidden,
        }
    }

    /// The announced total was too small; more work arrived.
    pub fn grow_to(&mut self, total: u64) {
        match self {
            Self::Bar(bar) => {
                if bar.length().is_some_and(|len| len < total) {
                    bar.set_length(total);
                }
            }
            Self::Plain { total: current, .. } => *current = (*current).max(total),
            Self::Hidden => {}
        }
    }

    pub fn inc(&mut self) {
        match self {
            Self::Bar(bar) => bar.inc(1),
            Self::Plain { label, total, done } => {
                *done += 1;
                eprintln!("{label}: {done}/{total}");
            }
            Self::Hidden => {}
        }
    }

    pub fn finish(self) {
        if let Self::Bar(bar) = self {
            bar.finish_and_clear();
        }
    }

    pub fn position(&self) -> u64 {
        match self {
            Self::Bar(bar) => bar.position(),
            Self::Plain { done, .. } => *done,
            Self::Hidden => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_counts_and_grows() {
        let mut progress = Progress::new(ProgressMode::Plain, "modules", 1);
        progress.inc();
        progress.grow_to(3);
        progress.inc();
        assert_eq!(progress.position(), 2);
        match &progress {
            Progress::Plain { total, .. } => assert_eq!(*total, 3),
            _ => panic!("plain mode"),
        }
        progress.finish();
    }

    #[test]
    fn bar_tracks_position() {
        let mut progress = Progress::new(ProgressMode::Bar, "modules", 2);
        progress.inc();
        progress.grow_to(5);
        assert_eq!(progress.position(), 1);
        if let Progress::Bar(bar) = &progress {
            assert_eq!(bar.length(), Some(5));
        }
        progress.finish();
    }

    #[test]
    fn hidden_is_silent() {
        let mut progress = Progress::new(ProgressMode::Hidden, "modules", 2);
        progress.inc();
        assert_eq!(progress.position(), 0);
    }
}
