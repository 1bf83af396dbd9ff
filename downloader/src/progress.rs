/// Terminal progress: one overall bar plus a byte bar per active download.
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Longest filename shown before truncation.
const LABEL_WIDTH: usize = 20;

#[derive(Clone)]
pub struct ProgressReporter {
    multi: MultiProgress,
    overall: ProgressBar,
}

impl ProgressReporter {
    /// Create the reporter for `total` tasks. Hidden bars still count, they just don't draw.
    pub fn new(total: u64, visible: bool) -> Self {
        let target = if visible {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        let multi = MultiProgress::with_draw_target(target);

        let overall = multi.add(ProgressBar::new(total));
        overall.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{elapsed_precise}] [{bar:40.green/white}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        overall.set_message("Overall Progress");

        Self { multi, overall }
    }

    /// Add a byte bar for one file.
    pub fn file_bar(&self, filename: &str, size: u64) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new(size));
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg:<23} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓▒░  "),
        );
        pb.set_message(short_label(filename));
        pb
    }

    /// One more task reached a terminal state.
    pub fn task_finished(&self) {
        self.overall.inc(1);
    }

    pub fn finished_count(&self) -> u64 {
        self.overall.position()
    }

    pub fn finish(&self) {
        self.overall.finish();
    }
}

/// Filename cut to the label width, with `...` when shortened.
pub fn short_label(filename: &str) -> String {
    if filename.chars().count() > LABEL_WIDTH {
        let head: String = filename.chars().take(LABEL_WIDTH).collect();
        format!("{}...", head)
    } else {
        filename.to_string()
    }
}
