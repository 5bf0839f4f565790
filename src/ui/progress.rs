use indicatif::ProgressBar;

/// Progress bar for the bulk-load phase.
///
/// Hidden when stdout is not a terminal, so piped and test runs stay quiet.
pub struct LoadProgress {
    pb: ProgressBar,
}

impl LoadProgress {
    pub fn new(total_rows: u64) -> Self {
        let pb = ProgressBar::new(total_rows).with_message("Inserting rows");
        let pb = if console::Term::stdout().is_term() {
            pb
        } else {
            ProgressBar::hidden()
        };
        Self { pb }
    }

    pub fn inc(&self) {
        self.pb.inc(1);
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}
