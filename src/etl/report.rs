/// Outcome counts for one loader pass. Per-entity failures do not abort a
/// pass, so a report can carry both successes and failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl LoadReport {
    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    /// True when every attempted entity loaded.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

impl std::fmt::Display for LoadReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Success={}, Failed={}, Attempted={}",
            self.succeeded, self.failed, self.attempted
        )
    }
}
