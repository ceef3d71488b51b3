use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::error::{Result, StatsError};

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Debug)]
pub struct StatsOptions {
    /// Distinct categorical values held in memory before counts spill to disk.
    pub max_in_memory_distinct: usize,
    /// Frequencies reported per categorical column.
    pub top_n: usize,
    pub cancel: Option<CancelToken>,
    /// Checked at pass boundaries only.
    pub deadline: Option<Instant>,
    /// Directory for spill files; the system temp dir when unset.
    pub spill_dir: Option<PathBuf>,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self {
            max_in_memory_distinct: 4096,
            top_n: 10,
            cancel: None,
            deadline: None,
            spill_dir: None,
        }
    }
}

impl StatsOptions {
    /// Called once before every full pass over a column.
    pub(crate) fn check(&self) -> Result<()> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(StatsError::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(StatsError::DeadlineExceeded);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn checks_cancel_before_deadline() {
        let token = CancelToken::new();
        let options = StatsOptions {
            cancel: Some(token.clone()),
            deadline: Some(Instant::now() - Duration::from_secs(1)),
            ..StatsOptions::default()
        };
        assert!(matches!(options.check(), Err(StatsError::DeadlineExceeded)));
        token.cancel();
        assert!(matches!(options.check(), Err(StatsError::Cancelled)));
        assert!(StatsOptions::default().check().is_ok());
    }
}
