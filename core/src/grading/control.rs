use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Receives `(completed, total, label)` after every finished unit of work.
/// Implementations must not block.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, done: usize, total: usize, label: &str);
}

/// Cooperative cancellation, polled at stage boundaries and between units.
pub trait CancelToken: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _done: usize, _total: usize, _label: &str) {}
}

/// Writes progress to the log at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&self, done: usize, total: usize, label: &str) {
        log::debug!("{}: {}/{}", label, done, total);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl CancelToken for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// A settable flag shared by every clone.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl CancelToken for CancelFlag {
    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl<F> ProgressReporter for F
where
    F: Fn(usize, usize, &str) + Send + Sync,
{
    fn report(&self, done: usize, total: usize, label: &str) {
        self(done, total, label)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn cancel_flag_is_shared_between_clones() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(!other.is_cancelled());
        flag.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn closures_are_reporters() {
        let seen = Mutex::new(Vec::new());
        let reporter = |done: usize, total: usize, label: &str| {
            seen.lock().unwrap().push(format!("{} {}/{}", label, done, total))
        };
        reporter.report(1, 2, "[Q1] Compiling");
        assert_eq!(*seen.lock().unwrap(), vec!["[Q1] Compiling 1/2"]);
    }
}
