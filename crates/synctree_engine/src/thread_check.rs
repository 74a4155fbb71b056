//! Coordination-thread affinity checking.

use std::sync::OnceLock;
use std::thread::{self, ThreadId};

/// Binds to the first thread that calls it and flags calls from any
/// other thread. Entry points are expected to run on one designated
/// coordination thread; cross-thread invocation is a programming
/// error, not a race to tolerate.
#[derive(Debug, Default)]
pub(crate) struct ThreadChecker {
    bound: OnceLock<ThreadId>,
}

impl ThreadChecker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// True if the calling thread is the bound coordination thread.
    pub(crate) fn calling_thread_is_valid(&self) -> bool {
        let current = thread::current().id();
        *self.bound.get_or_init(|| current) == current
    }
}
