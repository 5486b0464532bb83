use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Identifies one asset request tracked by the loader.
/// Zero is reserved as the null handle.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, PartialOrd, Ord)]
pub struct LoadHandle(pub u64);

impl LoadHandle {
    pub const NULL: LoadHandle = LoadHandle(0);

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// Counts the fetches started for a single request. IO results are tagged with the generation they
/// were issued for, and anything older than the request's current fetch is discarded.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, PartialOrd, Ord, Default)]
pub struct FetchGeneration(pub u32);

impl FetchGeneration {
    pub fn next(self) -> Self {
        FetchGeneration(self.0.wrapping_add(1))
    }
}

/// Lifecycle of a request as seen by callers. Only the loader changes it.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum LoadState {
    // Nothing requested, or the request was unloaded/disabled
    #[default]
    Idle,
    // A fetch is in flight
    Loading,
    // The most recent fetch completed. The asset may be absent for resources that don't exist.
    Loaded,
    // The most recent fetch hit a transport, decode or timeout error
    Failed,
}

/// Shared flag that lets the loader abandon a fetch that IO is still working on.
///
/// IO implementations should check [`CancelToken::is_cancelled`] between units of work and stop
/// without reporting anything once it is set.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
