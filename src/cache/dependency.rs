//! External change triggers attached to cache entries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use log::trace;
use parking_lot::Mutex;

/// Validity marker for one completed cache generation.
///
/// Every successful factory run mints a fresh token and attaches the
/// dependencies registered during that run to it. Handles left over from a
/// replaced or evicted generation hold a dead weak reference and go inert
/// instead of invalidating a value they never guarded.
#[derive(Debug, Default)]
pub(crate) struct InvalidationToken {
    stale: AtomicBool,
}

impl InvalidationToken {
    pub(crate) fn mark_stale(&self) {
        self.stale.store(true, Ordering::Release);
    }

    pub(crate) fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }
}

/// Handle to an external change source, e.g. "this entry is stale once file
/// F changes".
///
/// A change-notification collaborator (typically a file watcher) holds the
/// handle and calls [`fire`] when the underlying fact changes. Firing marks
/// the single entry the dependency is currently attached to; it never
/// blocks, never recomputes, and never discards the stale value. The next
/// `get` for that key re-runs the factory.
///
/// [`fire`]: CacheDependency::fire
#[derive(Debug)]
pub struct CacheDependency {
    description: String,
    target: Mutex<Weak<InvalidationToken>>,
}

impl CacheDependency {
    /// Create an unattached dependency. `description` names the external
    /// fact being tracked, e.g. a watched file path.
    pub fn new(description: impl Into<String>) -> Arc<Self> {
        Arc::new(CacheDependency {
            description: description.into(),
            target: Mutex::new(Weak::new()),
        })
    }

    /// The external fact this dependency tracks.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Invalidate the entry this dependency is attached to.
    pub fn fire(&self) {
        if let Some(token) = self.target.lock().upgrade() {
            trace!("cache dependency fired: {}", self.description);
            token.mark_stale();
        }
    }

    /// True while the dependency guards a live entry generation.
    pub fn is_attached(&self) -> bool {
        self.target.lock().strong_count() > 0
    }

    /// Point this handle at a new entry generation. A dependency guards at
    /// most one entry at a time, so any previous attachment is replaced.
    pub(crate) fn attach(&self, token: &Arc<InvalidationToken>) {
        *self.target.lock() = Arc::downgrade(token);
    }
}
