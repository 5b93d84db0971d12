//! Shared, exactly-once native cleanup.
//!
//! A [`Deallocator`] is bound to one native address and may be referenced by
//! several handles at once. Each handle holds one reference; the release
//! action runs when the last reference goes away (explicitly, or through the
//! [`Reclaimer`]) and never more than once.
//!
//! Reference counting stays inside the runtime: outside code observes a
//! deallocator but can only release storage through the handles holding it.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::Reclaimer;

/// A failure reported by a release action.
///
/// Never surfaced to callers: release can run on the reclamation thread,
/// where nobody is waiting for a result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ReleaseFailure(pub String);

impl ReleaseFailure {
    /// Create a release failure.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The native release routine for one address.
pub type ReleaseAction = Box<dyn FnOnce(usize) -> Result<(), ReleaseFailure> + Send>;

/// Shared cleanup for one native address.
pub struct Deallocator {
    address: usize,
    label: &'static str,
    refs: AtomicUsize,
    released: AtomicBool,
    auto_release: AtomicBool,
    action: Mutex<Option<ReleaseAction>>,
    reclaimer: Option<Reclaimer>,
}

impl Deallocator {
    /// Create a deallocator with one reference.
    ///
    /// `label` names the release routine in logs (`free`, `delete`, `delete[]`, ...).
    /// Unreferenced handles are handed to `reclaimer`; with `None` they are
    /// reclaimed inline when dropped.
    pub(crate) fn new<F>(address: usize, label: &'static str, action: F, reclaimer: Option<Reclaimer>) -> Arc<Self>
    where
        F: FnOnce(usize) -> Result<(), ReleaseFailure> + Send + 'static,
    {
        Arc::new(Self {
            address,
            label,
            refs: AtomicUsize::new(1),
            released: AtomicBool::new(false),
            auto_release: AtomicBool::new(true),
            action: Mutex::new(Some(Box::new(action))),
            reclaimer,
        })
    }

    /// The address this deallocator releases.
    pub fn address(&self) -> usize {
        self.address
    }

    /// The release routine's name.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Number of live handle references.
    pub fn ref_count(&self) -> usize {
        self.refs.load(Ordering::Acquire)
    }

    /// Check if the release action has run (or been consumed).
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Whether unreferenced handles trigger the release action.
    pub fn auto_release(&self) -> bool {
        self.auto_release.load(Ordering::Acquire)
    }

    /// Never run the release action from automatic reclamation.
    pub fn disable_auto_release(&self) {
        self.auto_release.store(false, Ordering::Release);
    }

    /// The reclaimer unreferenced handles are queued on.
    pub fn reclaimer(&self) -> Option<&Reclaimer> {
        self.reclaimer.as_ref()
    }

    /// Add a handle reference. Returns the new count.
    pub(crate) fn retain(&self) -> usize {
        self.refs.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Drop one reference on explicit release.
    ///
    /// Runs the release action if this was the last reference. Returns true
    /// if the action ran during this call.
    pub(crate) fn release_ref(&self) -> bool {
        self.drop_ref(true)
    }

    /// Drop one reference on behalf of an unreachable handle.
    ///
    /// Same as [`release_ref`](Self::release_ref), but honors
    /// [`disable_auto_release`](Self::disable_auto_release).
    pub(crate) fn reclaim_ref(&self) -> bool {
        self.drop_ref(self.auto_release())
    }

    fn drop_ref(&self, run: bool) -> bool {
        let previous = self
            .refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        match previous {
            Ok(1) if run => self.release_now(),
            Ok(1) => {
                debug!(address = self.address, label = self.label, "auto release disabled, leaving native storage");
                false
            }
            _ => false,
        }
    }

    /// Run the release action now, whatever the reference count.
    ///
    /// Exactly one caller ever wins; later calls are no-ops returning false.
    /// A failing or panicking action is logged and swallowed. Handles still
    /// referencing the storage report [`ResourceError::Released`](nativebind_core::ResourceError::Released) afterwards.
    pub(crate) fn release_now(&self) -> bool {
        if self
            .released
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let action = self.action.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(action) = action else {
            return true;
        };

        match panic::catch_unwind(AssertUnwindSafe(|| action(self.address))) {
            Ok(Ok(())) => trace!(address = self.address, label = self.label, "native storage released"),
            Ok(Err(error)) => {
                warn!(address = self.address, label = self.label, %error, "release action failed")
            }
            Err(_) => warn!(address = self.address, label = self.label, "release action panicked"),
        }
        true
    }
}

impl fmt::Debug for Deallocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deallocator")
            .field("address", &format_args!("{:#x}", self.address))
            .field("label", &self.label)
            .field("refs", &self.ref_count())
            .field("released", &self.is_released())
            .field("auto_release", &self.auto_release())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn counting(counter: &Arc<AtomicUsize>) -> impl FnOnce(usize) -> Result<(), ReleaseFailure> + Send + 'static {
        let counter = Arc::clone(counter);
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn last_reference_releases() {
        let runs = Arc::new(AtomicUsize::new(0));
        let dealloc = Deallocator::new(0x10, "free", counting(&runs), None);
        dealloc.retain();
        assert!(!dealloc.release_ref());
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(dealloc.release_ref());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(dealloc.is_released());
    }

    #[test]
    fn release_now_runs_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let dealloc = Deallocator::new(0x10, "free", counting(&runs), None);
        assert!(dealloc.release_now());
        assert!(!dealloc.release_now());
        assert!(!dealloc.release_ref());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reference_count_never_underflows() {
        let dealloc = Deallocator::new(0x10, "free", |_| Ok(()), None);
        assert!(dealloc.release_ref());
        assert!(!dealloc.release_ref());
        assert_eq!(dealloc.ref_count(), 0);
    }

    #[test]
    fn disabled_auto_release_skips_reclamation_only() {
        let runs = Arc::new(AtomicUsize::new(0));
        let dealloc = Deallocator::new(0x10, "free", counting(&runs), None);
        dealloc.disable_auto_release();
        assert!(!dealloc.reclaim_ref());
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        // Explicit release still works.
        assert!(dealloc.release_now());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failing_action_is_swallowed() {
        let dealloc = Deallocator::new(0x10, "delete", |_| Err(ReleaseFailure::new("boom")), None);
        assert!(dealloc.release_ref());
        assert!(dealloc.is_released());
    }

    #[test]
    fn panicking_action_is_swallowed() {
        let dealloc = Deallocator::new(0x10, "delete", |_| panic!("native destructor threw"), None);
        assert!(dealloc.release_now());
        assert!(dealloc.is_released());
    }

    #[test]
    fn concurrent_release_runs_exactly_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let dealloc = Deallocator::new(0x10, "free", counting(&runs), None);
        for _ in 0..7 {
            dealloc.retain();
        }

        let workers: Vec<_> = (0..8)
            .map(|i| {
                let dealloc = Arc::clone(&dealloc);
                thread::spawn(move || {
                    if i % 2 == 0 {
                        dealloc.release_ref();
                    } else {
                        dealloc.reclaim_ref();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(dealloc.ref_count(), 0);
    }
}
