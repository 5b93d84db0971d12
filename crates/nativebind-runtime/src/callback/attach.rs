//! Per-thread attachment to the host runtime around callback reentry.
//!
//! Native code may call back into the host from threads the host never saw.
//! Every reentry is bracketed by an [`AttachGuard`]: the outermost entry on a
//! thread attaches if the thread was not already attached, nested entries
//! only bump a depth counter, and the outermost exit detaches only what it
//! attached itself.

use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use nativebind_core::HostFailure;
use rustc_hash::FxHashMap;
use tracing::trace;

/// The host runtime's per-thread execution context.
pub trait HostRuntime: Send + Sync {
    /// Whether the current thread already has an execution context.
    fn is_attached(&self) -> bool;

    /// Give the current thread an execution context.
    fn attach(&self) -> Result<(), HostFailure>;

    /// Drop the current thread's execution context.
    fn detach(&self);
}

#[derive(Debug, Default, Clone, Copy)]
struct AttachRecord {
    depth: usize,
    attached_here: bool,
}

/// Tracks callback nesting per thread and brackets it with attach/detach.
pub struct ThreadAttacher {
    runtime: Arc<dyn HostRuntime>,
    records: Mutex<FxHashMap<ThreadId, AttachRecord>>,
}

impl ThreadAttacher {
    /// Create an attacher over `runtime`.
    pub fn new(runtime: Arc<dyn HostRuntime>) -> Self {
        Self {
            runtime,
            records: Mutex::new(FxHashMap::default()),
        }
    }

    fn records(&self) -> MutexGuard<'_, FxHashMap<ThreadId, AttachRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enter a callback on the current thread.
    ///
    /// The returned guard must be dropped on the same thread; it is `!Send`.
    pub fn enter(&self) -> Result<AttachGuard<'_>, HostFailure> {
        let thread = thread::current().id();
        let mut records = self.records();
        let record = records.entry(thread).or_default();
        if record.depth == 0 && !self.runtime.is_attached() {
            if let Err(failure) = self.runtime.attach() {
                records.remove(&thread);
                return Err(failure);
            }
            record.attached_here = true;
            trace!(?thread, "attached native thread to host runtime");
        }
        record.depth += 1;
        Ok(AttachGuard {
            attacher: self,
            thread,
            _not_send: PhantomData,
        })
    }

    /// Callback nesting depth on the current thread.
    pub fn depth(&self) -> usize {
        let thread = thread::current().id();
        self.records().get(&thread).map_or(0, |r| r.depth)
    }

    /// Number of threads currently attached by this attacher.
    pub fn attached_threads(&self) -> usize {
        self.records().values().filter(|r| r.attached_here).count()
    }

    fn exit(&self, thread: ThreadId) {
        let detach = {
            let mut records = self.records();
            let Some(record) = records.get_mut(&thread) else {
                return;
            };
            record.depth = record.depth.saturating_sub(1);
            if record.depth > 0 {
                return;
            }
            let attached_here = record.attached_here;
            records.remove(&thread);
            attached_here
        };
        if detach {
            self.runtime.detach();
            trace!(?thread, "detached native thread from host runtime");
        }
    }
}

impl fmt::Debug for ThreadAttacher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadAttacher")
            .field("threads", &self.records().len())
            .finish_non_exhaustive()
    }
}

/// One level of callback nesting on one thread.
#[must_use = "dropping the guard ends the callback bracket"]
pub struct AttachGuard<'a> {
    attacher: &'a ThreadAttacher,
    thread: ThreadId,
    _not_send: PhantomData<*const ()>,
}

impl AttachGuard<'_> {
    /// The thread this guard brackets.
    pub fn thread(&self) -> ThreadId {
        self.thread
    }
}

impl Drop for AttachGuard<'_> {
    fn drop(&mut self) {
        self.attacher.exit(self.thread);
    }
}
