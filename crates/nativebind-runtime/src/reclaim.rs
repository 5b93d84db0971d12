//! Automatic reclamation of unreachable handles.
//!
//! Dropping a handle without releasing it queues its deallocator reference
//! here. A background thread (or an explicit [`Reclaimer::sweep`]) drains
//! the queue and drops the references, running each release action exactly
//! once when the last one goes. Queue processing never blocks the thread
//! that dropped the handle.
//!
//! The sweeper only holds a weak reference between passes: once every
//! [`Reclaimer`] clone (and every handle bound to it) is gone, it exits.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};
use std::thread;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::Deallocator;

/// Reclaimer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReclaimerConfig {
    /// Spawn a background sweeper thread.
    pub background: bool,
    /// Name of the sweeper thread.
    pub thread_name: String,
    /// Maximum entries processed per background pass.
    pub batch_size: usize,
    /// How long the sweeper sleeps between passes.
    pub poll_interval: Duration,
}

impl Default for ReclaimerConfig {
    fn default() -> Self {
        Self {
            background: true,
            thread_name: "nativebind-reclaimer".to_string(),
            batch_size: 64,
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl ReclaimerConfig {
    /// Enable or disable the background thread.
    pub fn with_background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }

    /// Set the sweeper thread name.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Set the background batch size (at least 1).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set the pause between background passes.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Reclamation counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReclaimStats {
    /// Entries queued but not yet processed.
    pub pending: usize,
    /// Entries processed so far.
    pub processed: usize,
    /// Release actions run by reclamation.
    pub released: usize,
}

struct Shared {
    sender: Sender<Arc<Deallocator>>,
    receiver: Mutex<Receiver<Arc<Deallocator>>>,
    pending: AtomicUsize,
    processed: AtomicUsize,
    released: AtomicUsize,
    shutdown: AtomicBool,
    /// Dead once the sweeper thread has exited (or was never spawned).
    sweeper: Weak<()>,
    config: ReclaimerConfig,
}

impl Shared {
    /// Never blocks: the receiver lock is only held for `try_recv`.
    fn take_batch(&self, max: usize) -> Vec<Arc<Deallocator>> {
        let receiver = self.receiver.lock().unwrap_or_else(PoisonError::into_inner);
        let mut batch = Vec::new();
        while batch.len() < max {
            match receiver.try_recv() {
                Ok(entry) => batch.push(entry),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        batch
    }

    fn process(&self, entry: Arc<Deallocator>) {
        self.pending.fetch_sub(1, Ordering::AcqRel);
        self.processed.fetch_add(1, Ordering::AcqRel);
        if entry.reclaim_ref() {
            self.released.fetch_add(1, Ordering::AcqRel);
        }
    }

    fn drain(&self) -> usize {
        let mut count = 0;
        loop {
            let batch = self.take_batch(usize::MAX);
            if batch.is_empty() {
                return count;
            }
            count += batch.len();
            for entry in batch {
                self.process(entry);
            }
        }
    }
}

/// The reclamation queue.
///
/// Cloning is cheap and yields another handle to the same queue.
#[derive(Clone)]
pub struct Reclaimer {
    shared: Arc<Shared>,
}

impl Reclaimer {
    /// Create a reclaimer, spawning the sweeper thread if configured.
    ///
    /// If the thread cannot be spawned the reclaimer falls back to manual
    /// [`sweep`](Self::sweep)s.
    pub fn new(config: ReclaimerConfig) -> Self {
        let (sender, receiver) = mpsc::channel();
        let alive = Arc::new(());
        let shared = Arc::new(Shared {
            sender,
            receiver: Mutex::new(receiver),
            pending: AtomicUsize::new(0),
            processed: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
            sweeper: if config.background { Arc::downgrade(&alive) } else { Weak::new() },
            config,
        });

        if shared.config.background {
            let worker = Arc::downgrade(&shared);
            let spawned = thread::Builder::new()
                .name(shared.config.thread_name.clone())
                .spawn(move || sweeper(worker, alive));
            if let Err(error) = spawned {
                warn!(%error, "could not spawn reclaimer thread, falling back to manual sweeps");
            }
        }

        Self { shared }
    }

    /// A reclaimer without a background thread; call [`sweep`](Self::sweep).
    pub fn manual() -> Self {
        Self::new(ReclaimerConfig::default().with_background(false))
    }

    /// The process-wide reclaimer used by handles allocated without an explicit one.
    pub fn global() -> &'static Reclaimer {
        static GLOBAL: OnceLock<Reclaimer> = OnceLock::new();
        GLOBAL.get_or_init(|| Reclaimer::new(ReclaimerConfig::default()))
    }

    /// Queue one reference of an unreachable handle.
    ///
    /// After [`shutdown`](Self::shutdown) the reference is processed inline.
    pub fn enqueue(&self, entry: Arc<Deallocator>) {
        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        if self.shared.shutdown.load(Ordering::Acquire) {
            self.shared.process(entry);
            return;
        }
        if let Err(mpsc::SendError(entry)) = self.shared.sender.send(entry) {
            self.shared.process(entry);
        }
    }

    /// Process everything queued so far on the calling thread.
    ///
    /// Returns the number of entries processed.
    pub fn sweep(&self) -> usize {
        let count = self.shared.drain();
        if count > 0 {
            debug!(count, "reclaimer sweep");
        }
        count
    }

    /// Stop the background thread after it drains the queue.
    pub fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::Release);
    }

    /// Check if a background sweeper thread is running.
    pub fn is_sweeping(&self) -> bool {
        self.shared.sweeper.strong_count() > 0
    }

    /// Current counters.
    pub fn stats(&self) -> ReclaimStats {
        ReclaimStats {
            pending: self.shared.pending.load(Ordering::Acquire),
            processed: self.shared.processed.load(Ordering::Acquire),
            released: self.shared.released.load(Ordering::Acquire),
        }
    }

    /// The configuration this reclaimer was built with.
    pub fn config(&self) -> &ReclaimerConfig {
        &self.shared.config
    }
}

impl fmt::Debug for Reclaimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reclaimer")
            .field("config", &self.shared.config)
            .field("stats", &self.stats())
            .finish()
    }
}

/// `_alive` is dropped when the thread exits, which [`Reclaimer::is_sweeping`] observes.
fn sweeper(shared: Weak<Shared>, _alive: Arc<()>) {
    trace!("reclaimer started");
    loop {
        let Some(current) = shared.upgrade() else {
            trace!("reclaimer dropped, sweeper exiting");
            return;
        };
        if current.shutdown.load(Ordering::Acquire) {
            let remaining = current.drain();
            trace!(remaining, "reclaimer stopped");
            return;
        }
        loop {
            let batch = current.take_batch(current.config.batch_size);
            if batch.is_empty() {
                break;
            }
            for entry in batch {
                current.process(entry);
            }
        }
        let interval = current.config.poll_interval;
        drop(current);
        thread::sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn tracked(reclaimer: &Reclaimer, runs: &Arc<AtomicUsize>) -> Arc<Deallocator> {
        let runs = Arc::clone(runs);
        Deallocator::new(
            0x40,
            "free",
            move |_| {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            Some(reclaimer.clone()),
        )
    }

    #[test]
    fn manual_sweep_releases_last_reference() {
        let reclaimer = Reclaimer::manual();
        let runs = Arc::new(AtomicUsize::new(0));
        let dealloc = tracked(&reclaimer, &runs);
        dealloc.retain();

        reclaimer.enqueue(Arc::clone(&dealloc));
        assert_eq!(reclaimer.stats().pending, 1);
        assert_eq!(reclaimer.sweep(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        reclaimer.enqueue(Arc::clone(&dealloc));
        reclaimer.sweep();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(
            reclaimer.stats(),
            ReclaimStats {
                pending: 0,
                processed: 2,
                released: 1
            }
        );
    }

    #[test]
    fn sweep_on_empty_queue_is_noop() {
        assert_eq!(Reclaimer::manual().sweep(), 0);
    }

    #[test]
    fn shutdown_processes_inline() {
        let reclaimer = Reclaimer::manual();
        reclaimer.shutdown();
        let runs = Arc::new(AtomicUsize::new(0));
        let dealloc = tracked(&reclaimer, &runs);
        reclaimer.enqueue(dealloc);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    fn wait_until(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn dropped_reclaimer_stops_its_sweeper() {
        let reclaimer = Reclaimer::new(
            ReclaimerConfig::default()
                .with_thread_name("reclaimer-drop-test")
                .with_poll_interval(Duration::from_millis(1)),
        );
        assert!(reclaimer.is_sweeping());
        let sweeper = reclaimer.shared.sweeper.clone();

        // A queued entry holds its own clone of the reclaimer.
        let runs = Arc::new(AtomicUsize::new(0));
        reclaimer.enqueue(tracked(&reclaimer, &runs));
        drop(reclaimer);

        wait_until(|| sweeper.strong_count() == 0);
        assert_eq!(sweeper.strong_count(), 0);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn manual_reclaimer_has_no_sweeper() {
        assert!(!Reclaimer::manual().is_sweeping());
    }

    #[test]
    fn sweep_does_not_wait_on_background_pass() {
        let reclaimer = Reclaimer::new(ReclaimerConfig::default().with_poll_interval(Duration::from_secs(30)));
        let started = Instant::now();
        for _ in 0..20 {
            reclaimer.sweep();
        }
        assert!(started.elapsed() < Duration::from_secs(5));
        reclaimer.shutdown();
    }

    #[test]
    fn background_thread_reclaims() {
        let reclaimer = Reclaimer::new(
            ReclaimerConfig::default()
                .with_thread_name("reclaimer-test")
                .with_batch_size(4),
        );
        let runs = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            reclaimer.enqueue(tracked(&reclaimer, &runs));
        }

        let deadline = Instant::now() + Duration::from_secs(5);
        while runs.load(Ordering::SeqCst) < 10 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        reclaimer.shutdown();
        assert_eq!(runs.load(Ordering::SeqCst), 10);
    }
}
