//! Host-implemented callbacks exposed to native code.
//!
//! Generated code carries a fixed number of trampolines per callback
//! declaration. Allocating a [`Callback`] claims one of them and binds the
//! host logic to it; releasing the callback frees the slot again. Native code
//! enters through [`CallbackTable::dispatch`], which brackets the host logic
//! with thread attachment and translates host failures into native ones.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use nativebind_core::{Annotations, ClassDecl, ClassFlags, HostFailure, NativeException};
use tracing::{debug, warn};

use super::{CallFrame, ThreadAttacher};
use crate::Deallocator;

/// Host logic behind a callback.
pub trait CallbackFn: Send + Sync {
    fn call(&self, frame: &mut CallFrame) -> Result<(), HostFailure>;
}

impl<F> CallbackFn for F
where
    F: Fn(&mut CallFrame) -> Result<(), HostFailure> + Send + Sync,
{
    fn call(&self, frame: &mut CallFrame) -> Result<(), HostFailure> {
        (self)(frame)
    }
}

/// The translation rules of one callback declaration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallbackBinding {
    /// Qualified host name, for diagnostics.
    pub name: String,
    /// Declared native failure kinds; the first one is thrown.
    pub throws: Vec<String>,
    /// A failure in the host logic is fatal.
    pub no_exception: bool,
}

impl CallbackBinding {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn throws(mut self, kind: impl Into<String>) -> Self {
        self.throws.push(kind.into());
        self
    }

    pub fn no_exception(mut self, no_exception: bool) -> Self {
        self.no_exception = no_exception;
        self
    }

    /// Derive the binding from a callback class.
    ///
    /// Failure kinds declared on the call method come before the class's own.
    pub fn from_decl(class: &ClassDecl) -> Self {
        let call = class.call_methods().next();
        let mut throws: Vec<String> = call.map(|m| m.throws.clone()).unwrap_or_default();
        throws.extend(class.throws.iter().cloned());
        let no_exception = class.flags.contains(ClassFlags::NO_EXCEPTION)
            || call.is_some_and(|m| m.flags.contains(Annotations::NO_EXCEPTION));
        Self {
            name: class.host_name.clone(),
            throws,
            no_exception,
        }
    }
}

struct Slot {
    binding: CallbackBinding,
    body: Arc<dyn CallbackFn>,
}

/// The trampoline slots of one callback declaration.
pub struct CallbackTable {
    attacher: Arc<ThreadAttacher>,
    slots: Mutex<Vec<Option<Arc<Slot>>>>,
}

impl CallbackTable {
    /// Trampolines generated per callback declaration unless configured otherwise.
    pub const DEFAULT_SLOTS: usize = 10;

    /// Create a table with [`Self::DEFAULT_SLOTS`] slots.
    pub fn new(attacher: Arc<ThreadAttacher>) -> Arc<Self> {
        Self::with_slots(attacher, Self::DEFAULT_SLOTS)
    }

    /// Create a table with `count` slots.
    pub fn with_slots(attacher: Arc<ThreadAttacher>, count: usize) -> Arc<Self> {
        Arc::new(Self {
            attacher,
            slots: Mutex::new((0..count).map(|_| None).collect()),
        })
    }

    fn slots(&self) -> MutexGuard<'_, Vec<Option<Arc<Slot>>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.slots().len()
    }

    /// Number of slots bound to host logic.
    pub fn in_use(&self) -> usize {
        self.slots().iter().filter(|s| s.is_some()).count()
    }

    /// The thread attacher used around every dispatch.
    pub fn attacher(&self) -> &Arc<ThreadAttacher> {
        &self.attacher
    }

    /// Bind `body` to a free slot.
    ///
    /// When every slot is taken the returned callback is null.
    pub fn allocate<F>(self: &Arc<Self>, binding: CallbackBinding, body: F) -> Callback
    where
        F: CallbackFn + 'static,
    {
        let claimed = {
            let mut slots = self.slots();
            let free = slots.iter().position(Option::is_none);
            if let Some(index) = free {
                slots[index] = Some(Arc::new(Slot {
                    binding: binding.clone(),
                    body: Arc::new(body),
                }));
            }
            free
        };

        let Some(slot) = claimed else {
            warn!(callback = %binding.name, capacity = self.capacity(), "no free callback slot");
            return Callback::null(Arc::clone(self));
        };
        debug!(callback = %binding.name, slot, "callback bound");

        let table = Arc::downgrade(self);
        let deallocator = Deallocator::new(
            slot_token(slot),
            "callback",
            move |_| {
                if let Some(table) = table.upgrade() {
                    table.free(slot);
                }
                Ok(())
            },
            None,
        );
        Callback {
            table: Arc::clone(self),
            slot: Some(slot),
            deallocator: Some(deallocator),
        }
    }

    fn free(&self, slot: usize) {
        if let Some(entry) = self.slots().get_mut(slot) {
            *entry = None;
        }
    }

    /// Invoke the host logic bound to `slot`, as a trampoline would.
    ///
    /// # Panics
    ///
    /// Panics when the host logic fails and the declaration is marked
    /// no-exception: there is no channel to report such a failure.
    pub fn dispatch(&self, slot: usize, frame: &mut CallFrame) -> Result<(), NativeException> {
        let entry = self.slots().get(slot).cloned().flatten().ok_or_else(|| {
            HostFailure::new(format!("callback slot {slot} is not bound")).into_native(&[])
        })?;
        let _guard = self
            .attacher
            .enter()
            .map_err(|failure| failure.into_native(&entry.binding.throws))?;
        match entry.body.call(frame) {
            Ok(()) => Ok(()),
            Err(failure) if entry.binding.no_exception => {
                panic!("{} failed in no-exception callback: {}", entry.binding.name, failure.message)
            }
            Err(failure) => {
                debug!(callback = %entry.binding.name, message = %failure.message, "callback failed");
                Err(failure.into_native(&entry.binding.throws))
            }
        }
    }
}

impl fmt::Debug for CallbackTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackTable")
            .field("capacity", &self.capacity())
            .field("in_use", &self.in_use())
            .finish()
    }
}

/// Trampoline address token for `slot`; never zero.
pub(crate) fn slot_token(slot: usize) -> usize {
    slot + 1
}

/// Handle to a host callback bound to a trampoline slot.
///
/// Clones share the slot; it is freed when the last clone is released or
/// dropped.
pub struct Callback {
    table: Arc<CallbackTable>,
    slot: Option<usize>,
    deallocator: Option<Arc<Deallocator>>,
}

impl Callback {
    fn null(table: Arc<CallbackTable>) -> Self {
        Self {
            table,
            slot: None,
            deallocator: None,
        }
    }

    /// Whether no slot backs this callback.
    pub fn is_null(&self) -> bool {
        self.slot.is_none()
    }

    /// The trampoline slot.
    pub fn slot(&self) -> Option<usize> {
        self.slot
    }

    /// The trampoline address token, zero when null.
    pub fn address(&self) -> usize {
        self.slot.map_or(0, slot_token)
    }

    /// The table this callback belongs to.
    pub fn table(&self) -> &Arc<CallbackTable> {
        &self.table
    }

    /// Shared deallocator freeing the slot.
    pub fn deallocator(&self) -> Option<&Arc<Deallocator>> {
        self.deallocator.as_ref()
    }

    /// Invoke through the trampoline, as native code would.
    pub fn invoke(&self, frame: &mut CallFrame) -> Result<(), NativeException> {
        match self.slot {
            Some(slot) => self.table.dispatch(slot, frame),
            None => Err(HostFailure::new("null callback").into_native(&[])),
        }
    }

    /// Drop this reference; frees the slot when it was the last one.
    pub fn release(&mut self) -> bool {
        self.slot = None;
        self.deallocator.take().is_some_and(|d| d.release_ref())
    }
}

impl Clone for Callback {
    fn clone(&self) -> Self {
        if let Some(deallocator) = &self.deallocator {
            deallocator.retain();
        }
        Self {
            table: Arc::clone(&self.table),
            slot: self.slot,
            deallocator: self.deallocator.clone(),
        }
    }
}

impl Drop for Callback {
    fn drop(&mut self) {
        if let Some(deallocator) = self.deallocator.take() {
            deallocator.reclaim_ref();
        }
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback").field("slot", &self.slot).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::attach::tests::CountingRuntime;
    use crate::callback::NativeValue;
    use nativebind_core::MethodDecl;
    use nativebind_core::error::DEFAULT_NATIVE_KIND;
    use std::sync::atomic::Ordering;

    fn table(slots: usize) -> (Arc<CountingRuntime>, Arc<CallbackTable>) {
        let runtime = Arc::new(CountingRuntime::default());
        let attacher = Arc::new(ThreadAttacher::new(runtime.clone()));
        (runtime, CallbackTable::with_slots(attacher, slots))
    }

    fn doubler(frame: &mut CallFrame) -> Result<(), HostFailure> {
        let value = frame.int(0)?;
        frame.set_return(value * 2);
        Ok(())
    }

    #[test]
    fn dispatch_runs_host_logic_attached() {
        let (runtime, table) = table(2);
        let callback = table.allocate(CallbackBinding::new("Doubler"), doubler);
        let mut frame = CallFrame::new([21i64.into()]);
        callback.invoke(&mut frame).unwrap();
        assert_eq!(frame.into_return(), NativeValue::Int(42));
        assert_eq!(runtime.attaches.load(Ordering::SeqCst), 1);
        assert_eq!(runtime.detaches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn first_declared_kind_is_thrown() {
        let (_, table) = table(1);
        let binding = CallbackBinding::new("Cb").throws("std::invalid_argument").throws("std::range_error");
        let callback = table.allocate(binding, |_: &mut CallFrame| -> Result<(), HostFailure> { Err(HostFailure::new("bad input")) });
        let err = callback.invoke(&mut CallFrame::default()).unwrap_err();
        assert_eq!(err, NativeException::new("std::invalid_argument", "bad input"));
    }

    #[test]
    fn undeclared_failures_become_runtime_errors() {
        let (_, table) = table(1);
        let callback = table.allocate(CallbackBinding::new("Cb"), |_: &mut CallFrame| -> Result<(), HostFailure> { Err(HostFailure::new("oops")) });
        let err = callback.invoke(&mut CallFrame::default()).unwrap_err();
        assert_eq!(err.kind, DEFAULT_NATIVE_KIND);
    }

    #[test]
    #[should_panic(expected = "no-exception callback")]
    fn no_exception_failure_is_fatal() {
        let (_, table) = table(1);
        let binding = CallbackBinding::new("Cb").no_exception(true);
        let callback = table.allocate(binding, |_: &mut CallFrame| -> Result<(), HostFailure> { Err(HostFailure::new("boom")) });
        let _ = callback.invoke(&mut CallFrame::default());
    }

    #[test]
    fn recursive_dispatch_attaches_once() {
        let (runtime, table) = table(2);
        let inner = table.allocate(CallbackBinding::new("Inner"), doubler);
        let outer = table.allocate(CallbackBinding::new("Outer"), move |frame: &mut CallFrame| -> Result<(), HostFailure> {
            let mut nested = CallFrame::new([frame.int(0)?.into()]);
            inner.invoke(&mut nested).map_err(|e| HostFailure::new(e.message))?;
            frame.set_return(nested.into_return());
            Ok(())
        });
        let mut frame = CallFrame::new([5i64.into()]);
        outer.invoke(&mut frame).unwrap();
        assert_eq!(frame.into_return(), NativeValue::Int(10));
        assert_eq!(runtime.attaches.load(Ordering::SeqCst), 1);
        assert_eq!(runtime.detaches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn slots_are_reused_after_release() {
        let (_, table) = table(1);
        let mut first = table.allocate(CallbackBinding::new("A"), doubler);
        let shared = first.clone();
        assert!(table.allocate(CallbackBinding::new("B"), doubler).is_null());

        assert!(!first.release());
        assert_eq!(table.in_use(), 1);
        drop(shared);
        assert_eq!(table.in_use(), 0);

        let second = table.allocate(CallbackBinding::new("C"), doubler);
        assert_eq!(second.slot(), Some(0));
        assert_eq!(second.address(), 1);
    }

    #[test]
    fn binding_from_declaration() {
        let class = ClassDecl::callback("Listener")
            .throws("std::logic_error")
            .method(MethodDecl::call().throws("std::invalid_argument"));
        let binding = CallbackBinding::from_decl(&class);
        assert_eq!(binding.throws, vec!["std::invalid_argument", "std::logic_error"]);
        assert!(!binding.no_exception);

        let quiet = ClassDecl::callback("Quiet").flags(ClassFlags::NO_EXCEPTION).method(MethodDecl::call());
        assert!(CallbackBinding::from_decl(&quiet).no_exception);
    }
}
