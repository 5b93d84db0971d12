//! Adapters between host values and native container/value types.
//!
//! An adapter turns a host value (a handle, a host array, a string) into a
//! native representation that lives for exactly one call, and, for
//! read-back directions, copies the native result back into the host value
//! afterwards. Owned representations are wrapped in a [`Temporary`], which
//! releases them when it goes out of scope on every exit path.

mod index;
mod string;
mod vector;

use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::sync::Arc;

use tracing::trace;

use crate::Deallocator;

pub use index::{IndexCall, IndexResult, Indexed};
pub use string::StringAdapter;
pub use vector::VectorAdapter;

/// An owned native temporary, released when dropped.
///
/// The value lives in its own allocation and the deallocator's release
/// action is what drops it.
pub struct Temporary<N> {
    value: NonNull<N>,
    deallocator: Arc<Deallocator>,
}

impl<N: 'static> Temporary<N> {
    /// Move `value` into temporary storage; `label` names it in logs.
    pub fn new(value: N, label: &'static str) -> Self {
        let value = NonNull::from(Box::leak(Box::new(value)));
        let release = |address: usize| {
            // SAFETY: `address` is the box leaked above, released exactly once.
            drop(unsafe { Box::from_raw(address as *mut N) });
            Ok(())
        };
        Self {
            value,
            deallocator: Deallocator::new(value.as_ptr() as usize, label, release, None),
        }
    }
}

impl<N> Temporary<N> {
    /// The deallocator released when this temporary goes away.
    pub fn deallocator(&self) -> &Arc<Deallocator> {
        &self.deallocator
    }
}

impl<N> Deref for Temporary<N> {
    type Target = N;

    fn deref(&self) -> &N {
        // SAFETY: the storage is only released when `self` drops.
        unsafe { self.value.as_ref() }
    }
}

impl<N> DerefMut for Temporary<N> {
    fn deref_mut(&mut self) -> &mut N {
        // SAFETY: as in `deref`; `&mut self` is exclusive.
        unsafe { self.value.as_mut() }
    }
}

impl<N> Drop for Temporary<N> {
    fn drop(&mut self) {
        if self.deallocator.release_now() {
            trace!(label = self.deallocator.label(), "adapter temporary released");
        }
    }
}
