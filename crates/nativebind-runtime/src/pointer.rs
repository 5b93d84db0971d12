//! Typed handles over native memory.
//!
//! A [`Pointer`] is the host-side proxy for a native address. It carries a
//! logical window over the elements behind that address:
//!
//! - `position`: the element index operations are relative to,
//! - `limit`: exclusive end of the valid elements (`0` means "one element"
//!   for element and bulk operations),
//! - `capacity`: the number of elements the allocation holds,
//!
//! and, for owned storage, a shared [`Deallocator`]. Every operation checks
//! the window before touching memory: a null address fails with
//! [`ResourceError::NullReference`], an extent outside the window fails
//! with [`ResourceError::InvalidRange`]. Nothing is ever clamped.
//!
//! Handles sharing an address alias the same native memory, so a handle
//! never leaves its thread (`Pointer` is neither `Send` nor `Sync`) and
//! element access copies values in and out. The borrowed views
//! ([`as_slice`](Pointer::as_slice) and friends) are `unsafe`: no aliasing
//! handle may write the viewed range while a view is alive.
//!
//! A handle whose deallocator has run reports [`ResourceError::Released`]
//! from every access, whichever handle released it.

use std::alloc::{self, Layout};
use std::any::type_name;
use std::ffi::{CStr, c_char, c_void};
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::{self, NonNull};
use std::slice;
use std::sync::Arc;

use nativebind_core::ResourceError;
use tracing::debug;

use crate::abi::{self, HandleDescriptor};
use crate::{Address, Deallocator, NativeBool, PlainData, Reclaimer, ReleaseFailure};

/// A handle to native storage holding elements of type `T`.
///
/// Handles stay on the thread that made them:
///
/// ```compile_fail
/// fn send<T: Send>(_: T) {}
/// send(nativebind_runtime::IntPointer::null());
/// ```
pub struct Pointer<T> {
    address: usize,
    position: usize,
    limit: usize,
    capacity: usize,
    /// Elements known to be initialized behind `address` (allocated or adopted storage).
    extent: Option<usize>,
    deallocator: Option<Arc<Deallocator>>,
    released: bool,
    _marker: PhantomData<(T, *const ())>,
}

impl<T> Pointer<T> {
    /// A handle denoting "no object".
    pub const fn null() -> Self {
        Self {
            address: 0,
            position: 0,
            limit: 0,
            capacity: 0,
            extent: None,
            deallocator: None,
            released: false,
            _marker: PhantomData,
        }
    }

    /// Wrap an externally owned address. No deallocator is attached.
    ///
    /// # Safety
    ///
    /// `address` must be null, or aligned for `T` and point to initialized
    /// values covering every element later accessed through this handle,
    /// for as long as the handle (or any handle shared from it) is used.
    pub unsafe fn wrap(address: usize) -> Self {
        let mut handle = Self::null();
        handle.address = address;
        handle
    }

    /// Take ownership of `count` elements at `address`, releasing them with `action`.
    ///
    /// A null `address` yields a null handle and drops `action` unrun.
    ///
    /// # Safety
    ///
    /// `address` must be null, or aligned for `T` and point to at least
    /// `max(count, 1)` initialized values that stay valid until `action` runs.
    pub unsafe fn adopt<F>(
        address: usize,
        count: usize,
        label: &'static str,
        action: F,
        reclaimer: Option<&Reclaimer>,
    ) -> Self
    where
        F: FnOnce(usize) -> Result<(), ReleaseFailure> + Send + 'static,
    {
        if address == 0 {
            return Self::null();
        }
        Self {
            address,
            position: 0,
            limit: count,
            capacity: count,
            extent: Some(count.max(1)),
            deallocator: Some(Deallocator::new(address, label, action, reclaimer.cloned())),
            released: false,
            _marker: PhantomData,
        }
    }

    /// Rebuild a handle from a descriptor filled in by generated code.
    ///
    /// When the descriptor names an owner routine, the handle owns the
    /// storage and the routine becomes its release action.
    ///
    /// # Safety
    ///
    /// Same contract as [`adopt`](Self::adopt) for owned descriptors and
    /// [`wrap`](Self::wrap) otherwise.
    pub unsafe fn from_descriptor(descriptor: &HandleDescriptor, reclaimer: Option<&Reclaimer>) -> Self {
        let address = descriptor.address as usize;
        let capacity = abi::to_usize(descriptor.capacity);
        let mut handle = match descriptor.owner {
            Some(release) => {
                let action = move |address: usize| {
                    // SAFETY: the owner routine was produced for exactly this address.
                    unsafe { release(address as *mut c_void) };
                    Ok(())
                };
                // SAFETY: forwarded from the caller.
                unsafe { Self::adopt(address, capacity, "native", action, reclaimer) }
            }
            // SAFETY: forwarded from the caller.
            None => unsafe { Self::wrap(address) },
        };
        handle.position = abi::to_usize(descriptor.position);
        handle.limit = abi::to_usize(descriptor.limit);
        handle.capacity = capacity;
        handle
    }

    /// A new handle on the same address sharing the same deallocator.
    ///
    /// Sharing a released handle yields a null handle.
    pub fn share_from(other: &Pointer<T>) -> Self {
        if other.is_released() {
            return Self::null();
        }
        if let Some(dealloc) = &other.deallocator {
            dealloc.retain();
        }
        Self {
            address: other.address,
            position: other.position,
            limit: other.limit,
            capacity: other.capacity,
            extent: other.extent,
            deallocator: other.deallocator.clone(),
            released: false,
            _marker: PhantomData,
        }
    }

    /// Check if the address is null.
    pub fn is_null(&self) -> bool {
        self.address == 0
    }

    /// The native address.
    pub fn address(&self) -> usize {
        self.address
    }

    /// The address of the element at `position` (null for null handles).
    pub fn element_address(&self) -> usize {
        if self.is_null() {
            return 0;
        }
        self.address
            .wrapping_add(self.position.wrapping_mul(mem::size_of::<T>()))
    }

    /// Current position.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Current limit.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Current capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Set the position.
    pub fn set_position(&mut self, position: usize) -> &mut Self {
        self.position = position;
        self
    }

    /// Set the limit.
    pub fn set_limit(&mut self, limit: usize) -> &mut Self {
        self.limit = limit;
        self
    }

    /// Set the capacity.
    pub fn set_capacity(&mut self, capacity: usize) -> &mut Self {
        self.capacity = capacity;
        self
    }

    /// Elements in `[position, limit)`.
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.position)
    }

    /// Check if this handle was released, or its storage released through another handle.
    pub fn is_released(&self) -> bool {
        self.released || self.deallocator.as_ref().is_some_and(|d| d.is_released())
    }

    /// The attached deallocator, if any.
    pub fn deallocator(&self) -> Option<&Arc<Deallocator>> {
        self.deallocator.as_ref()
    }

    /// Number of handles referencing this handle's deallocator (0 without one).
    pub fn deallocator_count(&self) -> usize {
        self.deallocator.as_ref().map_or(0, |d| d.ref_count())
    }

    /// Release this handle's reference now.
    ///
    /// Runs the release action if this was the last reference. The handle is
    /// unusable afterwards. Returns true if native storage was released.
    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;
        self.address = 0;
        self.extent = None;
        self.deallocator.take().is_some_and(|d| d.release_ref())
    }

    /// Never release this handle's storage automatically.
    ///
    /// The flag lives on the deallocator and so applies to every handle
    /// sharing it. Explicit [`release`](Self::release) still works.
    pub fn disable_auto_release(&mut self) -> &mut Self {
        if let Some(dealloc) = &self.deallocator {
            dealloc.disable_auto_release();
        }
        self
    }

    /// The descriptor passed to generated functions.
    pub fn descriptor(&self) -> HandleDescriptor {
        HandleDescriptor {
            address: self.address as *mut c_void,
            position: abi::to_isize(self.position),
            limit: abi::to_isize(self.limit),
            capacity: abi::to_isize(self.capacity),
            owner: None,
        }
    }

    /// Read back a descriptor after a native call.
    ///
    /// When native code replaced the storage (a container grew past its
    /// capacity), the handle moves to the new address: its reference to the
    /// old storage is dropped and the descriptor's owner routine, if any,
    /// becomes the release action for the new one. Otherwise only position,
    /// limit, and capacity are read back.
    ///
    /// # Safety
    ///
    /// `descriptor` must have been filled in by generated code for this
    /// handle; a changed address falls under [`from_descriptor`](Self::from_descriptor)'s contract.
    pub unsafe fn sync_from(&mut self, descriptor: &HandleDescriptor) -> &mut Self {
        let address = descriptor.address as usize;
        if address == self.address {
            self.position = abi::to_usize(descriptor.position);
            self.limit = abi::to_usize(descriptor.limit);
            self.capacity = abi::to_usize(descriptor.capacity);
            return self;
        }

        debug!(from = self.address, to = address, element = type_name::<T>(), "native storage replaced");
        let reclaimer = self.deallocator.as_ref().and_then(|d| d.reclaimer()).cloned();
        // SAFETY: forwarded from the caller.
        let replacement = unsafe { Self::from_descriptor(descriptor, reclaimer.as_ref()) };
        // Dropping the old handle gives up its reference to the old storage.
        *self = replacement;
        self
    }

    fn base(&self) -> Result<*mut T, ResourceError> {
        if self.is_released() {
            return Err(ResourceError::Released);
        }
        if self.address == 0 {
            return Err(ResourceError::NullReference);
        }
        Ok(self.address as *mut T)
    }

    fn effective_limit(&self) -> usize {
        self.limit.max(1)
    }

    fn invalid(&self, requested: usize) -> ResourceError {
        ResourceError::InvalidRange {
            position: self.position,
            limit: self.limit,
            requested,
        }
    }

    /// Validate `len` elements starting `offset` past `position` against an end bound.
    fn span_to(&self, end_bound: usize, offset: usize, len: usize) -> Result<(*mut T, usize), ResourceError> {
        let base = self.base()?;
        let requested = offset.saturating_add(len);
        let start = self.position.checked_add(offset).ok_or_else(|| self.invalid(requested))?;
        let end = start.checked_add(len).ok_or_else(|| self.invalid(requested))?;
        let overflows_capacity = self.capacity != 0 && self.limit > self.capacity;
        let overflows_extent = self.extent.is_some_and(|extent| end > extent);
        if self.position > end_bound || end > end_bound || overflows_capacity || overflows_extent {
            return Err(self.invalid(requested));
        }
        Ok((base, start))
    }

    fn span(&self, offset: usize, len: usize) -> Result<(*mut T, usize), ResourceError> {
        self.span_to(self.effective_limit(), offset, len)
    }

    /// Callers keep the reference inside one runtime call, with no other
    /// handle touched while it lives.
    pub(crate) fn element_ref(&self) -> Result<&T, ResourceError> {
        let (base, start) = self.span(0, 1)?;
        // SAFETY: the span check keeps `start` inside initialized storage.
        Ok(unsafe { &*base.add(start) })
    }

    pub(crate) fn element_mut(&mut self) -> Result<&mut T, ResourceError> {
        let (base, start) = self.span(0, 1)?;
        // SAFETY: as above.
        Ok(unsafe { &mut *base.add(start) })
    }

    /// View `[position, limit)` (one element when `limit == 0`).
    ///
    /// # Safety
    ///
    /// While the slice lives, no handle sharing this storage may write the
    /// viewed range or release the storage.
    pub unsafe fn as_slice(&self) -> Result<&[T], ResourceError> {
        let len = self.effective_limit().checked_sub(self.position).ok_or_else(|| self.invalid(0))?;
        let (base, start) = self.span(0, len)?;
        // SAFETY: the span check keeps the whole range inside initialized storage.
        Ok(unsafe { slice::from_raw_parts(base.add(start), len) })
    }

    /// Mutable view of `[position, limit)` (one element when `limit == 0`).
    ///
    /// # Safety
    ///
    /// While the slice lives, no handle sharing this storage may read or
    /// write the viewed range or release the storage.
    pub unsafe fn as_mut_slice(&mut self) -> Result<&mut [T], ResourceError> {
        let len = self.effective_limit().checked_sub(self.position).ok_or_else(|| self.invalid(0))?;
        let (base, start) = self.span(0, len)?;
        // SAFETY: as in `as_slice`.
        Ok(unsafe { slice::from_raw_parts_mut(base.add(start), len) })
    }

    /// View exactly `[position, limit)`, empty when `limit == position`.
    ///
    /// # Safety
    ///
    /// Same contract as [`as_slice`](Self::as_slice).
    pub unsafe fn remaining_slice(&self) -> Result<&[T], ResourceError> {
        let len = self.limit.checked_sub(self.position).ok_or_else(|| self.invalid(0))?;
        let (base, start) = self.span_to(self.limit, 0, len)?;
        if len == 0 {
            return Ok(&[]);
        }
        // SAFETY: the span check keeps the whole range inside initialized storage.
        Ok(unsafe { slice::from_raw_parts(base.add(start), len) })
    }

    /// Elements the storage can hold from `position` on.
    pub(crate) fn room(&self) -> usize {
        let end = match self.extent {
            Some(extent) => extent,
            None if self.capacity > 0 => self.capacity,
            None => self.effective_limit(),
        };
        end.saturating_sub(self.position)
    }
}

impl<T: Clone> Pointer<T> {
    /// Read the element at `position + index`.
    pub fn get(&self, index: usize) -> Result<T, ResourceError> {
        let (base, start) = self.span(index, 1)?;
        // SAFETY: checked by `span`.
        Ok(unsafe { (*base.add(start)).clone() })
    }

    /// Write the element at `position + index`.
    pub fn put(&mut self, index: usize, value: T) -> Result<&mut Self, ResourceError> {
        let (base, start) = self.span(index, 1)?;
        // SAFETY: checked by `span`; assignment drops the previous value.
        unsafe { *base.add(start) = value };
        Ok(self)
    }

    /// Read the element at `position`.
    pub fn value(&self) -> Result<T, ResourceError> {
        self.get(0)
    }

    /// Write the element at `position`.
    pub fn set_value(&mut self, value: T) -> Result<&mut Self, ResourceError> {
        self.put(0, value)
    }

    /// Copy `len` elements from `position` on into `dst[offset..offset + len]`.
    pub fn read_into(&self, dst: &mut [T], offset: usize, len: usize) -> Result<(), ResourceError> {
        let target = host_range(dst.len(), offset, len)?;
        let (base, start) = self.span(0, len)?;
        for (i, slot) in dst[target].iter_mut().enumerate() {
            // SAFETY: checked by `span`.
            *slot = unsafe { (*base.add(start + i)).clone() };
        }
        Ok(())
    }

    /// Copy `src[offset..offset + len]` into the elements from `position` on.
    pub fn write_from(&mut self, src: &[T], offset: usize, len: usize) -> Result<&mut Self, ResourceError> {
        let source = host_range(src.len(), offset, len)?;
        let (base, start) = self.span(0, len)?;
        for (i, value) in src[source].iter().enumerate() {
            // SAFETY: checked by `span`.
            unsafe { *base.add(start + i) = value.clone() };
        }
        Ok(self)
    }

    /// Copy `[position, limit)` out (one element when `limit == 0`).
    pub fn to_vec(&self) -> Result<Vec<T>, ResourceError> {
        // SAFETY: the view ends before anything else can run on this thread.
        Ok(unsafe { self.as_slice() }?.to_vec())
    }

    /// Copy exactly `[position, limit)` out.
    pub fn remaining_vec(&self) -> Result<Vec<T>, ResourceError> {
        // SAFETY: as in `to_vec`.
        Ok(unsafe { self.remaining_slice() }?.to_vec())
    }

    /// Assign the element at `other`'s position into this handle's position
    /// (the native `operator=`).
    pub fn assign(&mut self, other: &Pointer<T>) -> Result<&mut Self, ResourceError> {
        let value = other.value()?;
        self.set_value(value)
    }
}

impl<T: Clone + Default + Send + 'static> Pointer<T> {
    /// Allocate `size` default-initialized elements, reclaimed by the global reclaimer.
    ///
    /// A failed allocation yields a null handle instead of an error.
    pub fn allocate(size: usize) -> Self {
        Self::allocate_in(size, Reclaimer::global())
    }

    /// Allocate `size` default-initialized elements, reclaimed by `reclaimer`.
    pub fn allocate_in(size: usize, reclaimer: &Reclaimer) -> Self {
        let count = size.max(1);
        let Ok(layout) = Layout::array::<T>(count) else {
            debug!(size, element = type_name::<T>(), "allocation size overflow");
            return Self::null();
        };
        let base = if layout.size() == 0 {
            NonNull::<T>::dangling().as_ptr()
        } else {
            // SAFETY: non-zero layout.
            unsafe { alloc::alloc(layout) as *mut T }
        };
        if base.is_null() {
            debug!(size, element = type_name::<T>(), "native allocation failed");
            return Self::null();
        }
        for i in 0..count {
            // SAFETY: `base` holds `count` uninitialized slots.
            unsafe { base.add(i).write(T::default()) };
        }

        let label = if mem::needs_drop::<T>() { "delete[]" } else { "free" };
        let release = move |address: usize| {
            let base = address as *mut T;
            // SAFETY: `address` is the allocation made above, released exactly once.
            unsafe {
                for i in 0..count {
                    ptr::drop_in_place(base.add(i));
                }
                if layout.size() != 0 {
                    alloc::dealloc(base as *mut u8, layout);
                }
            }
            Ok(())
        };

        Self {
            address: base as usize,
            position: 0,
            limit: size,
            capacity: size,
            extent: Some(count),
            deallocator: Some(Deallocator::new(base as usize, label, release, Some(reclaimer.clone()))),
            released: false,
            _marker: PhantomData,
        }
    }

    /// Allocate and fill from a host array.
    pub fn from_slice(values: &[T]) -> Self {
        Self::from_slice_in(values, Reclaimer::global())
    }

    /// Allocate and fill from a host array, reclaimed by `reclaimer`.
    pub fn from_slice_in(values: &[T], reclaimer: &Reclaimer) -> Self {
        let handle = Self::allocate_in(values.len(), reclaimer);
        if let Ok(base) = handle.base() {
            for (i, value) in values.iter().enumerate() {
                // SAFETY: the allocation holds `values.len()` initialized elements.
                unsafe { *base.add(i) = value.clone() };
            }
        }
        handle
    }
}

impl<T: PlainData> Pointer<T> {
    /// Set every byte of `[position, limit)` to `byte`.
    pub fn fill(&mut self, byte: u8) -> Result<&mut Self, ResourceError> {
        let len = self.effective_limit().checked_sub(self.position).ok_or_else(|| self.invalid(0))?;
        let (base, start) = self.span(0, len)?;
        // SAFETY: checked by `span`; any byte pattern is a valid `T`.
        unsafe { ptr::write_bytes(base.add(start), byte, len) };
        Ok(self)
    }

    /// Zero `[position, limit)`.
    pub fn zero(&mut self) -> Result<&mut Self, ResourceError> {
        self.fill(0)
    }

    /// Block-copy `src`'s `[position, limit)` to this handle's position.
    pub fn copy_from(&mut self, src: &Pointer<T>) -> Result<&mut Self, ResourceError> {
        let len = src.effective_limit().checked_sub(src.position).ok_or_else(|| src.invalid(0))?;
        let (from, from_start) = src.span(0, len)?;
        let (to, to_start) = self.span(0, len)?;
        // SAFETY: both ranges checked; `copy` tolerates overlap.
        unsafe { ptr::copy(from.add(from_start), to.add(to_start), len) };
        Ok(self)
    }

    /// View the same storage as elements of `U`, sharing the deallocator.
    ///
    /// Position, limit, and capacity are rescaled; the byte extents must
    /// divide evenly and the address must be aligned for `U`.
    pub fn cast<U: PlainData>(&self) -> Result<Pointer<U>, ResourceError> {
        if self.is_released() {
            return Err(ResourceError::Released);
        }
        let (from, to) = (mem::size_of::<T>(), mem::size_of::<U>());
        let mismatch = ResourceError::TypeMismatch {
            from_size: from,
            to_size: to,
        };
        let rescale = |n: usize| -> Option<usize> {
            let bytes = n.checked_mul(from)?;
            (bytes % to == 0).then_some(bytes / to)
        };
        if self.address % mem::align_of::<U>() != 0 {
            return Err(mismatch);
        }
        let (Some(position), Some(limit), Some(capacity)) =
            (rescale(self.position), rescale(self.limit), rescale(self.capacity))
        else {
            return Err(mismatch);
        };

        if let Some(dealloc) = &self.deallocator {
            dealloc.retain();
        }
        Ok(Pointer {
            address: self.address,
            position,
            limit,
            capacity,
            extent: self.extent.map(|e| e.saturating_mul(from) / to),
            deallocator: self.deallocator.clone(),
            released: false,
            _marker: PhantomData,
        })
    }
}

impl Pointer<i8> {
    /// Allocate a NUL-terminated copy of `text`; the limit excludes the terminator.
    pub fn from_string(text: &str) -> Self {
        let mut handle = Self::allocate(text.len() + 1);
        if !handle.is_null() {
            // Room for the bytes plus NUL was just allocated.
            let _ = handle.put_string(text);
        }
        handle
    }

    fn string_end(&self) -> usize {
        match self.extent {
            Some(extent) => extent,
            None if self.capacity > 0 => self.capacity,
            None => self.effective_limit(),
        }
    }

    /// Wrapped storage with no known size: only the terminator bounds the text.
    fn size_unknown(&self) -> bool {
        self.extent.is_none() && self.capacity == 0 && self.limit == 0
    }

    /// Read bytes from `position` up to the first NUL (or the end of storage).
    ///
    /// A wrapped handle with no limit or capacity reads up to the NUL,
    /// which [`wrap`](Pointer::wrap)'s contract then requires to exist.
    pub fn get_string(&self) -> Result<String, ResourceError> {
        if self.size_unknown() {
            let base = self.base()?;
            // SAFETY: `wrap`'s contract covers the bytes through the terminator.
            let text = unsafe { CStr::from_ptr(base.add(self.position) as *const c_char) };
            return Ok(text.to_string_lossy().into_owned());
        }
        let end = self.string_end();
        let len = end.checked_sub(self.position).ok_or_else(|| self.invalid(0))?;
        let (base, start) = self.span_to(end, 0, len)?;
        // SAFETY: checked by `span_to`.
        let bytes = unsafe { slice::from_raw_parts(base.add(start) as *const u8, len) };
        let text = bytes.split(|b| *b == 0).next().unwrap_or_default();
        Ok(String::from_utf8_lossy(text).into_owned())
    }

    /// Write `text` plus a NUL at `position` and set the limit to the end of the text.
    pub fn put_string(&mut self, text: &str) -> Result<&mut Self, ResourceError> {
        let needed = text.len() + 1;
        let end = self.string_end();
        let (base, start) = self.span_to(end, 0, needed)?;
        // SAFETY: checked by `span_to`.
        unsafe {
            ptr::copy_nonoverlapping(text.as_ptr() as *const i8, base.add(start), text.len());
            *base.add(start + text.len()) = 0;
        }
        self.limit = self.position + text.len();
        Ok(self)
    }
}

impl Pointer<Address> {
    /// Wrap the address stored at `position + index`.
    ///
    /// # Safety
    ///
    /// The stored address must satisfy [`Pointer::wrap`]'s contract for `U`.
    pub unsafe fn get_pointer<U>(&self, index: usize) -> Result<Pointer<U>, ResourceError> {
        let address = self.get(index)?;
        // SAFETY: forwarded from the caller.
        Ok(unsafe { Pointer::wrap(address.0) })
    }

    /// Store the element address of `pointer` at `position + index`.
    pub fn put_pointer<U>(&mut self, index: usize, pointer: &Pointer<U>) -> Result<&mut Self, ResourceError> {
        self.put(index, Address(pointer.element_address()))
    }
}

fn host_range(len: usize, offset: usize, count: usize) -> Result<std::ops::Range<usize>, ResourceError> {
    match offset.checked_add(count) {
        Some(end) if end <= len => Ok(offset..end),
        _ => Err(ResourceError::IndexOutOfRange {
            index: offset.saturating_add(count),
            size: len,
        }),
    }
}

impl<T> Default for Pointer<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> Clone for Pointer<T> {
    fn clone(&self) -> Self {
        Self::share_from(self)
    }
}

impl<T> PartialEq for Pointer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address && self.position == other.position
    }
}

impl<T> Eq for Pointer<T> {}

impl<T> fmt::Display for Pointer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pointer<{}>[address={:#x}, position={}, limit={}, capacity={}, deallocator={}]",
            type_name::<T>(),
            self.address,
            self.position,
            self.limit,
            self.capacity,
            if self.deallocator.is_some() { "yes" } else { "no" },
        )
    }
}

impl<T> fmt::Debug for Pointer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pointer")
            .field("address", &format_args!("{:#x}", self.address))
            .field("position", &self.position)
            .field("limit", &self.limit)
            .field("capacity", &self.capacity)
            .field("deallocator", &self.deallocator)
            .field("released", &self.is_released())
            .finish()
    }
}

impl<T> Drop for Pointer<T> {
    fn drop(&mut self) {
        let Some(dealloc) = self.deallocator.take() else {
            return;
        };
        match dealloc.reclaimer().cloned() {
            Some(reclaimer) => reclaimer.enqueue(dealloc),
            None => {
                dealloc.reclaim_ref();
            }
        }
    }
}

/// Handle over native `bool`s.
pub type BoolPointer = Pointer<NativeBool>;
/// Handle over native `signed char`s; also carries NUL-terminated strings.
pub type BytePointer = Pointer<i8>;
/// Handle over native `short`s.
pub type ShortPointer = Pointer<i16>;
/// Handle over native UTF-16 code units.
pub type CharPointer = Pointer<u16>;
/// Handle over native `int`s.
pub type IntPointer = Pointer<i32>;
/// Handle over native `long long`s.
pub type LongPointer = Pointer<i64>;
/// Handle over native `float`s.
pub type FloatPointer = Pointer<f32>;
/// Handle over native `double`s.
pub type DoublePointer = Pointer<f64>;
/// Handle over native `size_t`s.
pub type SizePointer = Pointer<usize>;
/// Handle over an array of native addresses (`T**` arguments).
pub type PointerPointer = Pointer<Address>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn allocate_sets_window() {
        let reclaimer = Reclaimer::manual();
        for n in [0usize, 1, 7] {
            let p = IntPointer::allocate_in(n, &reclaimer);
            assert!(!p.is_null());
            assert_eq!((p.position(), p.limit(), p.capacity()), (0, n, n));
            assert_eq!(p.deallocator_count(), 1);
        }
    }

    #[test]
    fn zero_limit_acts_as_single_element() {
        let mut p = IntPointer::allocate_in(0, &Reclaimer::manual());
        p.put(0, 9).unwrap();
        assert_eq!(p.get(0).unwrap(), 9);
        assert_eq!(p.to_vec().unwrap(), vec![9]);
        assert_eq!(p.remaining_vec().unwrap(), Vec::<i32>::new());
        assert!(matches!(p.get(1), Err(ResourceError::InvalidRange { .. })));
    }

    #[test]
    fn get_and_put_are_relative_to_position() {
        let mut p = ShortPointer::from_slice_in(&[1, 2, 3, 4], &Reclaimer::manual());
        p.set_position(2);
        assert_eq!(p.get(0).unwrap(), 3);
        p.put(1, 40).unwrap();
        p.set_position(0);
        assert_eq!(p.to_vec().unwrap(), vec![1, 2, 3, 40]);
    }

    #[test]
    fn out_of_window_access_fails() {
        let mut p = IntPointer::allocate_in(4, &Reclaimer::manual());
        assert_eq!(
            p.get(4),
            Err(ResourceError::InvalidRange {
                position: 0,
                limit: 4,
                requested: 5
            })
        );
        p.set_position(5);
        assert!(matches!(p.zero(), Err(ResourceError::InvalidRange { .. })));
    }

    #[test]
    fn limit_past_storage_is_rejected() {
        let mut p = IntPointer::allocate_in(2, &Reclaimer::manual());
        p.set_limit(8);
        assert!(matches!(p.to_vec(), Err(ResourceError::InvalidRange { .. })));
        // A zero-sized allocation still refuses to read past its single slot.
        let mut empty = IntPointer::allocate_in(0, &Reclaimer::manual());
        empty.set_limit(3);
        assert!(empty.get(2).is_err());
    }

    #[test]
    fn null_handle_operations_fail() {
        let mut p = unsafe { IntPointer::wrap(0) };
        assert_eq!(p.get(0), Err(ResourceError::NullReference));
        assert!(matches!(p.put(0, 1), Err(ResourceError::NullReference)));
        assert!(matches!(p.zero(), Err(ResourceError::NullReference)));
        let mut buf = [0; 2];
        assert_eq!(p.read_into(&mut buf, 0, 2), Err(ResourceError::NullReference));
    }

    #[test]
    fn bulk_transfer_with_offsets() {
        let mut p = IntPointer::allocate_in(4, &Reclaimer::manual());
        p.write_from(&[9, 1, 2, 3, 9], 1, 3).unwrap();
        let mut out = [0; 5];
        p.read_into(&mut out, 2, 3).unwrap();
        assert_eq!(out, [0, 0, 1, 2, 3]);
        assert_eq!(
            p.read_into(&mut out, 4, 3),
            Err(ResourceError::IndexOutOfRange { index: 7, size: 5 })
        );
    }

    #[test]
    fn fill_zero_and_copy() {
        let reclaimer = Reclaimer::manual();
        let mut a = IntPointer::from_slice_in(&[1, 2, 3], &reclaimer);
        let mut b = IntPointer::allocate_in(3, &reclaimer);
        b.copy_from(&a).unwrap();
        assert_eq!(b.to_vec().unwrap(), vec![1, 2, 3]);

        a.set_position(1);
        a.zero().unwrap();
        a.set_position(0);
        assert_eq!(a.to_vec().unwrap(), vec![1, 0, 0]);

        let mut bytes = BytePointer::allocate_in(2, &reclaimer);
        bytes.fill(0x7f).unwrap();
        assert_eq!(bytes.to_vec().unwrap(), vec![0x7f, 0x7f]);
    }

    #[test]
    fn copy_into_smaller_window_fails() {
        let reclaimer = Reclaimer::manual();
        let src = IntPointer::from_slice_in(&[1, 2, 3], &reclaimer);
        let mut dst = IntPointer::allocate_in(2, &reclaimer);
        assert!(matches!(dst.copy_from(&src), Err(ResourceError::InvalidRange { .. })));
    }

    #[test]
    fn shared_handles_release_once() {
        let reclaimer = Reclaimer::manual();
        let mut a = LongPointer::allocate_in(2, &reclaimer);
        let mut b = LongPointer::share_from(&a);
        assert_eq!(a.deallocator_count(), 2);
        let dealloc = Arc::clone(a.deallocator().unwrap());

        assert!(!a.release());
        assert!(!dealloc.is_released());
        assert_eq!(b.get(1).unwrap(), 0);

        assert!(b.release());
        assert!(dealloc.is_released());
        assert!(!b.release());
    }

    #[test]
    fn released_handle_reports_released() {
        let mut p = IntPointer::allocate_in(1, &Reclaimer::manual());
        p.release();
        assert_eq!(p.get(0), Err(ResourceError::Released));
        assert!(LongPointer::share_from(&LongPointer::null()).is_null());
    }

    #[test]
    fn drop_goes_through_reclaimer() {
        let reclaimer = Reclaimer::manual();
        let a = IntPointer::allocate_in(3, &reclaimer);
        let dealloc = Arc::clone(a.deallocator().unwrap());
        let b = a.clone();
        drop(a);
        reclaimer.sweep();
        assert!(!dealloc.is_released());
        drop(b);
        reclaimer.sweep();
        assert!(dealloc.is_released());
        assert_eq!(reclaimer.stats().released, 1);
    }

    #[test]
    fn disabled_auto_release_survives_reclamation() {
        let reclaimer = Reclaimer::manual();
        let mut p = IntPointer::allocate_in(1, &reclaimer);
        p.disable_auto_release();
        let dealloc = Arc::clone(p.deallocator().unwrap());
        drop(p);
        reclaimer.sweep();
        assert!(!dealloc.is_released());
        // Ownership moved elsewhere; release it by hand.
        assert!(dealloc.release_now());
    }

    #[test]
    fn cast_shares_deallocator_and_rescales() {
        let reclaimer = Reclaimer::manual();
        let mut ints = IntPointer::from_slice_in(&[0x0102_0304, 0], &reclaimer);
        ints.set_position(1);
        let shorts = ints.cast::<i16>().unwrap();
        assert_eq!((shorts.position(), shorts.limit(), shorts.capacity()), (2, 4, 4));
        assert_eq!(ints.deallocator_count(), 2);

        let bytes = BytePointer::allocate_in(3, &reclaimer);
        assert_eq!(
            bytes.cast::<i16>().unwrap_err(),
            ResourceError::TypeMismatch { from_size: 1, to_size: 2 }
        );
    }

    #[test]
    fn strings_round_trip() {
        let reclaimer = Reclaimer::manual();
        let p = BytePointer::from_string("hello");
        assert_eq!(p.limit(), 5);
        assert_eq!(p.capacity(), 6);
        assert_eq!(p.get_string().unwrap(), "hello");

        let mut small = BytePointer::allocate_in(3, &reclaimer);
        assert!(small.put_string("abcd").is_err());
        small.put_string("ab").unwrap();
        assert_eq!(small.limit(), 2);
        assert_eq!(small.get_string().unwrap(), "ab");
    }

    #[test]
    fn pointer_pointer_stores_element_addresses() {
        let reclaimer = Reclaimer::manual();
        let mut ints = IntPointer::from_slice_in(&[5, 6], &reclaimer);
        ints.set_position(1);
        let mut table = PointerPointer::allocate_in(1, &reclaimer);
        table.put_pointer(0, &ints).unwrap();
        let view: IntPointer = unsafe { table.get_pointer(0).unwrap() };
        assert_eq!(view.get(0).unwrap(), 6);
        assert_eq!(view.deallocator_count(), 0);
    }

    #[test]
    fn equality_by_address_and_position() {
        let reclaimer = Reclaimer::manual();
        let a = IntPointer::allocate_in(2, &reclaimer);
        let mut b = a.clone();
        assert_eq!(a, b);
        b.set_position(1);
        assert_ne!(a, b);
        b.set_limit(0);
        b.set_position(0);
        assert_eq!(a, b);
    }

    #[test]
    fn display_shows_window() {
        let p = IntPointer::null();
        assert_eq!(
            p.to_string(),
            "Pointer<i32>[address=0x0, position=0, limit=0, capacity=0, deallocator=no]"
        );
    }

    static NATIVE_FREES: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn native_free(address: *mut c_void) {
        NATIVE_FREES.fetch_add(1, Ordering::SeqCst);
        // SAFETY: allocated below with `Box::into_raw`.
        drop(unsafe { Box::from_raw(address as *mut [i32; 4]) });
    }

    #[test]
    fn descriptor_owner_becomes_release_action() {
        let storage = Box::into_raw(Box::new([1i32, 2, 3, 4]));
        let descriptor = HandleDescriptor {
            address: storage as *mut c_void,
            position: 1,
            limit: 4,
            capacity: 4,
            owner: Some(native_free),
        };
        let mut p: IntPointer = unsafe { Pointer::from_descriptor(&descriptor, None) };
        assert_eq!(p.value().unwrap(), 2);
        assert_eq!(p.descriptor().position, 1);
        assert!(p.release());
        assert_eq!(NATIVE_FREES.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn sync_from_reads_back_window() {
        let mut p = IntPointer::allocate_in(4, &Reclaimer::manual());
        let mut d = p.descriptor();
        d.limit = 2;
        unsafe { p.sync_from(&d) };
        assert_eq!(p.limit(), 2);
    }

    static GROWN_FREES: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn free_grown(address: *mut c_void) {
        GROWN_FREES.fetch_add(1, Ordering::SeqCst);
        // SAFETY: allocated below with `Box::into_raw`.
        drop(unsafe { Box::from_raw(address as *mut [i32; 4]) });
    }

    #[test]
    fn sync_from_adopts_storage_grown_by_native_code() {
        let reclaimer = Reclaimer::manual();
        let mut p = IntPointer::from_slice_in(&[1], &reclaimer);
        let old = Arc::clone(p.deallocator().unwrap());

        // A native vector outgrew the handle and was copied into new storage.
        let grown = Box::into_raw(Box::new([1i32, 2, 3, 4]));
        let mut d = p.descriptor();
        d.address = grown as *mut c_void;
        d.limit = 4;
        d.capacity = 4;
        d.owner = Some(free_grown);
        unsafe { p.sync_from(&d) };

        assert_eq!(p.address(), grown as usize);
        assert_eq!((p.limit(), p.capacity()), (4, 4));
        assert_eq!(p.to_vec().unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(p.deallocator().unwrap().label(), "native");

        assert_eq!(reclaimer.sweep(), 1);
        assert!(old.is_released());
        assert!(p.release());
        assert_eq!(GROWN_FREES.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn storage_released_elsewhere_fails_every_handle() {
        let a = IntPointer::from_slice_in(&[7, 8], &Reclaimer::manual());
        let b = a.clone();
        assert!(a.deallocator().unwrap().release_now());

        assert!(a.is_released());
        assert!(b.is_released());
        assert_eq!(a.get(0), Err(ResourceError::Released));
        assert_eq!(b.to_vec(), Err(ResourceError::Released));
        assert_eq!(b.cast::<i16>().unwrap_err(), ResourceError::Released);
        assert!(IntPointer::share_from(&a).is_null());
    }

    #[test]
    fn wrapped_string_reads_to_terminator() {
        let text = b"native text\0";
        let p = unsafe { BytePointer::wrap(text.as_ptr() as usize) };
        assert_eq!(p.limit(), 0);
        assert_eq!(p.get_string().unwrap(), "native text");

        let mut bounded = unsafe { BytePointer::wrap(text.as_ptr() as usize) };
        bounded.set_limit(6);
        assert_eq!(bounded.get_string().unwrap(), "native");
    }

    #[test]
    fn non_plain_elements_are_dropped_on_release() {
        let mut p: Pointer<Vec<String>> = Pointer::allocate_in(2, &Reclaimer::manual());
        p.put(1, vec!["a".into(), "b".into()]).unwrap();
        assert_eq!(p.get(1).unwrap().len(), 2);
        assert_eq!(p.deallocator().unwrap().label(), "delete[]");
        assert!(p.release());
    }

    proptest::proptest! {
        #[test]
        fn bulk_access_stays_inside_window(n in 1usize..64, position in 0usize..64, len in 0usize..64) {
            let mut p = LongPointer::allocate_in(n, &Reclaimer::manual());
            p.set_position(position);
            let mut dst = vec![0i64; len];
            let fits = position + len <= n;
            proptest::prop_assert_eq!(p.read_into(&mut dst, 0, len).is_ok(), fits);
            proptest::prop_assert_eq!(p.write_from(&dst, 0, len).is_ok(), fits);
        }
    }
}
