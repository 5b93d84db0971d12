//! Sequence adapter: handle or host array <-> native vector.

use std::marker::PhantomData;

use nativebind_core::{AdapterSpec, Direction, NativeBindError, ResourceError};

use super::Temporary;
use crate::{Pointer, Reclaimer};

const LABEL: &str = "vector";

/// Marshals `[position, limit)` of a handle (or a host array) into a native
/// vector for one call.
///
/// With a read-back direction the vector's final contents are copied back
/// after the call: in place when the handle's storage has room, updating
/// its limit, otherwise into a freshly allocated handle that replaces it.
#[derive(Debug, Clone, Copy)]
pub struct VectorAdapter<T> {
    direction: Direction,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Clone + Default + Send + 'static> VectorAdapter<T> {
    /// Create an adapter with an explicit direction.
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            _marker: PhantomData,
        }
    }

    /// Create the adapter for a parameter carrying `spec`.
    pub fn for_param(spec: &AdapterSpec, is_const: bool) -> Self {
        Self::new(spec.effective_direction(is_const))
    }

    /// The conversion direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Produce the owned native vector for `host`.
    ///
    /// A null handle, or an `Out` adapter, starts from an empty vector.
    pub fn adapt(&self, host: &Pointer<T>) -> Result<Temporary<Vec<T>>, ResourceError> {
        if self.direction == Direction::Out || (host.is_null() && !host.is_released()) {
            return Ok(Temporary::new(Vec::new(), LABEL));
        }
        Ok(Temporary::new(host.remaining_vec()?, LABEL))
    }

    /// A borrowed view of `host` for read-only calls; nothing is copied.
    ///
    /// # Safety
    ///
    /// Same contract as [`Pointer::as_slice`] for as long as the view lives.
    pub unsafe fn borrow<'a>(&self, host: &'a Pointer<T>) -> Result<&'a [T], ResourceError> {
        if host.is_null() && !host.is_released() {
            return Ok(&[]);
        }
        // SAFETY: forwarded from the caller.
        unsafe { host.remaining_slice() }
    }

    /// Copy `native` back into `host` if this adapter reads back.
    pub fn read_back(&self, native: &[T], host: &mut Pointer<T>) -> Result<(), ResourceError> {
        if !self.direction.reads_back() {
            return Ok(());
        }
        if !host.is_null() && host.room() >= native.len() {
            let end = host.position() + native.len();
            host.set_limit(end);
            if !native.is_empty() {
                host.write_from(native, 0, native.len())?;
            }
            return Ok(());
        }

        let reclaimer = host
            .deallocator()
            .and_then(|d| d.reclaimer())
            .cloned()
            .unwrap_or_else(|| Reclaimer::global().clone());
        *host = Pointer::from_slice_in(native, &reclaimer);
        if host.is_null() {
            return Err(ResourceError::NullReference);
        }
        Ok(())
    }

    /// Run `call` against the adapted vector, then read back.
    ///
    /// The temporary is released whether or not `call` succeeds; read-back
    /// only happens on success.
    pub fn scoped<R, F>(&self, host: &mut Pointer<T>, call: F) -> Result<R, NativeBindError>
    where
        F: FnOnce(&mut Temporary<Vec<T>>) -> Result<R, NativeBindError>,
    {
        let mut temporary = self.adapt(host)?;
        let result = call(&mut temporary)?;
        self.read_back(&temporary, host)?;
        Ok(result)
    }

    /// Adapt a host array directly.
    pub fn from_host(&self, values: &[T]) -> Temporary<Vec<T>> {
        Temporary::new(values.to_vec(), LABEL)
    }

    /// Read a native vector back into a host array.
    pub fn to_host(&self, native: &[T]) -> Vec<T> {
        native.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nativebind_core::NativeException;
    use std::sync::Arc;

    fn inout() -> VectorAdapter<i32> {
        VectorAdapter::new(Direction::InOut)
    }

    #[test]
    fn direction_follows_constness() {
        let spec = AdapterSpec::new("VectorAdapter", "std::vector<int>");
        assert_eq!(VectorAdapter::<i32>::for_param(&spec, true).direction(), Direction::In);
        assert_eq!(VectorAdapter::<i32>::for_param(&spec, false).direction(), Direction::InOut);
    }

    #[test]
    fn adapt_copies_remaining_window() {
        let mut host = Pointer::from_slice_in(&[1, 2, 3, 4], &Reclaimer::manual());
        host.set_position(1).set_limit(3);
        let temp = inout().adapt(&host).unwrap();
        assert_eq!(*temp, vec![2, 3]);
    }

    #[test]
    fn growth_within_storage_updates_limit() {
        let mut host = Pointer::from_slice_in(&[1, 2, 3, 4], &Reclaimer::manual());
        host.set_limit(2);
        let address = host.address();
        inout()
            .scoped(&mut host, |native| {
                native.push(7);
                Ok(())
            })
            .unwrap();
        assert_eq!(host.address(), address);
        assert_eq!(host.limit(), 3);
        assert_eq!(host.to_vec().unwrap(), vec![1, 2, 7]);
    }

    #[test]
    fn growth_past_storage_reallocates() {
        let reclaimer = Reclaimer::manual();
        let mut host = Pointer::from_slice_in(&[1], &reclaimer);
        let old = Arc::clone(host.deallocator().unwrap());
        inout()
            .scoped(&mut host, |native| {
                native.extend([2, 3, 4]);
                Ok(())
            })
            .unwrap();
        assert_eq!(host.to_vec().unwrap(), vec![1, 2, 3, 4]);
        reclaimer.sweep();
        assert!(old.is_released());
    }

    #[test]
    fn const_parameters_are_not_read_back() {
        let mut host = Pointer::from_slice_in(&[1, 2], &Reclaimer::manual());
        VectorAdapter::new(Direction::In)
            .scoped(&mut host, |native| {
                native.clear();
                Ok(())
            })
            .unwrap();
        assert_eq!(host.to_vec().unwrap(), vec![1, 2]);
    }

    #[test]
    fn temporary_released_when_call_fails() {
        let mut host = Pointer::from_slice_in(&[1, 2], &Reclaimer::manual());
        let mut seen = None;
        let err = inout()
            .scoped(&mut host, |native| -> Result<(), NativeBindError> {
                seen = Some(Arc::clone(native.deallocator()));
                native.push(3);
                Err(NativeException::new("std::length_error", "too long").into())
            })
            .unwrap_err();
        assert!(matches!(err, NativeBindError::Native(_)));
        assert!(seen.unwrap().is_released());
        // No read-back on failure.
        assert_eq!(host.limit(), 2);
    }

    #[test]
    fn null_host_adapts_to_empty_and_reads_back_into_new_storage() {
        let mut host = Pointer::<i32>::null();
        inout()
            .scoped(&mut host, |native| {
                assert!(native.is_empty());
                native.extend([5, 6]);
                Ok(())
            })
            .unwrap();
        assert!(!host.is_null());
        assert_eq!(host.to_vec().unwrap(), vec![5, 6]);
    }

    #[test]
    fn host_array_round_trip() {
        let adapter = inout();
        for values in [vec![], vec![42], vec![1, -2, 3, i32::MAX]] {
            let native = adapter.from_host(&values);
            assert_eq!(adapter.to_host(&native), values);
        }
    }

    #[test]
    fn borrow_views_without_copy() {
        let host = Pointer::from_slice_in(&[3, 4], &Reclaimer::manual());
        // SAFETY: no other handle shares `host`.
        unsafe {
            assert_eq!(inout().borrow(&host).unwrap(), &[3, 4]);
            assert!(inout().borrow(&Pointer::null()).unwrap().is_empty());
        }
    }
}
