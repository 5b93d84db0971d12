//! Native function pointers and function objects held by host code.

use std::fmt;
use std::sync::Arc;

use nativebind_core::{NativeBindError, NativeException, PassConvention, ResourceError};

use super::{Callback, CallFrame};

/// Calls a native function at an address.
///
/// Supplied by the loaded native image; the host never jumps to an
/// address on its own.
pub trait NativeInvoker: Send + Sync {
    fn invoke(&self, address: usize, frame: &mut CallFrame) -> Result<(), NativeException>;
}

impl<F> NativeInvoker for F
where
    F: Fn(usize, &mut CallFrame) -> Result<(), NativeException> + Send + Sync,
{
    fn invoke(&self, address: usize, frame: &mut CallFrame) -> Result<(), NativeException> {
        (self)(address, frame)
    }
}

/// A native function pointer held as a first-class host value.
#[derive(Clone, Default)]
pub struct FunctionPointer {
    address: usize,
    invoker: Option<Arc<dyn NativeInvoker>>,
}

impl FunctionPointer {
    /// A null function pointer; calling it fails.
    pub fn null() -> Self {
        Self::default()
    }

    /// Wrap an existing native function.
    ///
    /// # Safety
    ///
    /// `address` must name a function whose signature `invoker` marshals
    /// correctly, and must stay valid for as long as this value is called.
    pub unsafe fn from_native<I>(address: usize, invoker: I) -> Self
    where
        I: NativeInvoker + 'static,
    {
        Self {
            address,
            invoker: Some(Arc::new(invoker)),
        }
    }

    /// Whether this pointer is null.
    pub fn is_null(&self) -> bool {
        self.address == 0
    }

    /// The function's address.
    pub fn address(&self) -> usize {
        self.address
    }

    /// Call the function; a null pointer fails before any native call.
    pub fn call(&self, frame: &mut CallFrame) -> Result<(), NativeBindError> {
        match (&self.invoker, self.address) {
            (Some(invoker), address) if address != 0 => Ok(invoker.invoke(address, frame)?),
            _ => Err(ResourceError::NullReference.into()),
        }
    }
}

impl fmt::Debug for FunctionPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionPointer")
            .field("address", &format_args!("{:#x}", self.address))
            .finish_non_exhaustive()
    }
}

impl Callback {
    /// The trampoline of this callback as a function pointer.
    ///
    /// Calls route through the callback table, so they get the same thread
    /// attachment and failure translation as a native caller would.
    pub fn as_function_pointer(&self) -> FunctionPointer {
        if self.is_null() {
            return FunctionPointer::null();
        }
        let callback = self.clone();
        FunctionPointer {
            address: self.address(),
            invoker: Some(Arc::new(move |_: usize, frame: &mut CallFrame| -> Result<(), NativeException> {
                callback.invoke(frame)
            })),
        }
    }
}

/// A native function object forwarding its call operator to a pointer.
#[derive(Debug, Clone, Default)]
pub struct Functor {
    target: FunctionPointer,
}

impl Functor {
    /// Wrap `target`.
    pub fn new(target: FunctionPointer) -> Self {
        Self { target }
    }

    /// The wrapped function pointer.
    pub fn target(&self) -> &FunctionPointer {
        &self.target
    }

    /// Invoke the call operator.
    pub fn call(&self, frame: &mut CallFrame) -> Result<(), NativeBindError> {
        self.target.call(frame)
    }
}

/// What a callback parameter becomes on the native side.
#[derive(Debug, Clone)]
pub enum CallbackTarget {
    /// A bare function pointer.
    Pointer(FunctionPointer),
    /// A function object wrapping the pointer.
    Functor(Functor),
}

impl CallbackTarget {
    /// Bind `callback` for a parameter passed with `pass`.
    ///
    /// By-value and by-reference parameters expect a function object.
    pub fn for_convention(pass: PassConvention, callback: &Callback) -> Self {
        let pointer = callback.as_function_pointer();
        match pass {
            PassConvention::ByVal | PassConvention::ByRef => CallbackTarget::Functor(Functor::new(pointer)),
            _ => CallbackTarget::Pointer(pointer),
        }
    }

    /// Invoke the target.
    pub fn call(&self, frame: &mut CallFrame) -> Result<(), NativeBindError> {
        match self {
            CallbackTarget::Pointer(pointer) => pointer.call(frame),
            CallbackTarget::Functor(functor) => functor.call(frame),
        }
    }

    /// Whether the native side receives a function object.
    pub fn is_functor(&self) -> bool {
        matches!(self, CallbackTarget::Functor(_))
    }
}
