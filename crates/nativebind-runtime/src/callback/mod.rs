//! Callback and function-pointer marshaling.
//!
//! Two directions:
//!
//! - host logic called from native code, through a [`CallbackTable`] slot
//!   bracketed by [`ThreadAttacher`];
//! - native functions held by host code, as a [`FunctionPointer`] or, where
//!   the native side expects a function object, a [`Functor`].

mod attach;
mod frame;
mod function;
mod table;

pub use attach::{AttachGuard, HostRuntime, ThreadAttacher};
pub use frame::{CallFrame, NativeValue};
pub use function::{CallbackTarget, FunctionPointer, Functor, NativeInvoker};
pub use table::{Callback, CallbackBinding, CallbackFn, CallbackTable};
