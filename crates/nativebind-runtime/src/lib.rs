//! Runtime side of nativebind.
//!
//! - [`Pointer`]: host handle over native storage (address, position, limit, capacity)
//! - [`Deallocator`]: shared, exactly-once native release
//! - [`Reclaimer`]: releases handles dropped without an explicit release
//! - [`adapter`]: per-call native temporaries with read-back
//! - [`callback`]: host callbacks for native code, native function pointers for the host
//! - [`abi`]: the `#[repr(C)]` structs generated code exchanges with the runtime
//!
//! # Example
//!
//! ```
//! use nativebind_runtime::{IntPointer, Reclaimer};
//!
//! let reclaimer = Reclaimer::manual();
//! let mut a = IntPointer::allocate_in(4, &reclaimer);
//! a.put(0, 7).unwrap();
//!
//! let b = IntPointer::share_from(&a);
//! assert_eq!(b.get(0).unwrap(), 7);
//! assert_eq!(a.deallocator_count(), 2);
//!
//! a.release();
//! assert!(!b.is_released());
//! ```

pub mod abi;
pub mod adapter;
pub mod callback;
mod deallocator;
mod element;
mod pointer;
mod reclaim;

pub use abi::{CallEnv, HandleDescriptor};
pub use adapter::{IndexCall, IndexResult, Indexed, StringAdapter, Temporary, VectorAdapter};
pub use callback::{
    Callback, CallbackBinding, CallbackTable, CallbackTarget, FunctionPointer, Functor,
    HostRuntime, ThreadAttacher,
};
pub use deallocator::{Deallocator, ReleaseAction, ReleaseFailure};
pub use element::{Address, NativeBool, PlainData};
pub use pointer::{
    BoolPointer, BytePointer, CharPointer, DoublePointer, FloatPointer, IntPointer, LongPointer,
    Pointer, PointerPointer, ShortPointer, SizePointer,
};
pub use reclaim::{ReclaimStats, Reclaimer, ReclaimerConfig};
