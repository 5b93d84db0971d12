//! Status codes returned by generated bridging functions.
//!
//! Every generated function returns an `nb_status`. The runtime turns a
//! non-zero status back into a typed error with [`StatusCode::try_from`].

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Status channel shared by generated code and the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum StatusCode {
    /// The call completed.
    Ok = 0,
    /// A handle with a null address was dereferenced.
    NullReference = 1,
    /// `position > limit`, or an extent outside `[0, limit)`.
    InvalidRange = 2,
    /// A subscript exceeded the size of an indexed container.
    IndexOutOfRange = 3,
    /// A native exception was caught and translated.
    NativeException = 4,
    /// Host logic invoked through a callback failed.
    HostFailure = 5,
}

impl StatusCode {
    /// All codes, in discriminant order.
    pub const ALL: [StatusCode; 6] = [
        StatusCode::Ok,
        StatusCode::NullReference,
        StatusCode::InvalidRange,
        StatusCode::IndexOutOfRange,
        StatusCode::NativeException,
        StatusCode::HostFailure,
    ];

    /// The macro name used for this code in generated source.
    pub const fn c_name(self) -> &'static str {
        match self {
            StatusCode::Ok => "NB_OK",
            StatusCode::NullReference => "NB_NULL_REFERENCE",
            StatusCode::InvalidRange => "NB_INVALID_RANGE",
            StatusCode::IndexOutOfRange => "NB_INDEX_OUT_OF_RANGE",
            StatusCode::NativeException => "NB_NATIVE_EXCEPTION",
            StatusCode::HostFailure => "NB_HOST_FAILURE",
        }
    }

    /// Check if this code reports success.
    pub const fn is_ok(self) -> bool {
        matches!(self, StatusCode::Ok)
    }
}
