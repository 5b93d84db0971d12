//! Structures shared with generated bridging functions.
//!
//! These mirror the `nb_pointer` and `nb_env` declarations in the generated
//! prelude and must keep the same layout.

use std::ffi::{c_char, c_void};
use std::ptr;

use nativebind_core::error::DEFAULT_HOST_KIND;
use nativebind_core::{HostFailure, NativeBindError, NativeException, ResourceError, StatusCode};

/// Size of the failure message buffer in [`CallEnv`] (`NB_MESSAGE_MAX`).
pub const MESSAGE_MAX: usize = 512;

/// Size of the failure kind buffer in [`CallEnv`] (`NB_KIND_MAX`).
pub const KIND_MAX: usize = 128;

/// A native release routine installed by a generated allocator.
pub type NativeRelease = unsafe extern "C" fn(*mut c_void);

/// Handle state as seen by generated code (`nb_pointer`).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct HandleDescriptor {
    pub address: *mut c_void,
    pub position: isize,
    pub limit: isize,
    pub capacity: isize,
    /// Release routine for storage allocated by the call, if any.
    pub owner: Option<NativeRelease>,
}

impl HandleDescriptor {
    /// A descriptor for a null handle.
    pub const fn null() -> Self {
        Self {
            address: ptr::null_mut(),
            position: 0,
            limit: 0,
            capacity: 0,
            owner: None,
        }
    }
}

impl Default for HandleDescriptor {
    fn default() -> Self {
        Self::null()
    }
}

pub(crate) fn to_isize(value: usize) -> isize {
    isize::try_from(value).unwrap_or(isize::MAX)
}

pub(crate) fn to_usize(value: isize) -> usize {
    usize::try_from(value).unwrap_or(0)
}

/// Per-call environment (`nb_env`).
///
/// Generated functions return an `nb_status` and, on failure, fill in the
/// failure kind, message, and numeric detail here.
#[repr(C)]
pub struct CallEnv {
    /// Opaque host execution context, passed through unchanged.
    pub host: *mut c_void,
    /// Range detail: `[position, limit, requested]` or `[index, size, _]`.
    pub detail: [isize; 3],
    /// NUL-terminated failure kind.
    pub kind: [c_char; KIND_MAX],
    /// NUL-terminated failure message.
    pub message: [c_char; MESSAGE_MAX],
}

impl Default for CallEnv {
    fn default() -> Self {
        Self::new(ptr::null_mut())
    }
}

impl CallEnv {
    /// Create an environment carrying the host execution context.
    pub fn new(host: *mut c_void) -> Self {
        Self {
            host,
            detail: [0; 3],
            kind: [0; KIND_MAX],
            message: [0; MESSAGE_MAX],
        }
    }

    /// Record a failure the way the prelude's `nb_raise` does.
    ///
    /// Returns the status code to hand back.
    pub fn raise(&mut self, status: StatusCode, kind: &str, message: &str) -> i32 {
        write_c_string(&mut self.kind, kind);
        write_c_string(&mut self.message, message);
        status.into()
    }

    /// Record a range failure.
    pub fn raise_range(&mut self, position: usize, limit: usize, requested: usize) -> i32 {
        self.detail = [to_isize(position), to_isize(limit), to_isize(requested)];
        StatusCode::InvalidRange.into()
    }

    /// Record an index failure.
    pub fn raise_index(&mut self, index: usize, size: usize) -> i32 {
        self.detail = [to_isize(index), to_isize(size), 0];
        StatusCode::IndexOutOfRange.into()
    }

    /// The recorded failure kind.
    pub fn kind(&self) -> String {
        read_c_string(&self.kind)
    }

    /// The recorded failure message.
    pub fn message(&self) -> String {
        read_c_string(&self.message)
    }

    /// Turn a returned status code into a result.
    pub fn finish(&self, code: i32) -> Result<(), NativeBindError> {
        let [d0, d1, d2] = self.detail.map(to_usize);
        let status = match StatusCode::try_from(code) {
            Ok(status) => status,
            Err(_) => {
                return Err(NativeException::new(DEFAULT_HOST_KIND, format!("unknown status code {code}")).into());
            }
        };
        match status {
            StatusCode::Ok => Ok(()),
            StatusCode::NullReference => Err(ResourceError::NullReference.into()),
            StatusCode::InvalidRange => Err(ResourceError::InvalidRange {
                position: d0,
                limit: d1,
                requested: d2,
            }
            .into()),
            StatusCode::IndexOutOfRange => Err(ResourceError::IndexOutOfRange { index: d0, size: d1 }.into()),
            StatusCode::NativeException => {
                let kind = self.kind();
                let kind = if kind.is_empty() { DEFAULT_HOST_KIND.to_string() } else { kind };
                Err(NativeException::new(kind, self.message()).into())
            }
            StatusCode::HostFailure => Err(HostFailure::new(self.message()).into()),
        }
    }
}

fn write_c_string(buffer: &mut [c_char], text: &str) {
    let len = text.len().min(buffer.len().saturating_sub(1));
    for (dst, src) in buffer.iter_mut().zip(text.as_bytes()[..len].iter()) {
        *dst = *src as c_char;
    }
    if let Some(end) = buffer.get_mut(len) {
        *end = 0;
    }
}

fn read_c_string(buffer: &[c_char]) -> String {
    let bytes: Vec<u8> = buffer.iter().take_while(|c| **c != 0).map(|c| *c as u8).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}
