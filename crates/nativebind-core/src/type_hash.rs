//! Deterministic hash-based declaration identity.
//!
//! [`DeclHash`] identifies classes, methods, and fields of a declaration set.
//! Hashes are computed from host names and parameter shapes, so the same
//! declaration always produces the same hash regardless of insertion order.
//! The generator uses them to detect duplicate declarations and to keep
//! emitted symbol names stable across runs.
//!
//! # Examples
//!
//! ```
//! use nativebind_core::DeclHash;
//!
//! let vector = DeclHash::from_class(&["std", "IntVector"]);
//! assert_eq!(vector, DeclHash::from_class(&["std", "IntVector"]));
//!
//! let get_a = DeclHash::from_method(vector, "get", &["long"]);
//! let get_b = DeclHash::from_method(vector, "get", &["int"]);
//! assert_ne!(get_a, get_b);
//! ```

use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Domain-specific mixing constants for hash computation.
///
/// Distinct domains keep a class named `get` from colliding with a method
/// named `get`.
pub mod hash_constants {
    /// Separator constant for path components.
    pub const SEP: u64 = 0x4bc94d6bd06053ad;

    /// Domain marker for class hashes.
    pub const CLASS: u64 = 0x2fac10b63a6cc57c;

    /// Domain marker for method hashes.
    pub const METHOD: u64 = 0x7d3c8b4a92e15f6d;

    /// Domain marker for field hashes.
    pub const FIELD: u64 = 0x3e9f5d2a8c7b1403;

    /// Parameter position mixing constants.
    pub const PARAM_MARKERS: [u64; 8] = [
        0x9e3779b97f4a7c15,
        0xbf58476d1ce4e5b9,
        0x94d049bb133111eb,
        0xd6e8feb86659fd93,
        0xe7037ed1a0b428db,
        0xc6a4a7935bd1e995,
        0x8648dbbc94d49b8d,
        0xa2b48b2c69e0d657,
    ];
}

/// A deterministic 64-bit hash identifying a declaration.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct DeclHash(pub u64);

impl DeclHash {
    /// Empty/invalid hash constant.
    pub const EMPTY: DeclHash = DeclHash(0);

    /// Create a class hash from its host path (enclosing classes first).
    pub fn from_class<S: AsRef<str>>(host_path: &[S]) -> Self {
        let mut hash = hash_constants::CLASS;
        for segment in host_path {
            hash = hash
                .wrapping_mul(hash_constants::SEP)
                .wrapping_add(xxh64(segment.as_ref().as_bytes(), 0));
        }
        DeclHash(hash)
    }

    /// Create a method hash from its owner, host name, and host parameter type names.
    ///
    /// Parameter order matters: `(int, long)` and `(long, int)` differ.
    pub fn from_method<S: AsRef<str>>(owner: DeclHash, name: &str, params: &[S]) -> Self {
        let mut hash = hash_constants::METHOD ^ owner.0 ^ xxh64(name.as_bytes(), 0);
        for (i, param) in params.iter().enumerate() {
            let marker = hash_constants::PARAM_MARKERS
                .get(i)
                .copied()
                .unwrap_or_else(|| hash_constants::PARAM_MARKERS[0].wrapping_add(i as u64));
            // wrapping_mul keeps the combination order-sensitive
            hash = hash
                .wrapping_mul(hash_constants::SEP)
                .wrapping_add(marker ^ xxh64(param.as_ref().as_bytes(), 0));
        }
        DeclHash(hash)
    }

    /// Create a field hash from its owner and host name.
    pub fn from_field(owner: DeclHash, name: &str) -> Self {
        DeclHash(hash_constants::FIELD ^ owner.0 ^ xxh64(name.as_bytes(), 0))
    }

    /// Check if this is an empty/invalid hash.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Get the underlying u64 value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Short hexadecimal form used in generated identifiers.
    pub fn short(self) -> String {
        format!("{:08x}", (self.0 >> 32) as u32 ^ self.0 as u32)
    }
}

impl fmt::Debug for DeclHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeclHash({:#018x})", self.0)
    }
}

impl fmt::Display for DeclHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}
