//! String adapter: host string or byte handle <-> native string.

use nativebind_core::{AdapterSpec, Direction, NativeBindError, ResourceError};

use super::Temporary;
use crate::{BytePointer, Reclaimer};

const LABEL: &str = "string";

/// Marshals a host string (or a NUL-terminated byte handle) into an owned
/// native string for one call.
#[derive(Debug, Clone, Copy)]
pub struct StringAdapter {
    direction: Direction,
}

impl StringAdapter {
    /// Create an adapter with an explicit direction.
    pub fn new(direction: Direction) -> Self {
        Self { direction }
    }

    /// Create the adapter for a parameter carrying `spec`.
    pub fn for_param(spec: &AdapterSpec, is_const: bool) -> Self {
        Self::new(spec.effective_direction(is_const))
    }

    /// The conversion direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Adapt a host string.
    pub fn adapt_str(&self, host: &str) -> Temporary<String> {
        let value = if self.direction == Direction::Out { String::new() } else { host.to_string() };
        Temporary::new(value, LABEL)
    }

    /// Adapt the NUL-terminated text of a byte handle; null adapts to empty.
    pub fn adapt(&self, host: &BytePointer) -> Result<Temporary<String>, ResourceError> {
        if self.direction == Direction::Out || (host.is_null() && !host.is_released()) {
            return Ok(Temporary::new(String::new(), LABEL));
        }
        Ok(Temporary::new(host.get_string()?, LABEL))
    }

    /// Copy `native` back into a byte handle, reallocating when it does not fit.
    pub fn read_back(&self, native: &str, host: &mut BytePointer) -> Result<(), ResourceError> {
        if !self.direction.reads_back() {
            return Ok(());
        }
        if !host.is_null() && host.room() > native.len() {
            host.put_string(native)?;
            return Ok(());
        }
        let reclaimer = host
            .deallocator()
            .and_then(|d| d.reclaimer())
            .cloned()
            .unwrap_or_else(|| Reclaimer::global().clone());
        let mut fresh = BytePointer::allocate_in(native.len() + 1, &reclaimer);
        fresh.put_string(native)?;
        *host = fresh;
        Ok(())
    }

    /// Copy `native` back into a host string if this adapter reads back.
    pub fn read_back_str(&self, native: &str, host: &mut String) {
        if self.direction.reads_back() {
            host.clear();
            host.push_str(native);
        }
    }

    /// Run `call` against the adapted string, then read back into `host`.
    pub fn scoped<R, F>(&self, host: &mut BytePointer, call: F) -> Result<R, NativeBindError>
    where
        F: FnOnce(&mut Temporary<String>) -> Result<R, NativeBindError>,
    {
        let mut temporary = self.adapt(host)?;
        let result = call(&mut temporary)?;
        self.read_back(&temporary, host)?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_handle_round_trip() {
        let adapter = StringAdapter::new(Direction::InOut);
        let mut host = BytePointer::from_string("abc");
        adapter
            .scoped(&mut host, |native| {
                assert_eq!(native.as_str(), "abc");
                native.truncate(1);
                Ok(())
            })
            .unwrap();
        assert_eq!(host.get_string().unwrap(), "a");
        assert_eq!(host.limit(), 1);
    }

    #[test]
    fn longer_result_reallocates() {
        let reclaimer = Reclaimer::manual();
        let adapter = StringAdapter::new(Direction::InOut);
        let mut host = BytePointer::allocate_in(2, &reclaimer);
        adapter
            .scoped(&mut host, |native| {
                native.push_str("longer than two");
                Ok(())
            })
            .unwrap();
        assert_eq!(host.get_string().unwrap(), "longer than two");
    }

    #[test]
    fn read_only_strings_are_left_alone() {
        let adapter = StringAdapter::new(Direction::In);
        let mut host = String::from("keep");
        let mut native = adapter.adapt_str(&host);
        native.push('!');
        adapter.read_back_str(&native, &mut host);
        assert_eq!(host, "keep");
    }

    #[test]
    fn out_direction_starts_empty() {
        let adapter = StringAdapter::new(Direction::Out);
        assert!(adapter.adapt_str("ignored").is_empty());
        let mut host = String::new();
        adapter.read_back_str("filled", &mut host);
        assert_eq!(host, "filled");
    }
}
