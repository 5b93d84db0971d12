//! Argument and return slots for one callback invocation.

use std::fmt;

use nativebind_core::HostFailure;

/// A marshaled native value crossing a callback boundary.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum NativeValue {
    #[default]
    Void,
    Bool(bool),
    Int(i64),
    Float(f64),
    Address(usize),
    Str(String),
}

impl NativeValue {
    /// Short name of the value's kind, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            NativeValue::Void => "void",
            NativeValue::Bool(_) => "bool",
            NativeValue::Int(_) => "int",
            NativeValue::Float(_) => "float",
            NativeValue::Address(_) => "address",
            NativeValue::Str(_) => "string",
        }
    }
}

impl fmt::Display for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeValue::Void => write!(f, "void"),
            NativeValue::Bool(v) => write!(f, "{v}"),
            NativeValue::Int(v) => write!(f, "{v}"),
            NativeValue::Float(v) => write!(f, "{v}"),
            NativeValue::Address(v) => write!(f, "{v:#x}"),
            NativeValue::Str(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<bool> for NativeValue {
    fn from(value: bool) -> Self {
        NativeValue::Bool(value)
    }
}

impl From<i32> for NativeValue {
    fn from(value: i32) -> Self {
        NativeValue::Int(i64::from(value))
    }
}

impl From<i64> for NativeValue {
    fn from(value: i64) -> Self {
        NativeValue::Int(value)
    }
}

impl From<f64> for NativeValue {
    fn from(value: f64) -> Self {
        NativeValue::Float(value)
    }
}

impl From<usize> for NativeValue {
    fn from(value: usize) -> Self {
        NativeValue::Address(value)
    }
}

impl From<String> for NativeValue {
    fn from(value: String) -> Self {
        NativeValue::Str(value)
    }
}

impl From<&str> for NativeValue {
    fn from(value: &str) -> Self {
        NativeValue::Str(value.to_string())
    }
}

/// Arguments passed by the native caller and the slot for the return value.
///
/// ```
/// use nativebind_runtime::callback::CallFrame;
///
/// let mut frame = CallFrame::new([2i64.into(), 3i64.into()]);
/// let sum = frame.int(0).unwrap() + frame.int(1).unwrap();
/// frame.set_return(sum);
/// assert_eq!(frame.return_value().to_string(), "5");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallFrame {
    args: Vec<NativeValue>,
    ret: NativeValue,
}

impl CallFrame {
    /// Create a frame over `args` with a void return slot.
    pub fn new(args: impl IntoIterator<Item = NativeValue>) -> Self {
        Self {
            args: args.into_iter().collect(),
            ret: NativeValue::Void,
        }
    }

    /// Number of arguments.
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Raw argument slot.
    pub fn arg(&self, index: usize) -> Result<&NativeValue, HostFailure> {
        self.args.get(index).ok_or_else(|| {
            HostFailure::new(format!(
                "argument {index} out of bounds ({} arguments)",
                self.args.len()
            ))
        })
    }

    fn mismatch(&self, index: usize, expected: &str) -> HostFailure {
        let found = self.args.get(index).map_or("nothing", NativeValue::kind_name);
        HostFailure::new(format!("argument {index}: expected {expected}, found {found}"))
    }

    pub fn bool(&self, index: usize) -> Result<bool, HostFailure> {
        match self.arg(index)? {
            NativeValue::Bool(v) => Ok(*v),
            _ => Err(self.mismatch(index, "bool")),
        }
    }

    pub fn int(&self, index: usize) -> Result<i64, HostFailure> {
        match self.arg(index)? {
            NativeValue::Int(v) => Ok(*v),
            _ => Err(self.mismatch(index, "int")),
        }
    }

    /// Floating argument; integer arguments widen.
    pub fn float(&self, index: usize) -> Result<f64, HostFailure> {
        match self.arg(index)? {
            NativeValue::Float(v) => Ok(*v),
            NativeValue::Int(v) => Ok(*v as f64),
            _ => Err(self.mismatch(index, "float")),
        }
    }

    pub fn address(&self, index: usize) -> Result<usize, HostFailure> {
        match self.arg(index)? {
            NativeValue::Address(v) => Ok(*v),
            _ => Err(self.mismatch(index, "address")),
        }
    }

    pub fn str(&self, index: usize) -> Result<&str, HostFailure> {
        match self.arg(index)? {
            NativeValue::Str(v) => Ok(v),
            _ => Err(self.mismatch(index, "string")),
        }
    }

    /// Set the return value.
    pub fn set_return(&mut self, value: impl Into<NativeValue>) {
        self.ret = value.into();
    }

    /// The current return value.
    pub fn return_value(&self) -> &NativeValue {
        &self.ret
    }

    /// Consume the frame, yielding the return value.
    pub fn into_return(self) -> NativeValue {
        self.ret
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_access() {
        let frame = CallFrame::new([true.into(), 7i32.into(), 1.5f64.into(), "hi".into(), 0x10usize.into()]);
        assert_eq!(frame.arg_count(), 5);
        assert!(frame.bool(0).unwrap());
        assert_eq!(frame.int(1).unwrap(), 7);
        assert_eq!(frame.float(1).unwrap(), 7.0);
        assert_eq!(frame.float(2).unwrap(), 1.5);
        assert_eq!(frame.str(3).unwrap(), "hi");
        assert_eq!(frame.address(4).unwrap(), 0x10);
    }

    #[test]
    fn mismatches_are_host_failures() {
        let frame = CallFrame::new(["text".into()]);
        let err = frame.int(0).unwrap_err();
        assert_eq!(err.message, "argument 0: expected int, found string");
        let err = frame.int(3).unwrap_err();
        assert!(err.message.contains("out of bounds"));
    }

    #[test]
    fn return_slot_defaults_to_void() {
        let mut frame = CallFrame::default();
        assert_eq!(frame.return_value(), &NativeValue::Void);
        frame.set_return("done");
        assert_eq!(frame.into_return(), NativeValue::Str("done".into()));
    }
}
