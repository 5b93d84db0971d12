//! Native scope resolution.
//!
//! A declaration's native name is scoped by the namespace annotations of the
//! declaration itself and of every enclosing class:
//!
//! - nested declarations inherit the enclosing native scope,
//! - an annotation may hold a `::`-separated path, which nests further,
//! - a path starting with `::` resets to the global scope,
//! - an empty annotation marks the identifier as unscoped (macros, operators),
//!   so it is emitted bare and never prefixed.
//!
//! # Examples
//!
//! ```
//! use nativebind_core::{NativeName, NativeScope};
//!
//! let outer = vec!["cv".to_string()];
//! let name = NativeName::resolve(&outer, &NativeScope::parse(Some("detail")), "Mat");
//! assert_eq!(name.qualified(), "cv::detail::Mat");
//!
//! let reset = NativeName::resolve(&outer, &NativeScope::parse(Some("::std")), "string");
//! assert_eq!(reset.qualified(), "std::string");
//!
//! let bare = NativeName::resolve(&outer, &NativeScope::parse(Some("")), "CV_VERSION");
//! assert_eq!(bare.qualified(), "CV_VERSION");
//! ```

use std::fmt;

/// A parsed namespace annotation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NativeScope {
    /// No annotation: inherit the enclosing scope.
    #[default]
    Inherit,
    /// A relative path appended to the enclosing scope.
    Relative(Vec<String>),
    /// A path starting with `::`, resetting to the global scope.
    Absolute(Vec<String>),
    /// An empty annotation: the identifier does not support namespaces.
    Unscoped,
}

impl NativeScope {
    /// Parse an optional namespace annotation value.
    pub fn parse(annotation: Option<&str>) -> Self {
        let Some(value) = annotation else {
            return NativeScope::Inherit;
        };
        let value = value.trim();
        if value.is_empty() {
            return NativeScope::Unscoped;
        }
        let segments = split_path(value);
        if value.starts_with("::") {
            NativeScope::Absolute(segments)
        } else {
            NativeScope::Relative(segments)
        }
    }

    /// Apply this annotation to an enclosing scope path.
    ///
    /// Returns `None` for [`NativeScope::Unscoped`].
    pub fn apply(&self, enclosing: &[String]) -> Option<Vec<String>> {
        match self {
            NativeScope::Inherit => Some(enclosing.to_vec()),
            NativeScope::Relative(path) => {
                let mut out = enclosing.to_vec();
                out.extend(path.iter().cloned());
                Some(out)
            }
            NativeScope::Absolute(path) => Some(path.clone()),
            NativeScope::Unscoped => None,
        }
    }
}

/// A fully resolved native identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NativeName {
    /// Simple identifier (e.g. `vector`, `operator+`).
    pub name: String,
    /// Namespace path, outermost first. Empty for the global scope.
    pub namespace: Vec<String>,
    /// Whether the identifier is emitted bare (no namespace support).
    pub unscoped: bool,
}

impl NativeName {
    /// Create a name in the global scope.
    pub fn global(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Vec::new(),
            unscoped: false,
        }
    }

    /// Create an unscoped identifier.
    pub fn unscoped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Vec::new(),
            unscoped: true,
        }
    }

    /// Resolve `name` inside `enclosing` under the given annotation.
    ///
    /// The name itself may carry a `::` path; its leading segments nest under
    /// the annotated scope, and a leading `::` resets to the global scope.
    pub fn resolve(enclosing: &[String], scope: &NativeScope, name: &str) -> Self {
        let Some(mut namespace) = scope.apply(enclosing) else {
            return Self::unscoped(name.trim_start_matches("::"));
        };
        if name.starts_with("::") {
            namespace.clear();
        }
        let mut segments = split_path(name);
        let simple = segments.pop().unwrap_or_default();
        namespace.extend(segments);
        Self {
            name: simple,
            namespace,
            unscoped: false,
        }
    }

    /// Check if this name lives in the global scope.
    pub fn is_global(&self) -> bool {
        self.namespace.is_empty()
    }

    /// The `::`-joined native spelling.
    pub fn qualified(&self) -> String {
        if self.unscoped || self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}::{}", self.namespace.join("::"), self.name)
        }
    }

    /// The scope path to hand to nested declarations.
    ///
    /// An unscoped class still scopes its members by its own name.
    pub fn child_scope(&self) -> Vec<String> {
        let mut scope = if self.unscoped {
            Vec::new()
        } else {
            self.namespace.clone()
        };
        scope.push(self.name.clone());
        scope
    }

    /// A C identifier derived from the qualified name.
    pub fn mangled(&self) -> String {
        mangle(&self.qualified())
    }
}

impl fmt::Display for NativeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualified())
    }
}

/// Turn an arbitrary native spelling into a C identifier fragment.
///
/// `::` becomes `_`, other non-identifier characters become `_` as well,
/// and runs of `_` are collapsed.
pub fn mangle(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        let mapped = if ch.is_ascii_alphanumeric() { ch } else { '_' };
        if mapped == '_' && out.ends_with('_') {
            continue;
        }
        out.push(mapped);
    }
    out.trim_matches('_').to_string()
}

fn split_path(path: &str) -> Vec<String> {
    path.split("::")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
