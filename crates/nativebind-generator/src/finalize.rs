//! Finalize phase: scoped-resource discipline and identifier uniqueness.
//!
//! Checks run over the emitted text, so they hold no matter which emitter
//! produced a function:
//!
//! - every symbol is defined once;
//! - every trampoline brackets its dispatch with exactly one attach guard;
//! - every adapter temporary is declared exactly once;
//! - no-exception bodies contain no exception handling;
//! - braces balance.
//!
//! A function failing a check is dropped and reported. Functions emitted for
//! the same declaration are dropped with it.

use nativebind_core::GenerationError;
use rustc_hash::FxHashSet;
use tracing::warn;

use crate::emit::{EmittedFunction, FunctionKind};

const ATTACH_GUARD: &str = "nb_attach_guard nb_guard;";

/// Check one function in isolation.
pub fn check_function(function: &EmittedFunction) -> Result<(), GenerationError> {
    let unbalanced = |detail: String| GenerationError::UnbalancedScope {
        decl: function.decl.clone(),
        detail,
    };
    let body = &function.body;

    if function.kind == FunctionKind::Trampoline {
        let guards = body.matches(ATTACH_GUARD).count();
        if guards != 1 {
            return Err(unbalanced(format!("{} has {guards} attach guards", function.symbol)));
        }
    }

    for temporary in &function.temporaries {
        let declarations = body.matches(&format!(" {temporary}(")).count();
        if declarations != 1 {
            return Err(unbalanced(format!(
                "{} declares temporary {temporary} {declarations} times",
                function.symbol
            )));
        }
    }

    if function.no_exception && (body.contains("try {") || body.contains("catch (")) {
        return Err(unbalanced(format!(
            "{} handles exceptions but is marked no-exception",
            function.symbol
        )));
    }

    let opened = body.matches('{').count();
    let closed = body.matches('}').count();
    if opened != closed {
        return Err(unbalanced(format!(
            "{} opens {opened} blocks and closes {closed}",
            function.symbol
        )));
    }
    Ok(())
}

/// Check every function, returning the survivors in order and the errors.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn finalize(functions: Vec<EmittedFunction>) -> (Vec<EmittedFunction>, Vec<GenerationError>) {
    let mut errors = Vec::new();
    let mut failed: FxHashSet<String> = FxHashSet::default();
    let mut symbols: FxHashSet<&str> = FxHashSet::default();

    for function in &functions {
        if failed.contains(&function.decl) {
            continue;
        }
        let result = if symbols.insert(function.symbol.as_str()) {
            check_function(function)
        } else {
            Err(GenerationError::DuplicateDeclaration {
                decl: function.decl.clone(),
            })
        };
        if let Err(err) = result {
            warn!(decl = %function.decl, symbol = %function.symbol, error = %err, "dropping emitted function");
            failed.insert(function.decl.clone());
            errors.push(err);
        }
    }

    let kept = functions
        .into_iter()
        .filter(|f| !failed.contains(&f.decl))
        .collect();
    (kept, errors)
}
