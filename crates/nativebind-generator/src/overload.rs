//! Cast-cost ranking of candidate native overloads.
//!
//! A candidate is viable when it takes exactly as many parameters as the
//! declaration maps. Its cost is the number of positions whose native type
//! differs from the mapped argument type, each needing an explicit cast.
//! The cheapest viable candidate wins; ties go to the first one listed.

use nativebind_core::{GenerationError, NativeSignature};
use tracing::trace;

use crate::type_map::MappedParam;

/// The chosen candidate and the positions that need a cast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverloadMatch {
    /// Index into the candidate list.
    pub index: usize,
    /// Argument positions cast to the candidate's parameter type.
    pub casts: Vec<usize>,
}

impl OverloadMatch {
    /// Total conversion cost.
    pub fn cost(&self) -> usize {
        self.casts.len()
    }
}

/// Canonical spelling of a native type, for comparison only.
///
/// Runs of whitespace collapse to one space, and no space is kept next to
/// `*`, `&`, `<`, `>` or `,`.
pub fn normalize_type(ty: &str) -> String {
    let collapsed = ty.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut out = String::with_capacity(collapsed.len());
    let tight = |c: char| matches!(c, '*' | '&' | '<' | '>' | ',');
    let chars: Vec<char> = collapsed.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c == ' ' {
            let before = i > 0 && tight(chars[i - 1]);
            let after = chars.get(i + 1).is_some_and(|&n| tight(n));
            if before || after {
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn rank(args: &[MappedParam], candidate: &NativeSignature) -> Vec<usize> {
    args.iter()
        .zip(&candidate.params)
        .enumerate()
        .filter(|(_, (arg, param))| normalize_type(&arg.native_type) != normalize_type(param))
        .map(|(i, _)| i)
        .collect()
}

/// Pick the best candidate for `args`.
///
/// Returns `Ok(None)` when there are no candidates to choose from.
pub fn find_best_match(
    decl: &str,
    args: &[MappedParam],
    candidates: &[NativeSignature],
) -> Result<Option<OverloadMatch>, GenerationError> {
    if candidates.is_empty() {
        return Ok(None);
    }

    let mut best: Option<OverloadMatch> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        if candidate.params.len() != args.len() {
            continue;
        }
        let casts = rank(args, candidate);
        trace!(decl, index, cost = casts.len(), "ranked candidate");
        // strict comparison keeps the earlier candidate on a tie
        if best.as_ref().is_none_or(|b| casts.len() < b.cost()) {
            best = Some(OverloadMatch { index, casts });
        }
    }

    best.map(Some).ok_or_else(|| GenerationError::NoMatchingOverload {
        decl: decl.to_string(),
        arity: args.len(),
    })
}

/// Insert the casts of `selected` into `args`.
pub fn apply_casts(args: &mut [MappedParam], candidate: &NativeSignature, selected: &OverloadMatch) {
    for &i in &selected.casts {
        if let (Some(arg), Some(param)) = (args.get_mut(i), candidate.params.get(i)) {
            arg.cast_to(param);
        }
    }
}
