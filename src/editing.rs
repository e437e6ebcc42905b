//! # Manual-Correction Bookkeeping
//!
//! The matching engine produces immutable results; applying a user's manual
//! corrections to a stored result is the concern of this module. Each
//! correction rewrites the four mutable fields of one match record (matched
//! name, matched id, status, score), leaves the provenance fields and the
//! suggestion list untouched, keeps the tier counters consistent, and records
//! the touched index in a caller-owned changed set so edits can be persisted
//! and highlighted.

use crate::errors::{error_logging, AppError, AppResult};
use crate::matching::{IngredientMatchingResult, MatchStatus, SuggestedMatch};
use std::collections::HashSet;
use tracing::debug;

/// Indices of match records the user has corrected by hand.
///
/// Owned by the caller and persisted alongside the result; the engine never
/// touches it.
pub type ChangedIndices = HashSet<usize>;

/// Apply an explicit user selection to one match record.
///
/// A human choice is maximally confident: the record becomes an `Exact` match
/// with score 1.0 regardless of what the automatic scorer produced. The
/// receipt item name, line number and suggestion list are preserved so the UI
/// can still offer alternatives if the user changes their mind.
///
/// Returns `AppError::Validation` when `index` is out of range against the
/// result — the bounds check lives here, with the mutation, not in the engine.
pub fn apply_manual_correction(
    result: &mut IngredientMatchingResult,
    index: usize,
    ingredient_name: &str,
    ingredient_id: &str,
    changed: &mut ChangedIndices,
) -> AppResult<()> {
    if index >= result.matches.len() {
        let err = AppError::Validation(format!(
            "match index {} out of range ({} matches)",
            index,
            result.matches.len()
        ));
        error_logging::log_validation_error(
            &err,
            "apply_manual_correction",
            "match_index",
            Some(&index.to_string()),
        );
        return Err(err);
    }

    let old_status = result.matches[index].match_status;

    let entry = &mut result.matches[index];
    entry.matched_ingredient_name = Some(ingredient_name.to_string());
    entry.matched_ingredient_id = Some(ingredient_id.to_string());
    entry.match_status = MatchStatus::Exact;
    entry.similarity_score = 1.0;

    if old_status != MatchStatus::Exact {
        match old_status {
            MatchStatus::Partial => result.partial_matches -= 1,
            MatchStatus::None => result.no_matches -= 1,
            MatchStatus::Exact => {}
        }
        result.exact_matches += 1;
    }

    changed.insert(index);
    debug!(
        index = index,
        ingredient = %ingredient_name,
        "Applied manual ingredient correction"
    );
    Ok(())
}

/// Apply one of the engine's ranked suggestions to a match record.
///
/// Selecting a suggestion is the same act of human confirmation as a manual
/// pick, so it carries the same confidence semantics.
pub fn apply_suggested_match(
    result: &mut IngredientMatchingResult,
    index: usize,
    suggestion: &SuggestedMatch,
    changed: &mut ChangedIndices,
) -> AppResult<()> {
    apply_manual_correction(result, index, &suggestion.name, &suggestion.id, changed)
}

/// True when every match record has a confirmed or confident candidate,
/// i.e. nothing remains in the `None` tier.
pub fn is_fully_matched(result: &IngredientMatchingResult) -> bool {
    result.no_matches == 0
}
