//! # Ingredient Matching Engine
//!
//! Matches free-text receipt line items against a user's personal ingredient
//! catalog. For each item the engine produces a best-effort, explainable
//! match: a three-tier classification (exact / partial / none), the best
//! candidate when it clears the exposure threshold, and ranked alternative
//! suggestions that drive the manual-correction UI.
//!
//! The engine is a pure transformation: it performs no I/O, holds no shared
//! state, and never mutates its inputs, so it can be invoked concurrently
//! from multiple request-handling tasks without locking. Persistence of the
//! produced result belongs to the caller (see [`crate::store`]).

use crate::config::MatchingConfig;
use crate::receipt::{ReceiptData, UNRECOGNIZED_NAME};
use crate::similarity::{normalize_name, similarity_score};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

/// A user's ingredient catalog: display name mapped to an opaque id.
///
/// A `BTreeMap` keeps iteration order deterministic, which in turn makes
/// tie-breaking between equally scored candidates deterministic.
pub type IngredientCatalog = BTreeMap<String, String>;

/// Match-quality tier derived from the similarity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Exact,
    Partial,
    None,
}

/// One ranked candidate offered for manual disambiguation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedMatch {
    pub name: String,
    pub id: String,
    pub score: f64,
}

/// The match record for one receipt line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientMatch {
    /// Receipt line this match belongs to. Carried explicitly so the mapping
    /// back to receipt lines survives skipped or deleted items.
    pub line_number: u32,
    /// Original (non-normalized) item name; immutable provenance field.
    pub receipt_item_name: String,
    /// Best candidate name, present only when the best score reaches the
    /// minimum exposure threshold.
    pub matched_ingredient_name: Option<String>,
    /// Catalog id paired 1:1 with `matched_ingredient_name`.
    pub matched_ingredient_id: Option<String>,
    pub match_status: MatchStatus,
    /// Best score found across the whole candidate catalog.
    pub similarity_score: f64,
    /// Up to `max_suggestions` best candidates regardless of tier, descending
    /// by score.
    #[serde(default)]
    pub suggested_matches: Vec<SuggestedMatch>,
}

/// Aggregate matching outcome for one receipt.
///
/// Counters are maintained incrementally and always satisfy
/// `total_items == exact_matches + partial_matches + no_matches == matches.len()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngredientMatchingResult {
    /// Match records in receipt line order; skipped items are omitted, so
    /// positions do not necessarily align with line numbers.
    pub matches: Vec<IngredientMatch>,
    pub total_items: usize,
    pub exact_matches: usize,
    pub partial_matches: usize,
    pub no_matches: usize,
}

impl IngredientMatchingResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a match record and bump the counter for its tier.
    pub fn add_match(&mut self, m: IngredientMatch) {
        match m.match_status {
            MatchStatus::Exact => self.exact_matches += 1,
            MatchStatus::Partial => self.partial_matches += 1,
            MatchStatus::None => self.no_matches += 1,
        }
        self.total_items += 1;
        self.matches.push(m);
    }
}

/// The matching engine: normalization + scoring + classification across one
/// receipt against an ingredient catalog.
#[derive(Debug, Clone, Default)]
pub struct IngredientMatcher {
    config: MatchingConfig,
}

impl IngredientMatcher {
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Classify a best score into its match tier.
    pub fn classify(&self, score: f64) -> MatchStatus {
        if score >= self.config.exact_match_threshold {
            MatchStatus::Exact
        } else if score >= self.config.partial_match_threshold {
            MatchStatus::Partial
        } else {
            MatchStatus::None
        }
    }

    /// Match every receipt line item against the candidate catalog.
    ///
    /// Items with empty names or the `"???"` sentinel are skipped and emit no
    /// match record. For everything else the engine runs a full
    /// O(items x candidates) scan; at the ingredient-list scale this system
    /// targets (tens to low hundreds of entries) this stays well inside one
    /// interactive turn.
    pub fn match_ingredients(
        &self,
        receipt: &ReceiptData,
        catalog: &IngredientCatalog,
    ) -> IngredientMatchingResult {
        debug!(
            item_count = receipt.items.len(),
            candidate_count = catalog.len(),
            "Matching receipt items against ingredient catalog"
        );

        let mut result = IngredientMatchingResult::new();

        for item in &receipt.items {
            let raw_name = item.name.trim();
            if raw_name.is_empty() || raw_name == UNRECOGNIZED_NAME {
                debug!(line_number = item.line_number, "Skipping unrecognized item");
                continue;
            }

            let normalized_item = normalize_name(&item.name);
            let mut scored = self.score_candidates(&normalized_item, catalog);

            // Strict comparison keeps the first (catalog-order) candidate on ties
            let (best_score, matched_name, matched_id) = {
                let best = scored
                    .iter()
                    .reduce(|best, cand| if cand.score > best.score { cand } else { best });
                match best {
                    Some(best) if best.score >= self.config.min_match_threshold => {
                        (best.score, Some(best.name.clone()), Some(best.id.clone()))
                    }
                    Some(best) => (best.score, None, None),
                    None => (0.0, None, None),
                }
            };

            scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
            scored.truncate(self.config.max_suggestions);

            result.add_match(IngredientMatch {
                line_number: item.line_number,
                receipt_item_name: item.name.clone(),
                matched_ingredient_name: matched_name,
                matched_ingredient_id: matched_id,
                match_status: self.classify(best_score),
                similarity_score: best_score,
                suggested_matches: scored,
            });
        }

        debug!(
            total = result.total_items,
            exact = result.exact_matches,
            partial = result.partial_matches,
            none = result.no_matches,
            "Receipt matching complete"
        );
        result
    }

    /// Rank catalog candidates against a free-text query.
    ///
    /// Used for the "search: <text>" manual-matching escape hatch and the
    /// standalone ingredient search. Applies the loose search floor and
    /// returns the raw ranked list; any stricter presentation filter is the
    /// caller's policy.
    pub fn get_similar_ingredients(
        &self,
        query: &str,
        catalog: &IngredientCatalog,
        limit: usize,
    ) -> Vec<SuggestedMatch> {
        let normalized_query = normalize_name(query);

        let mut scored = self.score_candidates(&normalized_query, catalog);
        scored.retain(|candidate| candidate.score > self.config.search_score_floor);
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(limit);

        debug!(
            query = %query,
            result_count = scored.len(),
            "Ingredient search complete"
        );
        scored
    }

    /// [`get_similar_ingredients`](Self::get_similar_ingredients) with the
    /// configured default result count.
    pub fn search_ingredients(
        &self,
        query: &str,
        catalog: &IngredientCatalog,
    ) -> Vec<SuggestedMatch> {
        self.get_similar_ingredients(query, catalog, self.config.default_search_limit)
    }

    /// Build the match record for an explicit user selection.
    ///
    /// Resolves the chosen id back to a catalog name (first match wins should
    /// duplicate ids exist). A manual human selection is always treated as
    /// maximally confident: the returned match is `Exact` with score 1.0,
    /// overriding whatever the automatic scorer would have produced. An
    /// unknown id degrades to a `None`/0.0 record rather than an error, so
    /// the caller always has a valid match to store and render.
    ///
    /// The returned record carries line number 0; the caller writing it back
    /// into a stored result assigns the real line (see [`crate::editing`]).
    pub fn manual_match_ingredient(
        &self,
        receipt_item_name: &str,
        chosen_id: &str,
        catalog: &IngredientCatalog,
    ) -> IngredientMatch {
        let resolved = catalog.iter().find(|(_, id)| id.as_str() == chosen_id);

        match resolved {
            Some((name, id)) => IngredientMatch {
                line_number: 0,
                receipt_item_name: receipt_item_name.to_string(),
                matched_ingredient_name: Some(name.clone()),
                matched_ingredient_id: Some(id.clone()),
                match_status: MatchStatus::Exact,
                similarity_score: 1.0,
                suggested_matches: Vec::new(),
            },
            None => {
                debug!(chosen_id = %chosen_id, "Manual match id not found in catalog");
                IngredientMatch {
                    line_number: 0,
                    receipt_item_name: receipt_item_name.to_string(),
                    matched_ingredient_name: None,
                    matched_ingredient_id: None,
                    match_status: MatchStatus::None,
                    similarity_score: 0.0,
                    suggested_matches: Vec::new(),
                }
            }
        }
    }

    /// Score every catalog candidate against an already-normalized name, in
    /// catalog (name) order.
    fn score_candidates(
        &self,
        normalized_name: &str,
        catalog: &IngredientCatalog,
    ) -> Vec<SuggestedMatch> {
        catalog
            .iter()
            .map(|(candidate_name, candidate_id)| SuggestedMatch {
                name: candidate_name.clone(),
                id: candidate_id.clone(),
                score: similarity_score(normalized_name, &normalize_name(candidate_name)),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receipt::ReceiptItem;

    fn matcher() -> IngredientMatcher {
        IngredientMatcher::new(MatchingConfig::default())
    }

    fn catalog(entries: &[(&str, &str)]) -> IngredientCatalog {
        entries
            .iter()
            .map(|(name, id)| (name.to_string(), id.to_string()))
            .collect()
    }

    fn receipt(names: &[&str]) -> ReceiptData {
        ReceiptData::new(
            names
                .iter()
                .enumerate()
                .map(|(i, name)| ReceiptItem::with_name(i as u32 + 1, name))
                .collect(),
        )
    }

    fn assert_counters(result: &IngredientMatchingResult) {
        assert_eq!(
            result.total_items,
            result.exact_matches + result.partial_matches + result.no_matches
        );
        assert_eq!(result.total_items, result.matches.len());
    }

    #[test]
    fn test_exact_match_case_insensitive() {
        let catalog = catalog(&[("Tomato", "id1"), ("Fresh Milk", "id2")]);
        let result = matcher().match_ingredients(&receipt(&["tomato"]), &catalog);

        assert_counters(&result);
        assert_eq!(result.exact_matches, 1);

        let m = &result.matches[0];
        assert_eq!(m.match_status, MatchStatus::Exact);
        assert!((m.similarity_score - 1.0).abs() < f64::EPSILON);
        assert_eq!(m.matched_ingredient_name.as_deref(), Some("Tomato"));
        assert_eq!(m.matched_ingredient_id.as_deref(), Some("id1"));
        assert_eq!(m.receipt_item_name, "tomato");
        assert_eq!(m.line_number, 1);
    }

    #[test]
    fn test_stop_words_stripped_on_both_sides() {
        // "Fresh Milk" normalizes to "milk", so a bare "milk" item matches exactly
        let catalog = catalog(&[("Fresh Milk", "id2")]);
        let result = matcher().match_ingredients(&receipt(&["milk"]), &catalog);

        let m = &result.matches[0];
        assert_eq!(m.match_status, MatchStatus::Exact);
        assert_eq!(m.matched_ingredient_name.as_deref(), Some("Fresh Milk"));
    }

    #[test]
    fn test_substring_overlap_exposes_name_below_partial_tier() {
        // "Fresh Tomatoes 1kg" vs "Tomato" lands at 0.5: below the partial
        // tier, above the exposure threshold
        let catalog = catalog(&[("Tomato", "id1")]);
        let result = matcher().match_ingredients(&receipt(&["Fresh Tomatoes 1kg"]), &catalog);

        let m = &result.matches[0];
        assert_eq!(m.match_status, MatchStatus::None);
        assert!((m.similarity_score - 0.5).abs() < 1e-9);
        assert_eq!(m.matched_ingredient_name.as_deref(), Some("Tomato"));
        assert_eq!(m.matched_ingredient_id.as_deref(), Some("id1"));
    }

    #[test]
    fn test_partial_tier_classification() {
        let catalog = catalog(&[("Apple Green", "id1")]);
        let result = matcher().match_ingredients(&receipt(&["green apple"]), &catalog);

        let m = &result.matches[0];
        assert_eq!(m.match_status, MatchStatus::Partial);
        assert!(m.similarity_score >= 0.60 && m.similarity_score < 0.95);
        assert_eq!(m.matched_ingredient_name.as_deref(), Some("Apple Green"));
    }

    #[test]
    fn test_low_score_hides_matched_name() {
        let catalog = catalog(&[("Washing Liquid", "id9")]);
        let result = matcher().match_ingredients(&receipt(&["banana"]), &catalog);

        let m = &result.matches[0];
        assert_eq!(m.match_status, MatchStatus::None);
        assert!(m.similarity_score < 0.40);
        assert!(m.matched_ingredient_name.is_none());
        assert!(m.matched_ingredient_id.is_none());
        // Suggestions still populated so the UI can offer alternatives
        assert_eq!(m.suggested_matches.len(), 1);
    }

    #[test]
    fn test_skip_rule() {
        let catalog = catalog(&[("Tomato", "id1")]);
        let result = matcher().match_ingredients(&receipt(&["", "???", "  ", "tomato"]), &catalog);

        assert_counters(&result);
        assert_eq!(result.total_items, 1);
        assert_eq!(result.matches[0].receipt_item_name, "tomato");
        assert_eq!(result.matches[0].line_number, 4);
    }

    #[test]
    fn test_empty_catalog() {
        let result = matcher().match_ingredients(&receipt(&["tomato", "milk"]), &catalog(&[]));

        assert_counters(&result);
        assert_eq!(result.total_items, 2);
        assert_eq!(result.no_matches, 2);
        for m in &result.matches {
            assert_eq!(m.match_status, MatchStatus::None);
            assert_eq!(m.similarity_score, 0.0);
            assert!(m.matched_ingredient_name.is_none());
            assert!(m.suggested_matches.is_empty());
        }
    }

    #[test]
    fn test_empty_receipt() {
        let result = matcher().match_ingredients(
            &ReceiptData::default(),
            &catalog(&[("Tomato", "id1")]),
        );
        assert_eq!(result.total_items, 0);
        assert!(result.matches.is_empty());
    }

    #[test]
    fn test_suggestions_sorted_and_capped() {
        let catalog = catalog(&[
            ("Tomato", "id1"),
            ("Cherry Tomato", "id2"),
            ("Potato", "id3"),
            ("Sweet Potato", "id4"),
            ("Milk", "id5"),
            ("Butter", "id6"),
            ("Flour", "id7"),
        ]);
        let result = matcher().match_ingredients(&receipt(&["tomato"]), &catalog);

        let suggestions = &result.matches[0].suggested_matches;
        assert_eq!(suggestions.len(), 5);
        for pair in suggestions.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert_eq!(suggestions[0].name, "Tomato");
    }

    #[test]
    fn test_suggestion_length_bounded_by_catalog() {
        let catalog = catalog(&[("Tomato", "id1"), ("Milk", "id2")]);
        let result = matcher().match_ingredients(&receipt(&["tomato"]), &catalog);
        assert_eq!(result.matches[0].suggested_matches.len(), 2);
    }

    #[test]
    fn test_determinism() {
        let catalog = catalog(&[
            ("Tomato", "id1"),
            ("Potato", "id2"),
            ("Milk", "id3"),
            ("Butter", "id4"),
        ]);
        let receipt = receipt(&["tomato", "mikl", "bread"]);
        let m = matcher();

        let first = m.match_ingredients(&receipt, &catalog);
        let second = m.match_ingredients(&receipt, &catalog);
        assert_eq!(first, second);

        let search_a = m.get_similar_ingredients("tom", &catalog, 10);
        let search_b = m.get_similar_ingredients("tom", &catalog, 10);
        assert_eq!(search_a, search_b);
    }

    #[test]
    fn test_tier_and_exposure_invariants() {
        let catalog = catalog(&[
            ("Tomato", "id1"),
            ("Cherry Tomato", "id2"),
            ("Whole Milk", "id3"),
            ("Unsalted Butter", "id4"),
            ("Washing Liquid", "id5"),
        ]);
        let receipt = receipt(&[
            "tomato",
            "Fresh Tomatoes 1kg",
            "milk",
            "butter unsalted",
            "dog food",
            "batteries",
        ]);
        let result = matcher().match_ingredients(&receipt, &catalog);

        assert_counters(&result);
        for m in &result.matches {
            match m.match_status {
                MatchStatus::Exact => assert!(m.similarity_score >= 0.95),
                MatchStatus::Partial => {
                    assert!(m.similarity_score >= 0.60 && m.similarity_score < 0.95)
                }
                MatchStatus::None => assert!(m.similarity_score < 0.60),
            }
            assert_eq!(
                m.matched_ingredient_name.is_some(),
                m.similarity_score >= 0.40
            );
            assert_eq!(
                m.matched_ingredient_name.is_some(),
                m.matched_ingredient_id.is_some()
            );
        }
    }

    #[test]
    fn test_search_ranks_and_filters() {
        let catalog = catalog(&[("Tomato", "id1"), ("Potato", "id2")]);
        let results = matcher().get_similar_ingredients("tom", &catalog, 10);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "Tomato");
        assert!(results[0].score > results[1].score);
        for r in &results {
            assert!(r.score > 0.10);
        }
    }

    #[test]
    fn test_search_drops_unrelated_candidates() {
        let catalog = catalog(&[("Tomato", "id1"), ("Milk", "id2")]);
        let results = matcher().get_similar_ingredients("zzzz", &catalog, 10);
        assert!(results.is_empty());
    }

    #[test]
    fn test_search_default_limit() {
        let catalog: IngredientCatalog = (0..15)
            .map(|i| (format!("Tomato {:02}", i), format!("id{}", i)))
            .collect();
        let results = matcher().search_ingredients("tomato", &catalog);
        assert_eq!(results.len(), MatchingConfig::default().default_search_limit);
    }

    #[test]
    fn test_search_respects_limit() {
        let catalog = catalog(&[
            ("Tomato", "id1"),
            ("Cherry Tomato", "id2"),
            ("Tomato Paste", "id3"),
        ]);
        let results = matcher().get_similar_ingredients("tomato", &catalog, 2);
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_manual_match_valid_id() {
        let catalog = catalog(&[("Tomato", "id1"), ("Milk", "id2")]);
        let m = matcher().manual_match_ingredient("Roma tomatoes", "id1", &catalog);

        assert_eq!(m.match_status, MatchStatus::Exact);
        assert_eq!(m.similarity_score, 1.0);
        assert_eq!(m.matched_ingredient_name.as_deref(), Some("Tomato"));
        assert_eq!(m.matched_ingredient_id.as_deref(), Some("id1"));
        assert_eq!(m.receipt_item_name, "Roma tomatoes");
    }

    #[test]
    fn test_manual_match_unknown_id() {
        let catalog = catalog(&[("Tomato", "id1")]);
        let m = matcher().manual_match_ingredient("X", "missing_id", &catalog);

        assert_eq!(m.match_status, MatchStatus::None);
        assert_eq!(m.similarity_score, 0.0);
        assert!(m.matched_ingredient_name.is_none());
        assert!(m.suggested_matches.is_empty());
    }

    #[test]
    fn test_result_serialization_round_trip() {
        let catalog = catalog(&[("Tomato", "id1"), ("Milk", "id2")]);
        let result = matcher().match_ingredients(&receipt(&["tomato", "bread"]), &catalog);

        let json = serde_json::to_string(&result).unwrap();
        let restored: IngredientMatchingResult = serde_json::from_str(&json).unwrap();
        assert_eq!(result, restored);
    }
}
