//! Fuzzy name resolution between compound names and catalog names.
//!
//! Matching is the dominant cost of the pipeline: every compound name is
//! scored against every catalog name. Each query is pure and independent of
//! all others — matched candidates are never consumed, so many compounds may
//! resolve to the same catalog drug — which makes the scan embarrassingly
//! parallel. Queries are distributed across a Rayon pool over one shared
//! read-only candidate index, and results are collected back in input order.

use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

use crate::extract::CatalogDrug;
use crate::normalize::normalize_name;
use crate::tables::CompoundRecord;

/// Minimum similarity score (0-100) for a match to be accepted.
pub const DEFAULT_THRESHOLD: f64 = 80.0;

/// A scored candidate returned by a matcher.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestMatch {
    /// Position of the winning candidate in the candidate set
    pub index: usize,

    /// Similarity score on a 0-100 scale
    pub score: f64,
}

/// Pluggable best-match oracle over a fixed candidate set.
///
/// Implementations must be pure per query: the result for one query never
/// depends on which other queries have been resolved. `Sync` so a single
/// matcher can be shared across the worker pool.
pub trait NameMatcher: Sync {
    /// Return the best-scoring candidate at or above `threshold`, or `None`.
    fn best_match(&self, query: &str, candidates: &[String], threshold: f64) -> Option<BestMatch>;
}

/// Token-sort similarity matcher.
///
/// Names are compared as unordered bags of whitespace-delimited tokens: both
/// sides are split, sorted, rejoined, and compared by normalized Levenshtein
/// distance scaled to 0-100. "sodium chloride" therefore scores 100 against
/// "chloride sodium", and partial token overlap degrades gracefully.
pub struct TokenSortMatcher;

/// Rejoin a name's whitespace tokens in sorted order.
fn sort_tokens(name: &str) -> String {
    let mut tokens: Vec<&str> = name.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Token-sort ratio between two names, on a 0-100 scale.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&sort_tokens(a), &sort_tokens(b)) * 100.0
}

impl NameMatcher for TokenSortMatcher {
    fn best_match(&self, query: &str, candidates: &[String], threshold: f64) -> Option<BestMatch> {
        // An empty normalized name is never matchable
        if query.is_empty() {
            return None;
        }

        let mut best: Option<BestMatch> = None;
        for (index, candidate) in candidates.iter().enumerate() {
            let score = token_sort_ratio(query, candidate);
            // Strictly-greater keeps the first of any tied candidates, so the
            // result is deterministic for a fixed candidate ordering
            if best.map_or(true, |b| score > b.score) {
                best = Some(BestMatch { index, score });
            }
        }

        best.filter(|b| b.score >= threshold)
    }
}

/// Immutable candidate index over the catalog, built once and shared
/// read-only by every resolution task.
pub struct CandidateIndex {
    /// Normalized catalog names; position i corresponds to catalog record i
    pub names: Vec<String>,
}

impl CandidateIndex {
    pub fn build(catalog: &[CatalogDrug]) -> Self {
        CandidateIndex {
            names: catalog.iter().map(|drug| normalize_name(&drug.name)).collect(),
        }
    }
}

/// Resolve every compound against the candidate index in parallel.
///
/// Returns one entry per compound, in input order: the catalog index of the
/// best match at or above `threshold`, or `None` for unresolved names. An
/// unresolved name is not an error; consolidation fills the catalog side with
/// nulls.
pub fn resolve_links(
    compounds: &[CompoundRecord],
    index: &CandidateIndex,
    matcher: &dyn NameMatcher,
    threshold: f64,
) -> Vec<Option<usize>> {
    let resolved = AtomicUsize::new(0);

    let links: Vec<Option<usize>> = compounds
        .par_iter()
        .map(|compound| {
            let count = resolved.fetch_add(1, Ordering::Relaxed) + 1;
            if count % 1000 == 0 {
                info!("resolved {} of {} compound names...", count, compounds.len());
            }
            let query = normalize_name(&compound.name);
            matcher
                .best_match(&query, &index.names, threshold)
                .map(|best| best.index)
        })
        .collect();

    let matched = links.iter().filter(|link| link.is_some()).count();
    info!(
        "name resolution complete: {} matched, {} unmatched",
        matched,
        links.len() - matched
    );

    links
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn exact_normalized_form_scores_top() {
        let set = candidates(&["ibuprofen", "aspirin", "warfarin"]);
        let best = TokenSortMatcher
            .best_match("aspirin", &set, DEFAULT_THRESHOLD)
            .expect("exact form must match");
        assert_eq!(best.index, 1);
        assert_eq!(best.score, 100.0);
    }

    #[test]
    fn token_reordering_scores_as_exact() {
        assert_eq!(token_sort_ratio("sodium chloride", "chloride sodium"), 100.0);

        let set = candidates(&["chloride sodium"]);
        let best = TokenSortMatcher
            .best_match("sodium chloride", &set, DEFAULT_THRESHOLD)
            .expect("reordered tokens must match");
        assert_eq!(best.score, 100.0);
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        // "abcd" vs "abcx": one edit over four characters = score 75.0
        let set = candidates(&["abcx"]);
        assert_eq!(token_sort_ratio("abcd", "abcx"), 75.0);

        let at = TokenSortMatcher.best_match("abcd", &set, 75.0);
        assert!(at.is_some());

        let below = TokenSortMatcher.best_match("abcd", &set, 76.0);
        assert!(below.is_none());
    }

    #[test]
    fn empty_query_never_matches() {
        let set = candidates(&["", "aspirin"]);
        assert!(TokenSortMatcher.best_match("", &set, 0.0).is_none());
    }

    #[test]
    fn tied_candidates_resolve_to_the_first() {
        let set = candidates(&["aspirin", "aspirin"]);
        let best = TokenSortMatcher
            .best_match("aspirin", &set, DEFAULT_THRESHOLD)
            .unwrap();
        assert_eq!(best.index, 0);
    }

    #[test]
    fn resolution_preserves_input_order_and_permits_many_to_one() {
        let catalog = vec![
            CatalogDrug {
                name: "Aspirin".to_string(),
                ..CatalogDrug::default()
            },
            CatalogDrug {
                name: "Warfarin".to_string(),
                ..CatalogDrug::default()
            },
        ];
        let index = CandidateIndex::build(&catalog);

        let compounds: Vec<CompoundRecord> = ["  ASPIRIN ", "warfarin", "zzzxyz", "Aspirin"]
            .iter()
            .enumerate()
            .map(|(i, name)| CompoundRecord {
                compound_key: format!("c{}", i),
                name: name.to_string(),
                atc_code: None,
                indications: None,
                side_effects: None,
            })
            .collect();

        let links = resolve_links(&compounds, &index, &TokenSortMatcher, DEFAULT_THRESHOLD);
        assert_eq!(links, vec![Some(0), Some(1), None, Some(0)]);
    }
}
