//! Lexical prompt-complexity heuristic.
//!
//! Scores structural signals in the prompt text and maps the total to a
//! tier. Inputs are the prompt alone, so the same text always classifies the
//! same way regardless of session or tooling.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use weave_core::types::ComplexityTier;

/// Scope keywords that mark a request as larger than a quick edit.
static INDICATORS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(refactor|implement|create|build|develop|comprehensive|analysis|strategy|plan|design|multiple|all|entire|complete|full|system)\b",
    )
    .unwrap()
});

/// `multi-file`, `multi step`, and similar compounds.
static MULTI_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bmulti[-\s]\w").unwrap());

/// Numbered lines (`1.`, `2)`) or explicit `step N` references.
static STEP_MARKERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*\d+[.)]\s+|\bstep\s+\d+\b").unwrap());

/// Classify a prompt into a complexity tier.
///
/// Each distinct indicator keyword scores 2, as do multi-part compounds and
/// step markers; length adds 1 past 100 bytes or 2 past 400. A total of 0 is
/// [`ComplexityTier::Low`], 1 to 3 is `Medium`, 4 and up is `High`.
pub fn classify(prompt: &str) -> ComplexityTier {
    let lower = prompt.to_lowercase();
    let mut score = 0usize;

    let distinct: BTreeSet<&str> = INDICATORS
        .find_iter(&lower)
        .map(|hit| hit.as_str())
        .collect();
    score += 2 * distinct.len();

    if MULTI_PART.is_match(&lower) {
        score += 2;
    }
    if STEP_MARKERS.is_match(&lower) {
        score += 2;
    }
    if prompt.len() > 400 {
        score += 2;
    } else if prompt.len() > 100 {
        score += 1;
    }

    match score {
        0 => ComplexityTier::Low,
        1..=3 => ComplexityTier::Medium,
        _ => ComplexityTier::High,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trivial_prompt_is_low() {
        assert_eq!(classify("fix a typo"), ComplexityTier::Low);
        assert_eq!(classify(""), ComplexityTier::Low);
    }

    #[test]
    fn single_indicator_is_medium() {
        assert_eq!(classify("implement a parser"), ComplexityTier::Medium);
        assert_eq!(classify("REFACTOR THE LOOP"), ComplexityTier::Medium);
    }

    #[test]
    fn repeated_keyword_counts_once() {
        assert_eq!(
            classify("plan the plan for the plan"),
            ComplexityTier::Medium
        );
    }

    #[test]
    fn indicators_match_whole_words_only() {
        // "allocate" contains "all", "planning" contains "plan".
        assert_eq!(classify("allocate planning budget"), ComplexityTier::Low);
    }

    #[test]
    fn multi_compound_scores() {
        assert_eq!(
            classify("touch up a multi-line comment"),
            ComplexityTier::Medium
        );
        assert_eq!(classify("a multi step change"), ComplexityTier::Medium);
    }

    #[test]
    fn keyword_plus_multi_compound_is_high() {
        assert_eq!(
            classify("refactor this multi-file project"),
            ComplexityTier::High
        );
    }

    #[test]
    fn step_markers_score() {
        assert_eq!(classify("1. rename\n2. retest"), ComplexityTier::Medium);
        assert_eq!(classify("redo step 3"), ComplexityTier::Medium);
    }

    #[test]
    fn length_bumps_score() {
        assert_eq!(classify(&"x".repeat(150)), ComplexityTier::Medium);
        assert_eq!(classify(&"x".repeat(450)), ComplexityTier::Medium);
    }

    #[test]
    fn many_signals_reach_high() {
        let prompt = "design and implement a complete system for the entire data layer";
        assert_eq!(classify(prompt), ComplexityTier::High);
    }
}
