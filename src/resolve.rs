//! # Resolvers — From Raw Mentions to Canonical Identities
//!
//! Two small, pure resolution steps sit between extraction and aggregation:
//!
//! - **Candidate resolution**: classifies a directory search result by
//!   cardinality — none / exactly one / ambiguous. The pipeline never
//!   guesses among multiple matches.
//! - **Subject resolution**: maps a free-text subject mention onto the
//!   school's canonical subject list. Exact normalized equality wins first;
//!   then either-direction containment, preferring the *longest* normalized
//!   canonical name (most specific match).
//!
//! Both operate on normalized text only. The directory search itself is
//! tenant-scoped in [`crate::directory`]; nothing here ever sees another
//! school's roster.

use crate::domain::StudentCandidate;
use crate::nlu::normalize::normalize;

/// Cardinality-driven outcome of a roster search.
#[derive(Clone, Debug)]
pub enum CandidateOutcome {
    /// Zero matches — terminal "not found" branch.
    None,
    /// Exactly one match — proceed to aggregation.
    One(StudentCandidate),
    /// Multiple matches — terminal disambiguation branch.
    Ambiguous(Vec<StudentCandidate>),
}

/// Classifies a search result by cardinality.
pub fn classify_candidates(mut candidates: Vec<StudentCandidate>) -> CandidateOutcome {
    match candidates.len() {
        0 => CandidateOutcome::None,
        1 => CandidateOutcome::One(candidates.remove(0)),
        _ => CandidateOutcome::Ambiguous(candidates),
    }
}

/// Resolves a free-text subject mention against the canonical list.
///
/// Returns the canonical name, or `None` when nothing matches.
pub fn resolve_subject(canonical: &[String], mention: &str) -> Option<String> {
    let needle = normalize(mention);
    if needle.is_empty() {
        return None;
    }

    // Exact normalized equality beats any superset.
    if let Some(exact) = canonical.iter().find(|c| normalize(c) == needle) {
        return Some(exact.clone());
    }

    // Either-direction containment; among several, the longest normalized
    // canonical name is the most specific and wins.
    canonical
        .iter()
        .filter(|c| {
            let n = normalize(c);
            n.contains(&needle) || needle.contains(&n)
        })
        .max_by_key(|c| normalize(c).chars().count())
        .cloned()
}

/// Tries the pattern-derived mention first, then the model-derived one.
///
/// The source behavior is preserved deliberately: when both mentions are
/// non-empty but differ, no tie-break between them is attempted beyond this
/// ordered fallback.
pub fn resolve_subject_with_fallback(
    canonical: &[String],
    pattern_mention: Option<&str>,
    model_mention: Option<&str>,
) -> Option<String> {
    pattern_mention
        .and_then(|m| resolve_subject(canonical, m))
        .or_else(|| model_mention.and_then(|m| resolve_subject(canonical, m)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subjects(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn candidate(id: &str, name: &str, grade: u8) -> StudentCandidate {
        StudentCandidate {
            id: id.into(),
            name: name.into(),
            grade_level: grade,
            class_names: vec![],
        }
    }

    // ─── candidate cardinality ─────────────────────────────────

    #[test]
    fn zero_one_many() {
        assert!(matches!(classify_candidates(vec![]), CandidateOutcome::None));
        assert!(matches!(
            classify_candidates(vec![candidate("1", "علی احمدی", 5)]),
            CandidateOutcome::One(_)
        ));
        let outcome = classify_candidates(vec![
            candidate("1", "علی احمدی", 5),
            candidate("2", "علی احمدی", 9),
        ]);
        match outcome {
            CandidateOutcome::Ambiguous(v) => assert_eq!(v.len(), 2),
            other => panic!("expected Ambiguous, got {:?}", other),
        }
    }

    // ─── subject matching ──────────────────────────────────────

    #[test]
    fn exact_match_beats_longer_superset() {
        let list = subjects(&["ریاضی", "ریاضی پیشرفته"]);
        assert_eq!(resolve_subject(&list, "ریاضی").as_deref(), Some("ریاضی"));
    }

    #[test]
    fn containment_resolves_partial_mention() {
        let list = subjects(&["ریاضی", "ریاضی پیشرفته"]);
        assert_eq!(
            resolve_subject(&list, "پیشرفته").as_deref(),
            Some("ریاضی پیشرفته")
        );
    }

    #[test]
    fn superset_mention_resolves_by_containment() {
        // mention is longer than the canonical name
        let list = subjects(&["علوم"]);
        assert_eq!(resolve_subject(&list, "علوم تجربی").as_deref(), Some("علوم"));
    }

    #[test]
    fn arabic_variant_spelling_still_matches() {
        // mention typed with Arabic yeh, canonical with Persian yeh
        let list = subjects(&["ریاضی"]);
        assert_eq!(resolve_subject(&list, "رياضي").as_deref(), Some("ریاضی"));
    }

    #[test]
    fn no_match_and_empty_mention() {
        let list = subjects(&["ریاضی"]);
        assert_eq!(resolve_subject(&list, "تاریخ"), None);
        assert_eq!(resolve_subject(&list, ""), None);
        assert_eq!(resolve_subject(&[], "ریاضی"), None);
    }

    #[test]
    fn pattern_mention_tried_before_model() {
        let list = subjects(&["ریاضی", "علوم"]);
        // pattern resolves → model ignored
        assert_eq!(
            resolve_subject_with_fallback(&list, Some("ریاضی"), Some("علوم")).as_deref(),
            Some("ریاضی")
        );
        // pattern fails → model fallback
        assert_eq!(
            resolve_subject_with_fallback(&list, Some("تاریخ"), Some("علوم")).as_deref(),
            Some("علوم")
        );
        // both fail → give up
        assert_eq!(resolve_subject_with_fallback(&list, Some("تاریخ"), None), None);
    }
}
