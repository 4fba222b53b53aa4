//! # Entity Extractor — Pattern Stage and Reconciliation
//!
//! Two independent strategies produce the (student name, subject name) pair:
//! the deterministic pattern stage in this module, and the model-assisted
//! structured extraction call in [`crate::llm`]. This module also owns the
//! precedence rule that combines them.
//!
//! ## Pattern Stage
//!
//! A small set of *ordered* regular expressions anchors where a name or
//! subject mention starts; the captured tail is then cut at the first known
//! stop token. First matching pattern wins. The extracted name is capped to
//! 4 whitespace-separated tokens so a trailing clause is never swallowed.
//!
//! | Priority | Anchor | Example |
//! |----------|--------|---------|
//! | 1 | «دانش آموز …» | «دانش آموز علی احمدی در درس ریاضی» |
//! | 2 | «عملکرد/نمره/نمرات/فعالیت/وضعیت …» | «نمرات سارا محمدی را بده» |
//!
//! ## Reconciliation
//!
//! If the pattern stage found a name, it wins — it is cheaper and anchored
//! to the literal text. Otherwise the model-assisted result is used. The
//! same precedence applies *independently* to the subject. Exactly two
//! strategies with a fixed combination rule, so this is a pair of pure
//! functions rather than an extractor trait.

use regex::Regex;

use crate::domain::ExtractedQuery;
use crate::llm::ModelExtraction;

/// Tokens that terminate a captured *name* run.
const NAME_STOP_TOKENS: &[&str] = &[
    "در", "برای", "همه", "تمام", "را", "و",
    "چطور", "چطوره", "چگونه", "چیست", "چیه", "چند", "چنده",
    "درس", "است", "بود", "بوده", "کلاس", "پایه",
];

/// Tokens that terminate a captured *subject* run (question particles and
/// copulas that follow the subject in natural phrasings).
const SUBJECT_STOP_TOKENS: &[&str] = &[
    "چطور", "چطوره", "چگونه", "چیست", "چیه", "چند", "چنده",
    "را", "است", "بود", "بوده", "و", "ها", "های",
];

/// Phrases that mean "give me every subject" — checked before any subject
/// resolution is attempted.
const ALL_SUBJECTS_PHRASES: &[&str] = &["همه درس", "تمام درس", "همه دروس", "تمام دروس"];

/// Maximum whitespace-separated tokens kept from a name capture.
const MAX_NAME_TOKENS: usize = 4;

/// Maximum whitespace-separated tokens kept from a subject capture.
const MAX_SUBJECT_TOKENS: usize = 3;

/// Result of the deterministic pattern stage alone.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PatternExtraction {
    pub student_name: Option<String>,
    pub subject_name: Option<String>,
    pub wants_all_subjects: bool,
}

/// Pattern-stage extractor. Regexes are compiled once and reused for the
/// life of the process.
pub struct PatternExtractor {
    name_patterns: Vec<Regex>,
    subject_patterns: Vec<Regex>,
}

impl PatternExtractor {
    pub fn new() -> Self {
        Self {
            // Ordered by priority — first match wins.
            name_patterns: vec![
                Regex::new(r"دانش آموز\s+(.+)$").unwrap(),
                Regex::new(r"(?:عملکرد|وضعیت|نمرات|نمره|کارنامه|فعالیت های|فعالیت)\s+(.+)$")
                    .unwrap(),
            ],
            subject_patterns: vec![
                Regex::new(r"در درس\s+(.+)$").unwrap(),
                Regex::new(r"درس\s+(.+)$").unwrap(),
            ],
        }
    }

    /// Runs the pattern stage over a *normalized* message.
    pub fn extract(&self, normalized: &str) -> PatternExtraction {
        let student_name = self
            .name_patterns
            .iter()
            .find_map(|re| re.captures(normalized))
            .and_then(|cap| trim_capture(&cap[1], NAME_STOP_TOKENS, MAX_NAME_TOKENS));

        let subject_name = self
            .subject_patterns
            .iter()
            .find_map(|re| re.captures(normalized))
            .and_then(|cap| trim_capture(&cap[1], SUBJECT_STOP_TOKENS, MAX_SUBJECT_TOKENS));

        PatternExtraction {
            student_name,
            subject_name,
            wants_all_subjects: wants_all_subjects(normalized),
        }
    }
}

impl Default for PatternExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// True when the message asks for the all-subjects breakdown.
pub fn wants_all_subjects(normalized: &str) -> bool {
    ALL_SUBJECTS_PHRASES.iter().any(|p| normalized.contains(p))
}

/// Cuts a raw capture at the first stop token, strips punctuation from each
/// token, and caps the result at `max_tokens`. Returns `None` when nothing
/// survives the trimming.
fn trim_capture(raw: &str, stop_tokens: &[&str], max_tokens: usize) -> Option<String> {
    let mut kept: Vec<&str> = Vec::with_capacity(max_tokens);
    for token in raw.split_whitespace() {
        let clean = token.trim_matches(|c: char| c.is_ascii_punctuation() || "؟،؛«»".contains(c));
        if clean.is_empty() || stop_tokens.contains(&clean) {
            break;
        }
        kept.push(clean);
        if kept.len() == max_tokens {
            break;
        }
    }
    if kept.is_empty() {
        None
    } else {
        Some(kept.join(" "))
    }
}

/// Combines the pattern stage with the model-assisted stage.
///
/// Pattern-derived values win whenever present; the model result is a
/// fallback only. An empty model string means "not specified" and never
/// overrides anything.
pub fn reconcile(pattern: &PatternExtraction, model: Option<&ModelExtraction>) -> ExtractedQuery {
    let model_name = model.and_then(|m| non_empty(&m.student_name));
    let model_subject = model.and_then(|m| non_empty(&m.subject_name));

    ExtractedQuery {
        student_name_raw: pattern.student_name.clone().or(model_name),
        subject_name_raw: pattern.subject_name.clone().or(model_subject),
        wants_all_subjects: pattern.wants_all_subjects,
    }
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlu::normalize::normalize;

    fn extract(text: &str) -> PatternExtraction {
        PatternExtractor::new().extract(&normalize(text))
    }

    #[test]
    fn name_after_student_token() {
        let e = extract("دانش‌آموز علی احمدی در درس ریاضی چطور بوده؟");
        assert_eq!(e.student_name.as_deref(), Some("علی احمدی"));
        assert_eq!(e.subject_name.as_deref(), Some("ریاضی"));
    }

    #[test]
    fn name_after_performance_keyword() {
        let e = extract("نمرات سارا محمدی را بده");
        assert_eq!(e.student_name.as_deref(), Some("سارا محمدی"));
        assert_eq!(e.subject_name, None);
    }

    #[test]
    fn name_capped_to_four_tokens() {
        let e = extract("دانش آموز یک دو سه چهار پنج شش");
        assert_eq!(e.student_name.as_deref(), Some("یک دو سه چهار"));
    }

    #[test]
    fn trailing_question_particle_not_swallowed() {
        let e = extract("دانش آموز علی احمدی چطوره؟");
        assert_eq!(e.student_name.as_deref(), Some("علی احمدی"));
    }

    #[test]
    fn subject_bounded_by_question_particle() {
        let e = extract("عملکرد حسین در درس علوم تجربی چطور است؟");
        assert_eq!(e.student_name.as_deref(), Some("حسین"));
        assert_eq!(e.subject_name.as_deref(), Some("علوم تجربی"));
    }

    #[test]
    fn all_subjects_phrase_detected() {
        let e = extract("فعالیت های علی احمدی در همه درس ها");
        assert!(e.wants_all_subjects);
        assert_eq!(e.student_name.as_deref(), Some("علی احمدی"));
    }

    #[test]
    fn no_anchor_no_extraction() {
        let e = extract("سلام، جلسه فردا ساعت چند است؟");
        assert_eq!(e.student_name, None);
        assert_eq!(e.subject_name, None);
        assert!(!e.wants_all_subjects);
    }

    // ─── reconciliation precedence ─────────────────────────────

    #[test]
    fn pattern_name_wins_over_model() {
        let pattern = PatternExtraction {
            student_name: Some("علی احمدی".into()),
            subject_name: None,
            wants_all_subjects: false,
        };
        let model = ModelExtraction {
            student_name: "رضا کریمی".into(),
            subject_name: "ریاضی".into(),
        };
        let q = reconcile(&pattern, Some(&model));
        // name from the pattern, subject from the model — independent precedence
        assert_eq!(q.student_name_raw.as_deref(), Some("علی احمدی"));
        assert_eq!(q.subject_name_raw.as_deref(), Some("ریاضی"));
    }

    #[test]
    fn model_fills_in_when_pattern_empty() {
        let q = reconcile(
            &PatternExtraction::default(),
            Some(&ModelExtraction {
                student_name: "رضا کریمی".into(),
                subject_name: "".into(),
            }),
        );
        assert_eq!(q.student_name_raw.as_deref(), Some("رضا کریمی"));
        assert_eq!(q.subject_name_raw, None);
    }

    #[test]
    fn empty_model_strings_mean_absent() {
        let q = reconcile(
            &PatternExtraction::default(),
            Some(&ModelExtraction { student_name: "  ".into(), subject_name: "".into() }),
        );
        assert_eq!(q, ExtractedQuery::default());
    }

    #[test]
    fn no_model_result_at_all() {
        let q = reconcile(&PatternExtraction::default(), None);
        assert_eq!(q, ExtractedQuery::default());
    }
}
