//! # Intent Classifier — Student Query or General Chat?
//!
//! Decides whether the latest user message is a student-activity query.
//! Three independent signals, OR'd together:
//!
//! | Signal | Example |
//! |--------|---------|
//! | (a) the literal «دانش آموز» token appears | «دانش آموز علی احمدی چطوره؟» |
//! | (b) an activity keyword + lesson context or a name-shaped run | «نمره سارا در درس علوم» |
//! | (c) the pattern stage already extracted a name | — |
//!
//! Any true signal routes into the student-report path; otherwise the
//! request falls through to unrestricted general chat. The classifier
//! operates on *normalized* text only (see [`super::normalize`]).

use crate::nlu::normalize::is_persian_letter;

/// Keywords that mark a message as being about activity/performance/grades.
const ACTIVITY_KEYWORDS: &[&str] = &[
    "فعالیت",
    "عملکرد",
    "نمره",
    "نمرات",
    "کارنامه",
    "ارزیابی",
    "وضعیت درسی",
    "وضعیت تحصیلی",
];

/// Phrases anchoring a lesson context («در درس ریاضی», «درس علوم»).
const LESSON_CONTEXT: &[&str] = &["در درس", "درس "];

/// Classifies a normalized message. `pattern_name` is the student name the
/// pattern extraction stage already found, if any — signal (c).
pub fn is_student_query(normalized: &str, pattern_name: Option<&str>) -> bool {
    // (c) — cheapest and most reliable signal
    if pattern_name.is_some_and(|n| !n.is_empty()) {
        return true;
    }

    // (a)
    if normalized.contains("دانش آموز") {
        return true;
    }

    // (b)
    let has_keyword = ACTIVITY_KEYWORDS.iter().any(|k| normalized.contains(k));
    if has_keyword {
        let has_lesson = LESSON_CONTEXT.iter().any(|k| normalized.contains(k));
        if has_lesson || has_name_shaped_run(normalized) {
            return true;
        }
    }

    false
}

/// A plausible proper name: a run of 1–4 consecutive all-Persian-letter
/// tokens totalling 3–60 letters, none of them a known function word.
fn has_name_shaped_run(normalized: &str) -> bool {
    let mut run_len = 0usize;
    let mut run_letters = 0usize;

    for token in normalized.split(' ').chain(std::iter::once("")) {
        let is_name_token = !token.is_empty()
            && token.chars().all(is_persian_letter)
            && !is_function_token(token);

        if is_name_token {
            run_len += 1;
            run_letters += token.chars().count();
        } else {
            if (1..=4).contains(&run_len) && (3..=60).contains(&run_letters) {
                return true;
            }
            run_len = 0;
            run_letters = 0;
        }
    }

    false
}

/// Function words and query keywords that cannot be part of a name run.
fn is_function_token(token: &str) -> bool {
    const FUNCTION_TOKENS: &[&str] = &[
        "در", "از", "به", "با", "را", "و", "یا", "که", "این", "آن", "برای",
        "چطور", "چگونه", "چیست", "چیه", "است", "بود", "بوده", "شده", "کن",
        "درس", "همه", "تمام", "لطفا", "لطفاً", "بده", "بگو", "نشان",
        "فعالیت", "عملکرد", "نمره", "نمرات", "کارنامه", "ارزیابی", "وضعیت",
        "دانش", "آموز", "اموز", "های", "ها",
    ];
    FUNCTION_TOKENS.contains(&token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlu::normalize::normalize;

    fn classify(text: &str) -> bool {
        is_student_query(&normalize(text), None)
    }

    #[test]
    fn literal_student_token_matches() {
        assert!(classify("دانش‌آموز علی احمدی چطوره؟"));
        assert!(classify("وضعیت دانش آموز سارا"));
    }

    #[test]
    fn keyword_with_lesson_context_matches() {
        assert!(classify("نمره در درس ریاضی چند شده؟"));
        assert!(classify("عملکرد در درس علوم را نشان بده"));
    }

    #[test]
    fn keyword_with_name_run_matches() {
        assert!(classify("نمرات سارا محمدی را بده"));
        assert!(classify("کارنامه حسین رضایی"));
    }

    #[test]
    fn general_chat_falls_through() {
        assert!(!classify("سلام، حال شما چطور است؟"));
        assert!(!classify("فردا جلسه داریم؟"));
        assert!(!classify("hello there"));
        assert!(!classify(""));
    }

    #[test]
    fn keyword_alone_is_not_enough() {
        // an activity keyword with neither lesson context nor a name run
        assert!(!classify("نمره چیست؟"));
    }

    #[test]
    fn pattern_extracted_name_forces_student_path() {
        assert!(is_student_query("چیزی بدون کلیدواژه", Some("علی احمدی")));
        assert!(!is_student_query("چیزی بدون کلیدواژه", Some("")));
        assert!(!is_student_query("چیزی بدون کلیدواژه", None));
    }
}
