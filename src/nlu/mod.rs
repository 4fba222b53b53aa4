//! # NLU — Normalization, Intent, Extraction
//!
//! The language-understanding front of the pipeline. Everything is
//! deterministic and model-free here; the model-assisted extraction call
//! lives in [`crate::llm`] and is combined with this module's pattern
//! output by [`extractor::reconcile`].
//!
//! | Submodule | Responsibility |
//! |-----------|----------------|
//! | [`normalize`] | Persian text canonicalization |
//! | [`intent`] | student-query vs. general-chat decision |
//! | [`extractor`] | pattern extraction stage + precedence rule |

pub mod extractor;
pub mod intent;
pub mod normalize;

use extractor::{PatternExtraction, PatternExtractor};

/// What the deterministic NLU front knows about one message.
#[derive(Clone, Debug)]
pub struct NluReading {
    /// The normalized latest user message.
    pub normalized: String,
    /// Pattern-stage extraction result.
    pub pattern: PatternExtraction,
    /// Whether the message is a student-activity query.
    pub is_student_query: bool,
}

/// Facade bundling the pattern extractor; compiled once at startup.
pub struct NluPipeline {
    extractor: PatternExtractor,
}

impl NluPipeline {
    pub fn new() -> Self {
        Self { extractor: PatternExtractor::new() }
    }

    /// Normalizes, pattern-extracts, and classifies one raw message.
    pub fn read(&self, raw: &str) -> NluReading {
        let normalized = normalize::normalize(raw);
        let pattern = self.extractor.extract(&normalized);
        let is_student_query =
            intent::is_student_query(&normalized, pattern.student_name.as_deref());
        NluReading { normalized, pattern, is_student_query }
    }
}

impl Default for NluPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_combines_all_three_stages() {
        let nlu = NluPipeline::new();
        let r = nlu.read("دانش‌آموز علی احمدی در درس ریاضی چطور بوده؟");
        assert!(r.is_student_query);
        assert_eq!(r.pattern.student_name.as_deref(), Some("علی احمدی"));
        assert!(r.normalized.contains("دانش آموز"));
    }

    #[test]
    fn general_chat_reading() {
        let nlu = NluPipeline::new();
        let r = nlu.read("سلام! روز خوبی داشته باشید");
        assert!(!r.is_student_query);
        assert_eq!(r.pattern.student_name, None);
    }
}
