//! # Domain Model — Per-Request Facts
//!
//! Every type here is a read-only projection created fresh per request and
//! discarded when the response stream closes. There is no caching layer and
//! no cross-request mutable state in this crate.
//!
//! | Type | Origin | Lifetime |
//! |------|--------|----------|
//! | [`ChatTurn`] | request body | one request |
//! | [`ExtractedQuery`] | NLU stages | one request, never persisted |
//! | [`StudentCandidate`] | directory search | one request |
//! | [`StudentIdentity`] | directory lookup | one request |
//! | [`ActivityRecord`] / [`ActivitySummary`] | activity store | one request |
//! | [`RenderedReport`] | renderer | one request |

use serde::{Deserialize, Serialize};

/// Who authored a conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of the conversation as carried by the request body.
///
/// Only the latest `user` turn drives entity extraction; the full history
/// is forwarded to the general-chat generation call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Result of entity extraction after reconciling the pattern stage with the
/// model-assisted stage. Ephemeral — produced per request, never persisted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtractedQuery {
    /// Raw student-name mention, still unresolved against the roster.
    pub student_name_raw: Option<String>,
    /// Raw subject mention, still unresolved against the canonical list.
    pub subject_name_raw: Option<String>,
    /// The query asked for a breakdown over every subject.
    pub wants_all_subjects: bool,
}

/// Roster projection returned by the directory search.
///
/// Identity is `id`; uniqueness of `(name, grade_level)` is NOT guaranteed,
/// which is why the disambiguation branch exists.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StudentCandidate {
    pub id: String,
    pub name: String,
    pub grade_level: u8,
    #[serde(default)]
    pub class_names: Vec<String>,
}

/// A single resolved student. `national_id` is the join key into the
/// activity store; a student without one cannot be reported on.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StudentIdentity {
    pub id: String,
    pub name: String,
    pub grade_level: u8,
    pub national_id: Option<String>,
}

/// Kind of a recorded activity. Localized labels live on [`ActivityKind::label`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Homework,
    Quiz,
    Exam,
    ClassActivity,
    Project,
    Other,
}

impl ActivityKind {
    /// Persian display label used by the report tables.
    pub fn label(&self) -> &'static str {
        match self {
            ActivityKind::Homework => "تکلیف",
            ActivityKind::Quiz => "آزمونک",
            ActivityKind::Exam => "امتحان",
            ActivityKind::ClassActivity => "فعالیت کلاسی",
            ActivityKind::Project => "پروژه",
            ActivityKind::Other => "سایر",
        }
    }
}

/// Immutable historical fact from the activity store. Read-only here.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Gregorian `YYYY-MM-DD`; converted to Jalali only at render time.
    pub date: String,
    pub kind: ActivityKind,
    pub title: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub qualitative: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub class_name: Option<String>,
}

/// Aggregate statistics over a set of activity records.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub total: u32,
    pub average_score: Option<f64>,
    pub last_activity_date: Option<String>,
}

/// Per-subject summary row, produced only for "all subjects" queries.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubjectSummary {
    pub subject: String,
    #[serde(flatten)]
    pub summary: ActivitySummary,
}

/// Everything the activity store returns for one student fetch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActivityBundle {
    pub activities: Vec<ActivityRecord>,
    pub summary: ActivitySummary,
    #[serde(default)]
    pub subject_summaries: Option<Vec<SubjectSummary>>,
}

/// The full deterministic payload produced by the renderer.
///
/// `narrative_context` carries the exact same rendered tables handed to the
/// narrative generator — never re-derived from the raw rows. That identity
/// is the anti-hallucination invariant of the whole pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedReport {
    pub header: String,
    pub summary_table: String,
    pub subject_table: Option<String>,
    pub activities_table: String,
    pub narrative_context: String,
}

impl RenderedReport {
    /// Concatenates the tables in their fixed order for the outbound stream.
    pub fn deterministic_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.header);
        out.push_str("\n\n");
        out.push_str(&self.summary_table);
        if let Some(subject_table) = &self.subject_table {
            out.push_str("\n\n");
            out.push_str(subject_table);
        }
        out.push_str("\n\n");
        out.push_str(&self.activities_table);
        out
    }
}
