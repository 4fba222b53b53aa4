//! # School Directory — Collaborator Contract and Fixture Implementation
//!
//! The roster and activity store live elsewhere in the real deployment;
//! this crate consumes them only through the [`SchoolDirectory`] trait.
//! [`JsonDirectory`] is the bundled implementation backed by a JSON fixture
//! file loaded once at startup — immutable afterwards, so request handling
//! shares it behind a plain `Arc` with no locking.
//!
//! ## Tenant Isolation
//!
//! Every operation takes a `school_id` and answers strictly within that
//! school. A search can never leak candidates from another school.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::{
    ActivityBundle, ActivityRecord, ActivitySummary, StudentCandidate, StudentIdentity,
    SubjectSummary,
};
use crate::error::ChatError;
use crate::nlu::normalize::normalize;

/// Parameters of one activity fetch.
#[derive(Clone, Debug)]
pub struct ActivityQuery {
    pub school_id: String,
    pub national_id: String,
    /// Canonical subject to scope by; `None` fetches across subjects.
    pub subject: Option<String>,
    /// Cap on returned activity records (most recent first).
    pub limit: usize,
    /// Also compute the per-subject summary breakdown.
    pub include_subject_summaries: bool,
}

/// Read-only contract over the student directory and activity store.
#[async_trait]
pub trait SchoolDirectory: Send + Sync {
    /// Searches students by (possibly partial) name within one school.
    async fn search_students(
        &self,
        school_id: &str,
        name: &str,
    ) -> Result<Vec<StudentCandidate>, ChatError>;

    /// Resolves one student's display identity and join key.
    async fn student_identity(
        &self,
        school_id: &str,
        student_id: &str,
    ) -> Result<Option<StudentIdentity>, ChatError>;

    /// The de-duplicated canonical subject list for a school.
    async fn subject_names(&self, school_id: &str) -> Result<Vec<String>, ChatError>;

    /// Activity records plus summary statistics for one student.
    /// `None` when the student has no presence in the activity store.
    async fn student_activities(
        &self,
        query: &ActivityQuery,
    ) -> Result<Option<ActivityBundle>, ChatError>;
}

// ─── JSON fixture implementation ─────────────────────────────────

/// One student row in the fixture file.
#[derive(Debug, Deserialize)]
struct FixtureStudent {
    id: String,
    name: String,
    grade_level: u8,
    #[serde(default)]
    class_names: Vec<String>,
    #[serde(default)]
    national_id: Option<String>,
}

/// One activity row in the fixture file, keyed by the student's national id.
#[derive(Debug, Deserialize)]
struct FixtureActivity {
    national_id: String,
    #[serde(flatten)]
    record: ActivityRecord,
}

#[derive(Debug, Deserialize)]
struct FixtureSchool {
    id: String,
    #[serde(default)]
    students: Vec<FixtureStudent>,
    #[serde(default)]
    subjects: Vec<String>,
    #[serde(default)]
    activities: Vec<FixtureActivity>,
}

#[derive(Debug, Deserialize)]
struct FixtureFile {
    schools: Vec<FixtureSchool>,
}

/// In-memory directory loaded from `data/school.json`.
pub struct JsonDirectory {
    schools: BTreeMap<String, FixtureSchool>,
}

impl JsonDirectory {
    /// Loads the fixture from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ChatError> {
        let json = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ChatError::Config(format!("cannot read school fixture: {e}")))?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, ChatError> {
        let file: FixtureFile = serde_json::from_str(json)
            .map_err(|e| ChatError::Config(format!("invalid school fixture: {e}")))?;
        let schools = file.schools.into_iter().map(|s| (s.id.clone(), s)).collect();
        Ok(Self { schools })
    }

    /// An empty directory — used when no fixture is present so the server
    /// still starts and answers general chat.
    pub fn empty() -> Self {
        Self { schools: BTreeMap::new() }
    }

    pub fn school_count(&self) -> usize {
        self.schools.len()
    }

    pub fn student_count(&self) -> usize {
        self.schools.values().map(|s| s.students.len()).sum()
    }

    fn school(&self, school_id: &str) -> Option<&FixtureSchool> {
        self.schools.get(school_id)
    }
}

#[async_trait]
impl SchoolDirectory for JsonDirectory {
    async fn search_students(
        &self,
        school_id: &str,
        name: &str,
    ) -> Result<Vec<StudentCandidate>, ChatError> {
        let needle = normalize(name);
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let Some(school) = self.school(school_id) else {
            return Ok(Vec::new());
        };
        Ok(school
            .students
            .iter()
            .filter(|s| normalize(&s.name).contains(&needle))
            .map(|s| StudentCandidate {
                id: s.id.clone(),
                name: s.name.clone(),
                grade_level: s.grade_level,
                class_names: s.class_names.clone(),
            })
            .collect())
    }

    async fn student_identity(
        &self,
        school_id: &str,
        student_id: &str,
    ) -> Result<Option<StudentIdentity>, ChatError> {
        Ok(self.school(school_id).and_then(|school| {
            school.students.iter().find(|s| s.id == student_id).map(|s| StudentIdentity {
                id: s.id.clone(),
                name: s.name.clone(),
                grade_level: s.grade_level,
                national_id: s.national_id.clone(),
            })
        }))
    }

    async fn subject_names(&self, school_id: &str) -> Result<Vec<String>, ChatError> {
        let Some(school) = self.school(school_id) else {
            return Ok(Vec::new());
        };
        // De-duplicate while preserving fixture order.
        let mut seen = std::collections::HashSet::new();
        Ok(school
            .subjects
            .iter()
            .filter(|s| seen.insert(normalize(s)))
            .cloned()
            .collect())
    }

    async fn student_activities(
        &self,
        query: &ActivityQuery,
    ) -> Result<Option<ActivityBundle>, ChatError> {
        let Some(school) = self.school(&query.school_id) else {
            return Ok(None);
        };

        let subject_needle = query.subject.as_deref().map(normalize);
        let mut matched: Vec<&ActivityRecord> = school
            .activities
            .iter()
            .filter(|a| a.national_id == query.national_id)
            .map(|a| &a.record)
            .filter(|r| match &subject_needle {
                Some(wanted) => r.subject.as_deref().map(normalize).as_ref() == Some(wanted),
                None => true,
            })
            .collect();

        if matched.is_empty() {
            return Ok(None);
        }

        // Most recent first; ISO date strings sort lexicographically.
        matched.sort_by(|a, b| b.date.cmp(&a.date));

        let summary = summarize(&matched);
        let subject_summaries = if query.include_subject_summaries {
            Some(summarize_by_subject(&matched))
        } else {
            None
        };
        let activities = matched.into_iter().take(query.limit).cloned().collect();

        Ok(Some(ActivityBundle { activities, summary, subject_summaries }))
    }
}

/// Summary statistics over a record set. Average covers only the records
/// that carry a quantitative score.
fn summarize(records: &[&ActivityRecord]) -> ActivitySummary {
    let scores: Vec<f64> = records.iter().filter_map(|r| r.score).collect();
    ActivitySummary {
        total: records.len() as u32,
        average_score: if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        },
        last_activity_date: records.iter().map(|r| r.date.clone()).max(),
    }
}

fn summarize_by_subject(records: &[&ActivityRecord]) -> Vec<SubjectSummary> {
    let mut by_subject: BTreeMap<String, Vec<&ActivityRecord>> = BTreeMap::new();
    for rec in records {
        let key = rec.subject.clone().unwrap_or_else(|| "سایر".to_string());
        by_subject.entry(key).or_default().push(rec);
    }
    by_subject
        .into_iter()
        .map(|(subject, rows)| SubjectSummary { subject, summary: summarize(&rows) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "schools": [
            {
                "id": "school-1",
                "students": [
                    {"id": "s1", "name": "علی احمدی", "grade_level": 5,
                     "class_names": ["پنجم الف"], "national_id": "001"},
                    {"id": "s2", "name": "علی احمدی", "grade_level": 9,
                     "class_names": ["نهم ب"], "national_id": "002"},
                    {"id": "s3", "name": "سارا محمدی", "grade_level": 7,
                     "class_names": ["هفتم الف"]}
                ],
                "subjects": ["ریاضی", "علوم", "ریاضی"],
                "activities": [
                    {"national_id": "001", "date": "2024-03-20", "kind": "homework",
                     "title": "تمرین", "score": 18.0, "subject": "ریاضی"},
                    {"national_id": "001", "date": "2024-02-01", "kind": "exam",
                     "title": "امتحان", "score": 16.0, "subject": "علوم"},
                    {"national_id": "002", "date": "2024-01-15", "kind": "quiz",
                     "title": "آزمونک", "subject": "ریاضی"}
                ]
            },
            {
                "id": "school-2",
                "students": [
                    {"id": "x1", "name": "علی احمدی", "grade_level": 3, "national_id": "099"}
                ]
            }
        ]
    }"#;

    fn directory() -> JsonDirectory {
        JsonDirectory::from_json(FIXTURE).expect("fixture parses")
    }

    #[tokio::test]
    async fn search_is_scoped_to_one_school() {
        let dir = directory();
        let hits = dir.search_students("school-1", "علی احمدی").await.unwrap();
        // two namesakes in school-1; the school-2 one never appears
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|c| c.id != "x1"));
    }

    #[tokio::test]
    async fn partial_name_matches_by_containment() {
        let dir = directory();
        let hits = dir.search_students("school-1", "سارا").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "s3");
    }

    #[tokio::test]
    async fn unknown_school_and_empty_name_yield_nothing() {
        let dir = directory();
        assert!(dir.search_students("nope", "علی").await.unwrap().is_empty());
        assert!(dir.search_students("school-1", "  ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn identity_carries_join_key_when_present() {
        let dir = directory();
        let id = dir.student_identity("school-1", "s1").await.unwrap().unwrap();
        assert_eq!(id.national_id.as_deref(), Some("001"));
        let id3 = dir.student_identity("school-1", "s3").await.unwrap().unwrap();
        assert_eq!(id3.national_id, None);
    }

    #[tokio::test]
    async fn subject_list_is_deduplicated() {
        let dir = directory();
        assert_eq!(dir.subject_names("school-1").await.unwrap(), vec!["ریاضی", "علوم"]);
    }

    #[tokio::test]
    async fn activities_scoped_summarized_and_sorted() {
        let dir = directory();
        let bundle = dir
            .student_activities(&ActivityQuery {
                school_id: "school-1".into(),
                national_id: "001".into(),
                subject: None,
                limit: 20,
                include_subject_summaries: true,
            })
            .await
            .unwrap()
            .expect("records exist");
        assert_eq!(bundle.summary.total, 2);
        assert_eq!(bundle.summary.average_score, Some(17.0));
        assert_eq!(bundle.summary.last_activity_date.as_deref(), Some("2024-03-20"));
        // newest first
        assert_eq!(bundle.activities[0].date, "2024-03-20");
        let by_subject = bundle.subject_summaries.unwrap();
        assert_eq!(by_subject.len(), 2);
    }

    #[tokio::test]
    async fn subject_scoping_filters_records() {
        let dir = directory();
        let bundle = dir
            .student_activities(&ActivityQuery {
                school_id: "school-1".into(),
                national_id: "001".into(),
                subject: Some("ریاضی".into()),
                limit: 20,
                include_subject_summaries: false,
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bundle.summary.total, 1);
        // no score rows absent here; scoped summary still averages present scores
        assert_eq!(bundle.summary.average_score, Some(18.0));
        // a subject with no records at all → None
        let none = dir
            .student_activities(&ActivityQuery {
                school_id: "school-1".into(),
                national_id: "001".into(),
                subject: Some("تاریخ".into()),
                limit: 20,
                include_subject_summaries: false,
            })
            .await
            .unwrap();
        assert!(none.is_none());
    }
}
