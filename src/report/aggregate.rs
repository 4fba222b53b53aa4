//! # Report Data Aggregator
//!
//! Gathers every fact the renderer needs for one resolved student.
//!
//! Identity lookup and subject-list lookup are issued concurrently and
//! joined fail-fast; the subject-list fetch is skipped entirely for
//! "all subjects" queries (an optimization, not a correctness requirement,
//! since no subject resolution happens on that path). Subject resolution
//! itself happens here, between the join and the activity fetch, because
//! it needs the canonical list and gates which fetch is issued.
//!
//! When a subject-scoped fetch comes back empty, one additional *unscoped*
//! fetch is issued purely to offer the caller the subjects that do have
//! recorded activity — a recovery path, not a retry.

use crate::directory::{ActivityQuery, SchoolDirectory};
use crate::domain::{ActivityBundle, ExtractedQuery, StudentCandidate, StudentIdentity};
use crate::error::ChatError;
use crate::llm::ModelExtraction;
use crate::report::render::MAX_ACTIVITY_ROWS;
use crate::resolve::resolve_subject_with_fallback;

/// Everything the renderer needs.
#[derive(Clone, Debug)]
pub struct ReportFacts {
    pub identity: StudentIdentity,
    pub bundle: ActivityBundle,
    /// Canonical subject, when the query was subject-scoped.
    pub subject: Option<String>,
    pub all_subjects: bool,
}

/// Terminal and success outcomes of the aggregation stage. Every non-`Ready`
/// variant short-circuits the pipeline with a user-visible message.
#[derive(Clone, Debug)]
pub enum AggregateOutcome {
    /// Neither subject mention resolved and "all subjects" was not asked.
    UnresolvedSubject { known_subjects: Vec<String> },
    /// The student record has no activity-store join key.
    MissingJoinKey { student_name: String },
    /// No recorded activity; `subjects_with_activity` is the recovery list
    /// from the unscoped fetch (empty when the query was already unscoped).
    NoData {
        student_name: String,
        subject: Option<String>,
        subjects_with_activity: Vec<String>,
    },
    Ready(ReportFacts),
}

/// Runs the aggregation stage for one resolved candidate.
///
/// `query` carries the pattern-derived mentions; `model` the model-derived
/// ones — the subject precedence (pattern first, model fallback) is applied
/// against the canonical list fetched here.
pub async fn aggregate(
    directory: &dyn SchoolDirectory,
    school_id: &str,
    candidate: &StudentCandidate,
    query: &ExtractedQuery,
    model: Option<&ModelExtraction>,
) -> Result<AggregateOutcome, ChatError> {
    let all_subjects = query.wants_all_subjects;

    // Fan-out/join: identity and subject list, fail-fast on either.
    let (identity, known_subjects) = tokio::try_join!(
        directory.student_identity(school_id, &candidate.id),
        async {
            if all_subjects {
                Ok(Vec::new())
            } else {
                directory.subject_names(school_id).await
            }
        },
    )?;

    let identity = identity.ok_or_else(|| {
        ChatError::Store(format!("student {} vanished between search and lookup", candidate.id))
    })?;

    // Subject resolution — only for scoped queries that actually mention one.
    let subject = if all_subjects {
        None
    } else {
        let pattern_mention = query.subject_name_raw.as_deref();
        let model_mention = model.map(|m| m.subject_name.as_str()).filter(|s| !s.trim().is_empty());
        let mentioned = pattern_mention.is_some() || model_mention.is_some();
        let resolved = resolve_subject_with_fallback(&known_subjects, pattern_mention, model_mention);
        if mentioned && resolved.is_none() {
            return Ok(AggregateOutcome::UnresolvedSubject { known_subjects });
        }
        resolved
    };

    let Some(national_id) = identity.national_id.clone() else {
        return Ok(AggregateOutcome::MissingJoinKey { student_name: identity.name });
    };

    let bundle = directory
        .student_activities(&ActivityQuery {
            school_id: school_id.to_string(),
            national_id: national_id.clone(),
            subject: subject.clone(),
            limit: MAX_ACTIVITY_ROWS,
            include_subject_summaries: all_subjects,
        })
        .await?;

    let bundle = match bundle {
        Some(b) if b.summary.total > 0 => b,
        _ => {
            // Recovery fetch: which subjects DO have recorded activity?
            let subjects_with_activity = if subject.is_some() {
                let unscoped = directory
                    .student_activities(&ActivityQuery {
                        school_id: school_id.to_string(),
                        national_id,
                        subject: None,
                        limit: MAX_ACTIVITY_ROWS,
                        include_subject_summaries: false,
                    })
                    .await?;
                unscoped
                    .map(|b| {
                        let mut seen = std::collections::HashSet::new();
                        b.activities
                            .iter()
                            .filter_map(|r| r.subject.clone())
                            .filter(|s| seen.insert(s.clone()))
                            .collect()
                    })
                    .unwrap_or_default()
            } else {
                Vec::new()
            };
            return Ok(AggregateOutcome::NoData {
                student_name: identity.name,
                subject,
                subjects_with_activity,
            });
        }
    };

    Ok(AggregateOutcome::Ready(ReportFacts { identity, bundle, subject, all_subjects }))
}
