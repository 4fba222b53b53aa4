//! # Deterministic Report Renderer
//!
//! Pure, side-effect-free transformation from aggregated facts to fixed
//! Persian report text. No generative model ever touches this output; the
//! narrative stage receives these exact tables as its only factual context.
//!
//! Fixed order of sections:
//!
//! 1. student-info header (name, grade label, class)
//! 2. performance summary (count, average to two decimals or «—», last date)
//! 3. per-subject summary — only for "all subjects" queries
//! 4. activities table, most recent [`MAX_ACTIVITY_ROWS`] rows
//!
//! All digits are rendered as Persian glyphs; Gregorian dates are converted
//! to Jalali via [`super::dates`].

use crate::domain::{
    ActivityBundle, ActivityRecord, ActivitySummary, RenderedReport, StudentCandidate,
    StudentIdentity,
};
use crate::report::dates::{to_jalali, to_persian_digits};

/// Cap on rendered activity rows. A UX choice carried over as a constant.
pub const MAX_ACTIVITY_ROWS: usize = 20;

/// Placeholder for absent numeric or qualitative values.
const PLACEHOLDER: &str = "—";

/// Persian ordinal labels for grade levels ۱–۱۲.
const GRADE_LABELS: [&str; 12] = [
    "اول", "دوم", "سوم", "چهارم", "پنجم", "ششم", "هفتم", "هشتم", "نهم", "دهم", "یازدهم",
    "دوازدهم",
];

/// Grade label from the ordinal lookup; unknown grades fall back to the raw
/// number in Persian digits.
pub fn grade_label(grade: u8) -> String {
    match grade {
        1..=12 => GRADE_LABELS[(grade - 1) as usize].to_string(),
        other => to_persian_digits(&other.to_string()),
    }
}

/// Renders the full deterministic payload.
///
/// Idempotent and pure: identical inputs produce byte-identical output.
/// `subject` is the resolved canonical subject for scoped queries.
pub fn render_report(
    candidate: &StudentCandidate,
    identity: &StudentIdentity,
    bundle: &ActivityBundle,
    subject: Option<&str>,
    all_subjects: bool,
) -> RenderedReport {
    let header = render_header(candidate, identity, subject, all_subjects);
    let summary_table = render_summary(&bundle.summary);
    let subject_table = if all_subjects {
        bundle.subject_summaries.as_deref().map(render_subject_table)
    } else {
        None
    };
    let activities_table = render_activities(&bundle.activities);

    // The narrative context IS the rendered tables — never a second
    // serialization of the raw rows.
    let mut narrative_context = String::new();
    narrative_context.push_str(&header);
    narrative_context.push_str("\n\n");
    narrative_context.push_str(&summary_table);
    if let Some(t) = &subject_table {
        narrative_context.push_str("\n\n");
        narrative_context.push_str(t);
    }
    narrative_context.push_str("\n\n");
    narrative_context.push_str(&activities_table);

    RenderedReport { header, summary_table, subject_table, activities_table, narrative_context }
}

fn render_header(
    candidate: &StudentCandidate,
    identity: &StudentIdentity,
    subject: Option<&str>,
    all_subjects: bool,
) -> String {
    let class = if candidate.class_names.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        candidate.class_names.join("، ")
    };
    let scope = if all_subjects {
        "همه درس‌ها".to_string()
    } else {
        match subject {
            Some(s) => format!("درس {}", s),
            None => "همه فعالیت‌ها".to_string(),
        }
    };
    format!(
        "📋 گزارش فعالیت دانش‌آموز\nنام: {} | پایه: {} | کلاس: {}\nمحدوده گزارش: {}",
        identity.name,
        grade_label(identity.grade_level),
        class,
        scope,
    )
}

fn render_summary(summary: &ActivitySummary) -> String {
    format!(
        "📊 خلاصه عملکرد\nتعداد فعالیت‌ها: {}\nمیانگین نمره: {}\nآخرین فعالیت: {}",
        to_persian_digits(&summary.total.to_string()),
        format_score(summary.average_score),
        summary
            .last_activity_date
            .as_deref()
            .map(to_jalali)
            .unwrap_or_else(|| PLACEHOLDER.to_string()),
    )
}

fn render_subject_table(rows: &[crate::domain::SubjectSummary]) -> String {
    let mut out = String::from("📚 خلاصه به تفکیک درس\n| درس | تعداد | میانگین | آخرین فعالیت |");
    for row in rows {
        out.push_str(&format!(
            "\n| {} | {} | {} | {} |",
            row.subject,
            to_persian_digits(&row.summary.total.to_string()),
            format_score(row.summary.average_score),
            row.summary
                .last_activity_date
                .as_deref()
                .map(to_jalali)
                .unwrap_or_else(|| PLACEHOLDER.to_string()),
        ));
    }
    out
}

fn render_activities(activities: &[ActivityRecord]) -> String {
    if activities.is_empty() {
        return "🗒 فعالیت‌ها\nفعالیتی ثبت نشده است.".to_string();
    }
    let mut out =
        String::from("🗒 فعالیت‌ها\n| تاریخ | نوع | عنوان | نمره | ارزیابی | کلاس |");
    for rec in activities.iter().take(MAX_ACTIVITY_ROWS) {
        out.push_str(&format!(
            "\n| {} | {} | {} | {} | {} | {} |",
            to_jalali(&rec.date),
            rec.kind.label(),
            rec.title,
            format_score(rec.score),
            rec.qualitative.as_deref().unwrap_or(PLACEHOLDER),
            rec.class_name.as_deref().unwrap_or(PLACEHOLDER),
        ));
    }
    out
}

/// Two-decimal Persian-digit score, or the explicit placeholder.
fn format_score(score: Option<f64>) -> String {
    match score {
        Some(s) => to_persian_digits(&format!("{:.2}", s)),
        None => PLACEHOLDER.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActivityKind, SubjectSummary};

    fn fixture() -> (StudentCandidate, StudentIdentity, ActivityBundle) {
        let candidate = StudentCandidate {
            id: "s1".into(),
            name: "علی احمدی".into(),
            grade_level: 5,
            class_names: vec!["پنجم الف".into()],
        };
        let identity = StudentIdentity {
            id: "s1".into(),
            name: "علی احمدی".into(),
            grade_level: 5,
            national_id: Some("0012345678".into()),
        };
        let bundle = ActivityBundle {
            activities: vec![
                ActivityRecord {
                    date: "2024-03-20".into(),
                    kind: ActivityKind::Homework,
                    title: "تمرین فصل سوم".into(),
                    score: Some(18.5),
                    qualitative: Some("خیلی خوب".into()),
                    subject: Some("ریاضی".into()),
                    class_name: Some("پنجم الف".into()),
                },
                ActivityRecord {
                    date: "2024-02-10".into(),
                    kind: ActivityKind::Exam,
                    title: "امتحان میان‌ترم".into(),
                    score: None,
                    qualitative: None,
                    subject: Some("ریاضی".into()),
                    class_name: None,
                },
            ],
            summary: ActivitySummary {
                total: 2,
                average_score: Some(18.5),
                last_activity_date: Some("2024-03-20".into()),
            },
            subject_summaries: None,
        };
        (candidate, identity, bundle)
    }

    #[test]
    fn rendering_is_idempotent() {
        let (c, i, b) = fixture();
        let a = render_report(&c, &i, &b, Some("ریاضی"), false);
        let b2 = render_report(&c, &i, &b, Some("ریاضی"), false);
        assert_eq!(a, b2);
        assert_eq!(a.deterministic_text(), b2.deterministic_text());
    }

    #[test]
    fn header_carries_name_grade_and_class() {
        let (c, i, b) = fixture();
        let r = render_report(&c, &i, &b, Some("ریاضی"), false);
        assert!(r.header.contains("علی احمدی"));
        assert!(r.header.contains("پنجم"));
        assert!(r.header.contains("پنجم الف"));
        assert!(r.header.contains("درس ریاضی"));
    }

    #[test]
    fn summary_uses_persian_digits_and_jalali_date() {
        let (c, i, b) = fixture();
        let r = render_report(&c, &i, &b, None, false);
        assert!(r.summary_table.contains("۲"));
        assert!(r.summary_table.contains("۱۸.۵۰"));
        assert!(r.summary_table.contains("۱۴۰۳/۰۱/۰۱"));
    }

    #[test]
    fn missing_score_and_evaluation_render_placeholder() {
        let (c, i, b) = fixture();
        let r = render_report(&c, &i, &b, None, false);
        // second row: no score, no qualitative, no class
        let row = r.activities_table.lines().last().unwrap();
        assert_eq!(row.matches('—').count(), 3);
    }

    #[test]
    fn subject_table_only_for_all_subjects() {
        let (c, i, mut b) = fixture();
        b.subject_summaries = Some(vec![SubjectSummary {
            subject: "ریاضی".into(),
            summary: b.summary.clone(),
        }]);
        let scoped = render_report(&c, &i, &b, Some("ریاضی"), false);
        assert!(scoped.subject_table.is_none());
        let all = render_report(&c, &i, &b, None, true);
        let table = all.subject_table.expect("subject table present");
        assert!(table.contains("ریاضی"));
        assert!(all.narrative_context.contains(&table));
    }

    #[test]
    fn activity_rows_are_capped() {
        let (c, i, mut b) = fixture();
        let row = b.activities[0].clone();
        b.activities = vec![row; MAX_ACTIVITY_ROWS + 7];
        let r = render_report(&c, &i, &b, None, false);
        // header line + table head + capped rows
        assert_eq!(r.activities_table.lines().count(), 2 + MAX_ACTIVITY_ROWS);
    }

    #[test]
    fn narrative_context_equals_flushed_tables() {
        let (c, i, b) = fixture();
        let r = render_report(&c, &i, &b, Some("ریاضی"), false);
        // identity, not mere derivation: context is the deterministic text
        assert_eq!(r.narrative_context, r.deterministic_text());
        assert!(r.narrative_context.contains(&r.summary_table));
        assert!(r.narrative_context.contains(&r.activities_table));
    }

    #[test]
    fn grade_labels() {
        assert_eq!(grade_label(1), "اول");
        assert_eq!(grade_label(9), "نهم");
        assert_eq!(grade_label(12), "دوازدهم");
        assert_eq!(grade_label(13), "۱۳");
    }
}
