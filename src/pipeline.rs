//! # Pipeline — The Request State Machine
//!
//! Coordinates every stage of one conversational turn and owns all the
//! user-visible terminal branches:
//!
//! ```text
//! Received
//!   ├── not a student query ── general chat (streamed, long budget)
//!   └── student query
//!       ├── extraction found no name ───────── NeedsName
//!       ├── roster search: 0 matches ───────── NotFound
//!       ├── roster search: 2+ matches ──────── Ambiguous (≤5 listed)
//!       ├── subject mention unresolved ─────── UnresolvedSubject (≤10 listed)
//!       ├── student has no join key ────────── MissingIdentityKey
//!       ├── no recorded activity ───────────── NoData (+ recovery list)
//!       └── DataReady ── render ── stream tables ── narrative ── Closed
//! ```
//!
//! Deterministic content is always pushed to the stream first and
//! synchronously; the narrative stage is best-effort, bounded by a timer,
//! and can never retract or fail what was already flushed. There is no
//! retry policy anywhere: every external call succeeds once or the request
//! takes a defined degraded branch.
//!
//! Each request is one short-lived task; the only shared objects are the
//! immutable configuration and the two collaborator handles.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::Config;
use crate::directory::SchoolDirectory;
use crate::domain::{ChatTurn, RenderedReport, Role, StudentCandidate};
use crate::error::ChatError;
use crate::llm::{LanguageModel, ModelExtraction};
use crate::nlu::extractor::reconcile;
use crate::nlu::NluPipeline;
use crate::report::aggregate::{aggregate, AggregateOutcome};
use crate::report::render::{grade_label, render_report};
use crate::resolve::{classify_candidates, CandidateOutcome};

/// Disambiguation cap — a UX choice carried over as a constant.
pub const MAX_CANDIDATE_SUGGESTIONS: usize = 5;

/// Cap on subjects offered in the unresolved-subject clarification.
pub const MAX_SUBJECT_SUGGESTIONS: usize = 10;

/// Fixed sentence appended when the narrative stage hits its deadline.
pub const NARRATIVE_TIMEOUT_FALLBACK: &str =
    "\n\nمتأسفانه تولید توضیح تکمیلی بیش از حد طول کشید و متوقف شد. جدول‌های بالا کامل و معتبرند.";

/// Fixed sentence appended on any other narrative failure.
pub const NARRATIVE_FAILURE_FALLBACK: &str =
    "\n\nتولید توضیح تکمیلی با خطا مواجه شد؛ جدول‌های بالا کامل و معتبرند.";

/// Generic caller-facing error — never carries internal detail.
const GENERIC_ERROR: &str = "خطایی در پردازش درخواست رخ داد. لطفاً دوباره تلاش کنید.";

/// System instruction for the unrestricted general-chat path.
const GENERAL_SYSTEM: &str = "\
تو دستیار فارسی‌زبان مدیر مدرسه هستی. مودبانه، کوتاه و روشن پاسخ بده.";

/// What the pipeline pushes onto the per-request stream.
#[derive(Clone, Debug)]
pub enum PipelineEvent {
    /// A chunk of response text, deterministic or narrative.
    Delta(String),
    /// Terminal structured error; the stream closes right after.
    Error { message: String },
}

/// How a bounded generation stream ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StreamEnd {
    Completed,
    TimedOut,
    Failed,
}

pub struct Pipeline {
    config: Arc<Config>,
    directory: Arc<dyn SchoolDirectory>,
    model: Arc<dyn LanguageModel>,
    nlu: NluPipeline,
}

impl Pipeline {
    pub fn new(
        config: Arc<Config>,
        directory: Arc<dyn SchoolDirectory>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self { config, directory, model, nlu: NluPipeline::new() }
    }

    /// Handles one conversational turn end to end.
    ///
    /// Top-level catch: any unexpected error becomes one generic event on
    /// the stream, logged with the request correlation id and the per-stage
    /// elapsed-time breakdown — never exposed to the caller.
    pub async fn handle(&self, school_id: String, history: Vec<ChatTurn>, out: mpsc::Sender<PipelineEvent>) {
        let request_id = Uuid::new_v4();
        let mut timings = StageTimings::new();

        match self.run(&school_id, &history, &out, &mut timings).await {
            Ok(branch) => {
                tracing::info!(
                    %request_id,
                    branch,
                    elapsed_ms = timings.total_ms(),
                    stages = %timings.summary(),
                    "chat request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    %request_id,
                    error = %e,
                    elapsed_ms = timings.total_ms(),
                    stages = %timings.summary(),
                    "chat request failed"
                );
                let _ = out.send(PipelineEvent::Error { message: GENERIC_ERROR.into() }).await;
            }
        }
    }

    /// The state machine proper. Returns the branch label for the log line.
    async fn run(
        &self,
        school_id: &str,
        history: &[ChatTurn],
        out: &mpsc::Sender<PipelineEvent>,
        timings: &mut StageTimings,
    ) -> Result<&'static str, ChatError> {
        let Some(latest) = history.iter().rev().find(|t| t.role == Role::User) else {
            return Err(ChatError::Internal("history contains no user message".into()));
        };

        let reading = self.nlu.read(&latest.content);
        timings.mark("classify");

        if !reading.is_student_query {
            return self.general_chat(history, out, timings).await;
        }

        // Model-assisted extraction runs alongside the pattern stage for
        // every student query; a failure here degrades to pattern-only and
        // the no-name clarification covers the worst case.
        let model_extraction = match self.model.extract_query(&reading.normalized).await {
            Ok(m) => Some(m),
            Err(e) => {
                tracing::warn!(error = %e, "structured extraction unavailable, pattern-only");
                None
            }
        };
        timings.mark("extract");

        let query = reconcile(&reading.pattern, model_extraction.as_ref());
        let Some(name) = query.student_name_raw.clone() else {
            self.send(out, needs_name_message()).await;
            return Ok("needs_name");
        };

        // Tenant isolation: the search never leaves the caller's school.
        let candidates = self.directory.search_students(school_id, &name).await?;
        timings.mark("resolve");

        let candidate = match classify_candidates(candidates) {
            CandidateOutcome::None => {
                self.send(out, not_found_message(&name)).await;
                return Ok("not_found");
            }
            CandidateOutcome::Ambiguous(list) => {
                self.send(out, disambiguation_message(&list)).await;
                return Ok("ambiguous");
            }
            CandidateOutcome::One(c) => c,
        };

        let outcome = aggregate(
            self.directory.as_ref(),
            school_id,
            &candidate,
            &query,
            model_extraction.as_ref(),
        )
        .await?;
        timings.mark("aggregate");

        let facts = match outcome {
            AggregateOutcome::UnresolvedSubject { known_subjects } => {
                self.send(out, unresolved_subject_message(&known_subjects)).await;
                return Ok("unresolved_subject");
            }
            AggregateOutcome::MissingJoinKey { student_name } => {
                self.send(out, missing_join_key_message(&student_name)).await;
                return Ok("missing_join_key");
            }
            AggregateOutcome::NoData { student_name, subject, subjects_with_activity } => {
                self.send(out, no_data_message(&student_name, subject.as_deref(), &subjects_with_activity))
                    .await;
                return Ok("no_data");
            }
            AggregateOutcome::Ready(facts) => facts,
        };

        let report = render_report(
            &candidate,
            &facts.identity,
            &facts.bundle,
            facts.subject.as_deref(),
            facts.all_subjects,
        );
        // Deterministic content first, synchronously — always delivered.
        self.send(out, report.deterministic_text()).await;
        timings.mark("render");

        if self.config.narrative_enabled {
            self.narrative(&report, history, out).await;
            timings.mark("narrative");
        }

        Ok("report")
    }

    /// Unrestricted general chat: full history, no tools, longer budget.
    async fn general_chat(
        &self,
        history: &[ChatTurn],
        out: &mpsc::Sender<PipelineEvent>,
        timings: &mut StageTimings,
    ) -> Result<&'static str, ChatError> {
        let rx = self.model.stream_chat(GENERAL_SYSTEM, history).await?;
        let end = pump_stream(rx, self.config.general_timeout, out).await;
        timings.mark("generate");
        match end {
            StreamEnd::Completed => {}
            StreamEnd::TimedOut => self.send(out, NARRATIVE_TIMEOUT_FALLBACK.to_string()).await,
            StreamEnd::Failed => self.send(out, NARRATIVE_FAILURE_FALLBACK.to_string()).await,
        }
        Ok("general_chat")
    }

    /// Bounded, best-effort narrative stage. Runs only after the report is
    /// already on the stream; every exit here closes the stream normally.
    async fn narrative(
        &self,
        report: &RenderedReport,
        history: &[ChatTurn],
        out: &mpsc::Sender<PipelineEvent>,
    ) {
        let system = narrative_system(&report.narrative_context);
        match self.model.stream_chat(&system, history).await {
            Ok(rx) => {
                self.send(out, "\n\n".to_string()).await;
                match pump_stream(rx, self.config.narrative_timeout, out).await {
                    StreamEnd::Completed => {}
                    StreamEnd::TimedOut => {
                        self.send(out, NARRATIVE_TIMEOUT_FALLBACK.to_string()).await;
                    }
                    StreamEnd::Failed => {
                        self.send(out, NARRATIVE_FAILURE_FALLBACK.to_string()).await;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "narrative generation unavailable");
                self.send(out, NARRATIVE_FAILURE_FALLBACK.to_string()).await;
            }
        }
    }

    async fn send(&self, out: &mpsc::Sender<PipelineEvent>, text: String) {
        // A closed channel means the client went away; nothing to roll back.
        let _ = out.send(PipelineEvent::Delta(text)).await;
    }
}

/// Forwards generation deltas until completion, failure, or deadline.
///
/// The timer is armed once when pumping starts. On expiry the receiver is
/// dropped, which cancels the producer task (its next send fails) — the
/// channel-closed pattern instead of a shared mutable flag. Already-flushed
/// output is untouched by every exit path.
async fn pump_stream(
    mut rx: mpsc::Receiver<Result<String, ChatError>>,
    budget: Duration,
    out: &mpsc::Sender<PipelineEvent>,
) -> StreamEnd {
    let timer = tokio::time::sleep(budget);
    tokio::pin!(timer);

    loop {
        tokio::select! {
            _ = &mut timer => return StreamEnd::TimedOut,
            item = rx.recv() => match item {
                Some(Ok(delta)) => {
                    if out.send(PipelineEvent::Delta(delta)).await.is_err() {
                        return StreamEnd::Completed;
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "generation stream failed mid-flight");
                    return StreamEnd::Failed;
                }
                None => return StreamEnd::Completed,
            }
        }
    }
}

/// System instruction for the narrative stage. The rendered tables are the
/// only permitted factual context; inventing any number, date, or name not
/// present in them is explicitly forbidden.
fn narrative_system(context: &str) -> String {
    format!(
        "تو دستیار فارسی‌زبان مدیر مدرسه هستی. گزارش زیر عیناً برای مدیر ارسال شده است.\n\
         فقط بر اساس همین گزارش، یک پاراگراف کوتاه توضیحی بنویس.\n\
         به هیچ وجه عدد، تاریخ یا نامی که در گزارش نیامده ذکر نکن و جدول‌ها را تکرار نکن.\n\n\
         ── گزارش ──\n{context}"
    )
}

// ─── terminal-branch messages ────────────────────────────────────

fn needs_name_message() -> String {
    "نام دانش‌آموز را در پیام پیدا نکردم. لطفاً نام کامل دانش‌آموز مورد نظر را بنویسید.".to_string()
}

fn not_found_message(name: &str) -> String {
    format!(
        "دانش‌آموزی با نام «{name}» در این مدرسه پیدا نشد. لطفاً املای نام را بررسی کنید یا پایه و کلاس را هم ذکر کنید."
    )
}

fn disambiguation_message(candidates: &[StudentCandidate]) -> String {
    let mut msg =
        String::from("چند دانش‌آموز با این نام پیدا شد. لطفاً مشخص کنید منظورتان کدام است:");
    for (i, c) in candidates.iter().take(MAX_CANDIDATE_SUGGESTIONS).enumerate() {
        let classes = if c.class_names.is_empty() {
            "—".to_string()
        } else {
            c.class_names.join("، ")
        };
        msg.push_str(&format!(
            "\n{}. {} — پایه {} — کلاس {}",
            crate::report::dates::to_persian_digits(&(i + 1).to_string()),
            c.name,
            grade_label(c.grade_level),
            classes,
        ));
    }
    msg
}

fn unresolved_subject_message(known_subjects: &[String]) -> String {
    let listed: Vec<&str> = known_subjects
        .iter()
        .take(MAX_SUBJECT_SUGGESTIONS)
        .map(|s| s.as_str())
        .collect();
    format!(
        "درس مورد نظر را تشخیص ندادم. درس‌های تعریف‌شده برای این مدرسه: {}",
        listed.join("، ")
    )
}

fn missing_join_key_message(student_name: &str) -> String {
    format!(
        "کد ملی «{student_name}» در سامانه ثبت نشده است و امکان دریافت گزارش فعالیت وجود ندارد. لطفاً با پشتیبانی سامانه تماس بگیرید."
    )
}

fn no_data_message(student_name: &str, subject: Option<&str>, subjects_with_activity: &[String]) -> String {
    let mut msg = match subject {
        Some(s) => format!("برای «{student_name}» در درس {s} فعالیتی ثبت نشده است."),
        None => format!("برای «{student_name}» هنوز فعالیتی ثبت نشده است."),
    };
    if !subjects_with_activity.is_empty() {
        msg.push_str(&format!(
            "\nدرس‌های دارای فعالیت ثبت‌شده: {}",
            subjects_with_activity.join("، ")
        ));
    }
    msg
}

// ─── stage timing breakdown ──────────────────────────────────────

/// Elapsed-time breakdown per stage, logged with the correlation id for
/// diagnosis. Purely additive — never surfaced to the caller.
struct StageTimings {
    started: Instant,
    last: Instant,
    stages: Vec<(&'static str, u128)>,
}

impl StageTimings {
    fn new() -> Self {
        let now = Instant::now();
        Self { started: now, last: now, stages: Vec::new() }
    }

    fn mark(&mut self, stage: &'static str) {
        let now = Instant::now();
        self.stages.push((stage, now.duration_since(self.last).as_millis()));
        self.last = now;
    }

    fn total_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }

    fn summary(&self) -> String {
        self.stages
            .iter()
            .map(|(name, ms)| format!("{name}={ms}ms"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
