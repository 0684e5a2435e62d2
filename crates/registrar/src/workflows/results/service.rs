use std::io::{Read, Write};
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::domain::{ClassResults, ResultEntry, ResultPeriod};
use super::export::{self, ExportError};
use super::grading::GradingPolicy;
use super::import::{self, ImportError};
use super::ranking::{self, IncompleteResults, RankingSnapshot};
use super::repository::ResultStore;
use super::transcript::{self, RenderError, Transcript, TranscriptContext, TranscriptRenderer};
use crate::store::StoreError;
use crate::workflows::enrollment::{ClassId, SchoolId};
use crate::workflows::InputError;

/// Pipeline stages, used to tag log lines and failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Fetch,
    Aggregate,
    Rank,
    Render,
}

impl Stage {
    const fn label(self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Aggregate => "aggregate",
            Stage::Rank => "rank",
            Stage::Render => "render",
        }
    }
}

/// Service composing the result store, grading policy and transcript renderer.
pub struct ResultsService<S, R> {
    store: Arc<S>,
    renderer: Arc<R>,
    grading: GradingPolicy,
    school_logo_url: Option<String>,
}

impl<S, R> ResultsService<S, R>
where
    S: ResultStore + 'static,
    R: TranscriptRenderer + 'static,
{
    pub fn new(store: Arc<S>, renderer: Arc<R>, grading: GradingPolicy) -> Self {
        Self {
            store,
            renderer,
            grading,
            school_logo_url: None,
        }
    }

    pub fn with_school_logo_url(mut self, url: impl Into<String>) -> Self {
        self.school_logo_url = Some(url.into());
        self
    }

    /// Record or replace a single score.
    pub fn record_result(&self, entry: ResultEntry) -> Result<(), ResultsError> {
        self.validate_entry(&entry)?;
        self.store
            .record_results(std::slice::from_ref(&entry))
            .map_err(ResultsError::from)?;
        debug!(
            school_id = %entry.school_id,
            subject = %entry.subject,
            period = %entry.period,
            "result recorded"
        );
        Ok(())
    }

    /// Record a CSV upload. Either every row is written or none is.
    pub fn import_results<Rd: Read>(&self, reader: Rd) -> Result<usize, ResultsError> {
        let entries = import::parse_entries(reader)?;
        for (index, entry) in entries.iter().enumerate() {
            self.validate_entry(entry).map_err(|source| ImportError::Row {
                line: index + 2,
                source,
            })?;
        }

        let written = self.store.record_results(&entries)?;
        info!(rows = written, "result upload recorded");
        Ok(written)
    }

    /// Ranking list for on-screen display.
    pub fn class_ranking(
        &self,
        class_id: ClassId,
        period: ResultPeriod,
    ) -> Result<RankingSnapshot, ResultsError> {
        let results = self.fetch_class(class_id, period)?;
        self.rank_class(results)
    }

    /// Render the transcript of one student for `period`.
    ///
    /// The student is ranked against every record of the class their results
    /// were taken in. Rendering happens after the store read has completed.
    pub fn transcript(
        &self,
        school_id: &SchoolId,
        period: ResultPeriod,
        generated_on: NaiveDate,
    ) -> Result<Transcript, ResultsError> {
        debug!(stage = Stage::Fetch.label(), school_id = %school_id, %period, "transcript requested");
        let scope = self
            .store
            .transcript_scope(school_id, period)
            .map_err(|err| stage_failure(Stage::Fetch, ResultsError::from(err)))?;

        let class_results = scope.class.ok_or_else(|| {
            stage_failure(
                Stage::Fetch,
                ResultsError::NoResults(format!("student {school_id} in {period}")),
            )
        })?;
        let class_name = class_results.class.name.clone();
        let promotion_class = class_results
            .promotes_to
            .as_ref()
            .map(|class| class.name.clone());

        let snapshot = self.rank_class(class_results)?;
        let entry = snapshot.entry_for(school_id).cloned().ok_or_else(|| {
            stage_failure(
                Stage::Rank,
                ResultsError::NoResults(format!("student {school_id} in {period}")),
            )
        })?;

        let promoted_to = promotion_class
            .as_deref()
            .filter(|_| period.term.closes_session() && entry.average >= self.grading.pass_mark);

        let context = TranscriptContext {
            profile: &scope.profile,
            class_name: &class_name,
            period,
            promoted_to,
            school_logo_url: self.school_logo_url.as_deref(),
            generated_on,
        };
        let record = transcript::build_record(&context, &entry, &snapshot);

        debug!(stage = Stage::Render.label(), school_id = %school_id, "rendering transcript");
        let bytes = self
            .renderer
            .render(&record)
            .map_err(|err| stage_failure(Stage::Render, ResultsError::RenderFailed(err)))?;

        info!(
            school_id = %school_id,
            %period,
            rank = entry.rank,
            bytes = bytes.len(),
            "transcript generated"
        );
        Ok(Transcript {
            bytes,
            record,
            snapshot,
        })
    }

    /// Write the class ranking as a `v1` CSV export and return the snapshot
    /// it was built from.
    pub fn export_class<W: Write>(
        &self,
        class_id: ClassId,
        period: ResultPeriod,
        writer: W,
    ) -> Result<RankingSnapshot, ResultsError> {
        let snapshot = self.class_ranking(class_id, period)?;
        export::write_snapshot(&snapshot, writer)?;
        info!(
            class = %snapshot.class.name,
            %period,
            rows = snapshot.entries.len(),
            format = export::EXPORT_FORMAT_VERSION,
            "class results exported"
        );
        Ok(snapshot)
    }

    fn validate_entry(&self, entry: &ResultEntry) -> Result<(), InputError> {
        if entry.school_id.as_str().trim().is_empty() {
            return Err(InputError::Blank { field: "school_id" });
        }
        if entry.subject.trim().is_empty() {
            return Err(InputError::Blank { field: "subject" });
        }
        self.grading.score_range.validate(entry.score)?;
        Ok(())
    }

    fn fetch_class(
        &self,
        class_id: ClassId,
        period: ResultPeriod,
    ) -> Result<ClassResults, ResultsError> {
        debug!(stage = Stage::Fetch.label(), %class_id, %period, "loading class results");
        let results = self
            .store
            .class_results(class_id, period)
            .map_err(|err| stage_failure(Stage::Fetch, ResultsError::from(err)))?;

        if results.records.is_empty() {
            return Err(stage_failure(
                Stage::Fetch,
                ResultsError::NoResults(format!("class {} in {period}", results.class.name)),
            ));
        }
        Ok(results)
    }

    fn rank_class(&self, results: ClassResults) -> Result<RankingSnapshot, ResultsError> {
        debug!(
            stage = Stage::Aggregate.label(),
            records = results.records.len(),
            policy = self.grading.aggregation.label(),
            "aggregating class results"
        );
        let (subjects, averages) = ranking::aggregate(&results.records, self.grading.aggregation)
            .map_err(|err| stage_failure(Stage::Aggregate, ResultsError::from(err)))?;

        debug!(stage = Stage::Rank.label(), students = averages.len(), "ranking class");
        let entries = ranking::rank(averages, &self.grading.remark_bands);

        let snapshot = RankingSnapshot {
            class: results.class,
            period: results.period,
            subjects,
            entries,
        };
        let incomplete = snapshot.incomplete_entries().count();
        if incomplete > 0 {
            debug!(students = incomplete, "ranking includes students with missing subjects");
        }
        Ok(snapshot)
    }
}

fn stage_failure(stage: Stage, error: ResultsError) -> ResultsError {
    warn!(stage = stage.label(), error = %error, "results pipeline failed");
    error
}

/// Error raised by the results service.
#[derive(Debug, thiserror::Error)]
pub enum ResultsError {
    #[error(transparent)]
    InvalidInput(#[from] InputError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("no results recorded for {0}")]
    NoResults(String),
    #[error("{school_id} has no results for {}", .missing_subjects.join(", "))]
    IncompleteResults {
        school_id: SchoolId,
        missing_subjects: Vec<String>,
    },
    #[error("results conflict: {0}")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("transcript rendering failed: {0}")]
    RenderFailed(#[source] RenderError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

impl From<StoreError> for ResultsError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::Duplicate(what) => Self::Conflict(format!("{what} already exists")),
            StoreError::Invalid(detail) => Self::InvalidInput(InputError::Rejected(detail)),
            StoreError::Conflict(detail) => Self::Conflict(detail),
            StoreError::Unavailable(detail) => Self::StoreUnavailable(detail),
        }
    }
}

impl From<IncompleteResults> for ResultsError {
    fn from(value: IncompleteResults) -> Self {
        Self::IncompleteResults {
            school_id: value.school_id,
            missing_subjects: value.missing_subjects,
        }
    }
}
