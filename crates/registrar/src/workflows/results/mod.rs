//! Class ranking, transcript rendering and results export.

pub mod domain;
pub mod export;
pub mod grading;
mod import;
pub mod ranking;
pub mod repository;
mod service;
pub mod transcript;

#[cfg(test)]
mod tests;

pub use domain::{
    AcademicYear, ClassInfo, ClassResults, ResultEntry, ResultPeriod, ResultRecord,
    StudentProfile, SubjectId, SubjectInfo, Term, TranscriptScope,
};
pub use export::{read_export, ExportError, ExportedRow, EXPORT_FORMAT_VERSION};
pub use grading::{
    AggregationPolicy, GradingError, GradingPolicy, RemarkBand, RemarkBands, ScoreRange,
};
pub use import::ImportError;
pub use ranking::{RankedStudent, RankingSnapshot};
pub use repository::ResultStore;
pub use service::{ResultsError, ResultsService};
pub use transcript::{
    HtmlTranscriptRenderer, RenderError, Transcript, TranscriptRecord, TranscriptRenderer,
};
