use super::domain::{ClassResults, ResultEntry, ResultPeriod, TranscriptScope};
use crate::store::StoreError;
use crate::workflows::enrollment::{ClassId, SchoolId};

/// Storage abstraction for result rows so the results service can be
/// exercised in isolation.
///
/// Reads return owned data taken from a single store transaction, so callers
/// never observe a partial row set and never hold a store lock afterwards.
pub trait ResultStore: Send + Sync {
    /// Upsert every entry on (student, subject, term, academic year) in one
    /// transaction, tagging each with the student's current class. Returns
    /// the number of rows written. Any failure writes nothing.
    fn record_results(&self, entries: &[ResultEntry]) -> Result<usize, StoreError>;

    /// Every record of `class_id` for `period`. `NotFound` when the class does
    /// not exist; an empty record list when it has no results.
    fn class_results(
        &self,
        class_id: ClassId,
        period: ResultPeriod,
    ) -> Result<ClassResults, StoreError>;

    /// The student's profile and the full results of the class their
    /// `period` records were taken in. `NotFound` when the student does not
    /// exist.
    fn transcript_scope(
        &self,
        school_id: &SchoolId,
        period: ResultPeriod,
    ) -> Result<TranscriptScope, StoreError>;
}
