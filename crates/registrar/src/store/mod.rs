//! Relational store backing the allocator and the results service.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::workflows::enrollment::{ClassId, SchoolId};
use crate::workflows::results::{ClassInfo, StudentProfile, SubjectInfo};

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} already exists")]
    Duplicate(String),
    /// Rejected by a schema constraint other than uniqueness.
    #[error("rejected by store: {0}")]
    Invalid(String),
    /// Write contention that outlasted the retry budget, or stored rows that
    /// contradict each other.
    #[error("write conflict: {0}")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Class and subject setup plus lookups used by callers and fixtures.
pub trait SchoolDirectory: Send + Sync {
    fn create_class(
        &self,
        name: &str,
        promotes_to: Option<ClassId>,
    ) -> Result<ClassInfo, StoreError>;
    fn create_subject(&self, name: &str) -> Result<SubjectInfo, StoreError>;
    fn class(&self, id: ClassId) -> Result<Option<ClassInfo>, StoreError>;
    fn classes(&self) -> Result<Vec<ClassInfo>, StoreError>;
    fn subjects(&self) -> Result<Vec<SubjectInfo>, StoreError>;
    fn student(&self, school_id: &SchoolId) -> Result<Option<StudentProfile>, StoreError>;
    /// Move a student to another class. Results already recorded keep their
    /// class until the student's next score for that period is written.
    fn assign_class(&self, school_id: &SchoolId, class_id: ClassId) -> Result<(), StoreError>;
}
