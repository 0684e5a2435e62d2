use std::sync::Arc;

use tracing::{info, warn};

use super::domain::{
    require_name, EnrolledStaff, EnrolledStudent, EnrollmentYear, IdentifierFormat, Role,
    SchoolId, StaffEnrollment, StudentEnrollment,
};
use super::repository::SequenceStore;
use crate::store::StoreError;
use crate::workflows::InputError;

/// Issues school identifiers from per-(role, year) store counters.
pub struct SequenceAllocator<S> {
    store: Arc<S>,
    format: IdentifierFormat,
}

impl<S> SequenceAllocator<S>
where
    S: SequenceStore + 'static,
{
    pub fn new(store: Arc<S>, format: IdentifierFormat) -> Self {
        Self { store, format }
    }

    /// Reserve the next identifier for `role` in `year`.
    ///
    /// The number is committed before this returns. If the caller later fails
    /// to persist whatever the identifier was meant for, the number is lost
    /// and the sequence has a gap. Use [`Self::enroll_student`] or
    /// [`Self::enroll_staff`] when the identifier and the member row must
    /// commit together.
    pub fn allocate(&self, role: Role, year: i64) -> Result<SchoolId, AllocationError> {
        let year = EnrollmentYear::new(year)?;
        let number = self.store.increment(role, year).map_err(|err| {
            warn!(%role, %year, error = %err, "identifier allocation failed");
            AllocationError::from(err)
        })?;

        let school_id = self.format.format(role, year, number);
        info!(%role, %year, number, school_id = %school_id, "allocated school identifier");
        Ok(school_id)
    }

    /// Best-effort preview of the identifier the next allocation would issue.
    ///
    /// Never mutates the counter. The value can be stale as soon as it is
    /// read when other callers allocate concurrently, so it is only suitable
    /// for administrative display and must not be handed out as an identifier.
    pub fn peek_next(&self, role: Role, year: i64) -> Result<SchoolId, AllocationError> {
        let year = EnrollmentYear::new(year)?;
        let last = self.store.last_issued(role, year)?;
        let next = last.map_or(1, |value| value.saturating_add(1));
        Ok(self.format.format(role, year, next))
    }

    /// Allocate a student identifier and persist the student atomically.
    pub fn enroll_student(
        &self,
        mut enrollment: StudentEnrollment,
    ) -> Result<EnrolledStudent, AllocationError> {
        enrollment.full_name = require_name(&enrollment.full_name, "full_name")?;

        let student = self
            .store
            .enroll_student(&enrollment, &self.format)
            .map_err(|err| {
                warn!(
                    class_id = %enrollment.class_id,
                    year = %enrollment.enrollment_year,
                    error = %err,
                    "student enrollment rolled back"
                );
                AllocationError::from(err)
            })?;

        info!(
            school_id = %student.school_id,
            class_id = %student.class_id,
            "student enrolled"
        );
        Ok(student)
    }

    /// Allocate a staff identifier and persist the staff member atomically.
    pub fn enroll_staff(
        &self,
        mut enrollment: StaffEnrollment,
    ) -> Result<EnrolledStaff, AllocationError> {
        enrollment.full_name = require_name(&enrollment.full_name, "full_name")?;

        let staff = self
            .store
            .enroll_staff(&enrollment, &self.format)
            .map_err(|err| {
                warn!(year = %enrollment.enrollment_year, error = %err, "staff enrollment rolled back");
                AllocationError::from(err)
            })?;

        info!(school_id = %staff.school_id, "staff member enrolled");
        Ok(staff)
    }
}

/// Error raised by the allocator. No variant ever carries a fallback number.
#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    #[error(transparent)]
    InvalidInput(#[from] InputError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("allocation conflict: {0}")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<StoreError> for AllocationError {
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
