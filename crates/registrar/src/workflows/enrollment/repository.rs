use super::domain::{
    EnrolledStaff, EnrolledStudent, EnrollmentYear, IdentifierFormat, Role, StaffEnrollment,
    StudentEnrollment,
};
use crate::store::StoreError;

/// Store primitives the allocator needs.
///
/// Every method runs in its own store transaction. Implementations must make
/// `increment` atomic: two concurrent callers for the same `(role, year)`
/// never receive the same number.
pub trait SequenceStore: Send + Sync {
    /// Creates the counter at 1 when absent, otherwise adds 1, and returns the
    /// committed value.
    fn increment(&self, role: Role, year: EnrollmentYear) -> Result<u32, StoreError>;

    /// Last committed number, without mutating the counter.
    fn last_issued(&self, role: Role, year: EnrollmentYear) -> Result<Option<u32>, StoreError>;

    /// Increments the student counter and inserts the student row in one
    /// transaction. A failed insert leaves the counter untouched.
    fn enroll_student(
        &self,
        enrollment: &StudentEnrollment,
        format: &IdentifierFormat,
    ) -> Result<EnrolledStudent, StoreError>;

    /// Staff counterpart of [`SequenceStore::enroll_student`].
    fn enroll_staff(
        &self,
        enrollment: &StaffEnrollment,
        format: &IdentifierFormat,
    ) -> Result<EnrolledStaff, StoreError>;
}
