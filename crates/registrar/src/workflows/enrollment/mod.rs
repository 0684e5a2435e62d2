//! School identifier allocation and enrollment.

mod allocator;
pub mod domain;
pub mod repository;

pub use allocator::{AllocationError, SequenceAllocator};
pub use domain::{
    ClassId, EnrolledStaff, EnrolledStudent, EnrollmentYear, Gender, IdentifierFormat, Role,
    SchoolId, StaffEnrollment, StudentEnrollment,
};
pub use repository::SequenceStore;
