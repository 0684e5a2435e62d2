use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::workflows::InputError;

/// Membership role that scopes an identifier sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Staff,
}

impl Role {
    /// Code embedded in the school identifier.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Student => "STU",
            Self::Staff => "STF",
        }
    }

    /// Stable key used for persistence.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Staff => "staff",
        }
    }
}

impl FromStr for Role {
    type Err = InputError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "student" | "stu" => Ok(Self::Student),
            "staff" | "stf" => Ok(Self::Staff),
            _ => Err(InputError::UnknownRole(value.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Calendar year an identifier sequence belongs to. Always four digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u16")]
pub struct EnrollmentYear(u16);

impl EnrollmentYear {
    pub fn new(year: i64) -> Result<Self, InputError> {
        if (1000..=9999).contains(&year) {
            Ok(Self(year as u16))
        } else {
            Err(InputError::InvalidYear(year))
        }
    }

    pub const fn value(self) -> u16 {
        self.0
    }
}

impl TryFrom<i64> for EnrollmentYear {
    type Error = InputError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EnrollmentYear> for u16 {
    fn from(value: EnrollmentYear) -> Self {
        value.0
    }
}

impl fmt::Display for EnrollmentYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Human-readable identifier of the form `ORG/ROLE/YEAR/NNNN`.
///
/// Ordering compares `/`-separated segments, numerically where both
/// segments are digits, so `.../9999` sorts before `.../10000`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchoolId(pub String);

impl SchoolId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for SchoolId {
    fn cmp(&self, other: &Self) -> Ordering {
        let mut left = self.0.split('/');
        let mut right = other.0.split('/');
        loop {
            match (left.next(), right.next()) {
                (Some(a), Some(b)) => match compare_segment(a, b) {
                    Ordering::Equal => continue,
                    unequal => return unequal,
                },
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
                (None, None) => return self.0.cmp(&other.0),
            }
        }
    }
}

impl PartialOrd for SchoolId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn compare_segment(a: &str, b: &str) -> Ordering {
    let is_number =
        |segment: &str| !segment.is_empty() && segment.bytes().all(|byte| byte.is_ascii_digit());
    if is_number(a) && is_number(b) {
        let a = a.trim_start_matches('0');
        let b = b.trim_start_matches('0');
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    } else {
        a.cmp(b)
    }
}

impl fmt::Display for SchoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Formats allocated sequence numbers into school identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierFormat {
    org_prefix: String,
}

impl IdentifierFormat {
    pub fn new(org_prefix: impl Into<String>) -> Result<Self, InputError> {
        let org_prefix = org_prefix.into();
        let trimmed = org_prefix.trim();
        if trimmed.is_empty() || trimmed.contains('/') {
            return Err(InputError::InvalidPrefix(org_prefix));
        }

        Ok(Self {
            org_prefix: trimmed.to_string(),
        })
    }

    pub fn org_prefix(&self) -> &str {
        &self.org_prefix
    }

    /// Numbers above 9999 widen the suffix rather than wrapping.
    pub fn format(&self, role: Role, year: EnrollmentYear, number: u32) -> SchoolId {
        SchoolId(format!(
            "{}/{}/{}/{number:04}",
            self.org_prefix,
            role.code(),
            year
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Female,
    Male,
}

impl Gender {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Female => "female",
            Self::Male => "male",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Female => "Female",
            Self::Male => "Male",
        }
    }
}

impl FromStr for Gender {
    type Err = InputError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "female" | "f" => Ok(Self::Female),
            "male" | "m" => Ok(Self::Male),
            _ => Err(InputError::UnknownGender(value.to_string())),
        }
    }
}

/// Row key of a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassId(pub i64);

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Approved student enrollment awaiting an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentEnrollment {
    pub full_name: String,
    pub class_id: ClassId,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub enrollment_year: EnrollmentYear,
}

/// Approved staff enrollment awaiting an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffEnrollment {
    pub full_name: String,
    pub enrollment_year: EnrollmentYear,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrolledStudent {
    pub school_id: SchoolId,
    pub sequence_number: u32,
    pub full_name: String,
    pub class_id: ClassId,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub enrollment_year: EnrollmentYear,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrolledStaff {
    pub school_id: SchoolId,
    pub sequence_number: u32,
    pub full_name: String,
    pub enrollment_year: EnrollmentYear,
}

pub(crate) fn require_name(value: &str, field: &'static str) -> Result<String, InputError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(InputError::Blank { field })
    } else {
        Ok(trimmed.to_string())
    }
}
