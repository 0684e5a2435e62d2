use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::workflows::enrollment::{ClassId, Gender, SchoolId};
use crate::workflows::InputError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Term {
    First,
    Second,
    Third,
}

impl Term {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Second => "second",
            Self::Third => "third",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::First => "First Term",
            Self::Second => "Second Term",
            Self::Third => "Third Term",
        }
    }

    /// The term after which students are considered for promotion.
    pub const fn closes_session(self) -> bool {
        matches!(self, Self::Third)
    }
}

impl FromStr for Term {
    type Err = InputError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized: String = value
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|ch| !ch.is_whitespace() && *ch != '_' && *ch != '-')
            .collect();
        let key = normalized
            .strip_suffix("term")
            .or_else(|| normalized.strip_prefix("term"))
            .unwrap_or(&normalized);

        match key {
            "first" | "1" | "1st" => Ok(Self::First),
            "second" | "2" | "2nd" => Ok(Self::Second),
            "third" | "3" | "3rd" => Ok(Self::Third),
            _ => Err(InputError::UnknownTerm(value.to_string())),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// School session spanning two calendar years, e.g. `2024/2025`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AcademicYear {
    start: u16,
}

impl AcademicYear {
    pub fn starting(start: u16) -> Result<Self, InputError> {
        if (1000..=9998).contains(&start) {
            Ok(Self { start })
        } else {
            Err(InputError::InvalidAcademicYear(start.to_string()))
        }
    }

    pub const fn start(self) -> u16 {
        self.start
    }

    pub const fn end(self) -> u16 {
        self.start + 1
    }
}

impl FromStr for AcademicYear {
    type Err = InputError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || InputError::InvalidAcademicYear(value.to_string());
        let (start, end) = value
            .trim()
            .split_once(['/', '-'])
            .ok_or_else(invalid)?;
        let start: u16 = start.trim().parse().map_err(|_| invalid())?;
        let end: u16 = end.trim().parse().map_err(|_| invalid())?;
        if end != start.saturating_add(1) {
            return Err(invalid());
        }

        Self::starting(start).map_err(|_| invalid())
    }
}

impl TryFrom<String> for AcademicYear {
    type Error = InputError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AcademicYear> for String {
    fn from(value: AcademicYear) -> Self {
        value.to_string()
    }
}

impl fmt::Display for AcademicYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.start, self.end())
    }
}

/// A term within an academic year: the scope every ranking is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultPeriod {
    pub term: Term,
    pub academic_year: AcademicYear,
}

impl ResultPeriod {
    pub const fn new(term: Term, academic_year: AcademicYear) -> Self {
        Self {
            term,
            academic_year,
        }
    }
}

impl fmt::Display for ResultPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.term.label(), self.academic_year)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectId(pub i64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub id: ClassId,
    pub name: String,
    pub promotes_to: Option<ClassId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectInfo {
    pub id: SubjectId,
    pub name: String,
}

/// Score submitted by staff for one student and subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub school_id: SchoolId,
    pub subject: String,
    pub period: ResultPeriod,
    pub score: f64,
    pub recorded_by: Option<SchoolId>,
}

/// Persisted result row as read back for one class and period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub school_id: SchoolId,
    pub student_name: String,
    pub subject: String,
    pub score: f64,
    pub recorded_by: Option<SchoolId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub school_id: SchoolId,
    pub full_name: String,
    pub class_id: ClassId,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
}

/// Every record of a class for one period, read in a single transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassResults {
    pub class: ClassInfo,
    pub promotes_to: Option<ClassInfo>,
    pub period: ResultPeriod,
    pub records: Vec<ResultRecord>,
}

/// Student profile plus the class results the transcript is ranked against.
///
/// `class` is `None` when the student has no records for the period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptScope {
    pub profile: StudentProfile,
    pub class: Option<ClassResults>,
}
