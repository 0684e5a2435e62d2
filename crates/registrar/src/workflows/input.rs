/// Rejected boundary input: malformed roles, years, terms, scores and names.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InputError {
    #[error("unknown role '{0}' (expected student or staff)")]
    UnknownRole(String),
    #[error("year {0} is not a 4-digit calendar year")]
    InvalidYear(i64),
    #[error("unknown term '{0}' (expected first, second or third)")]
    UnknownTerm(String),
    #[error("invalid academic year '{0}' (expected a session such as 2024/2025)")]
    InvalidAcademicYear(String),
    #[error("unknown gender '{0}'")]
    UnknownGender(String),
    #[error("invalid date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),
    #[error("invalid score '{0}'")]
    InvalidScore(String),
    #[error("score {score} is outside the valid range {min}..={max}")]
    ScoreOutOfRange { score: f64, min: f64, max: f64 },
    #[error("{field} must not be empty")]
    Blank { field: &'static str },
    #[error("identifier prefix '{0}' must be non-empty and must not contain '/'")]
    InvalidPrefix(String),
    #[error("{0}")]
    Rejected(String),
}
