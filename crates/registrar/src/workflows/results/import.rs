use std::io::Read;

use serde::{Deserialize, Deserializer};

use super::domain::{AcademicYear, ResultEntry, ResultPeriod, Term};
use crate::workflows::enrollment::SchoolId;
use crate::workflows::InputError;

/// Parse a staff result upload with the columns
/// `school_id,subject,term,academic_year,score[,staff_id]`.
pub(crate) fn parse_entries<R: Read>(reader: R) -> Result<Vec<ResultEntry>, ImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut entries = Vec::new();

    for (index, row) in csv_reader.deserialize::<ResultRow>().enumerate() {
        let row = row?;
        let line = index + 2;
        let entry = row
            .into_entry()
            .map_err(|source| ImportError::Row { line, source })?;
        entries.push(entry);
    }

    Ok(entries)
}

#[derive(Debug, Deserialize)]
struct ResultRow {
    school_id: String,
    subject: String,
    term: String,
    academic_year: String,
    score: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    staff_id: Option<String>,
}

impl ResultRow {
    fn into_entry(self) -> Result<ResultEntry, InputError> {
        if self.school_id.is_empty() {
            return Err(InputError::Blank { field: "school_id" });
        }
        if self.subject.is_empty() {
            return Err(InputError::Blank { field: "subject" });
        }

        let term: Term = self.term.parse()?;
        let academic_year: AcademicYear = self.academic_year.parse()?;
        let score: f64 = self
            .score
            .parse()
            .map_err(|_| InputError::InvalidScore(self.score.clone()))?;

        Ok(ResultEntry {
            school_id: SchoolId(self.school_id),
            subject: self.subject,
            period: ResultPeriod::new(term, academic_year),
            score,
            recorded_by: self.staff_id.map(SchoolId),
        })
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("invalid result CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("line {line}: {source}")]
    Row { line: usize, source: InputError },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_rows_with_optional_staff() {
        let csv = "school_id,subject,term,academic_year,score,staff_id\n\
ORG/STU/2025/0001, Mathematics ,first,2025/2026,88.5,ORG/STF/2020/0003\n\
ORG/STU/2025/0002,English,Term 1,2025/2026,71,\n";
        let entries = parse_entries(Cursor::new(csv)).expect("parses");

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].subject, "Mathematics");
        assert_eq!(entries[0].score, 88.5);
        assert_eq!(
            entries[0].recorded_by,
            Some(SchoolId("ORG/STF/2020/0003".to_string()))
        );
        assert_eq!(entries[1].period.term, Term::First);
        assert_eq!(entries[1].recorded_by, None);
    }

    #[test]
    fn staff_column_is_optional() {
        let csv = "school_id,subject,term,academic_year,score\n\
ORG/STU/2025/0001,Mathematics,second,2025/2026,60\n";
        let entries = parse_entries(Cursor::new(csv)).expect("parses");
        assert_eq!(entries[0].recorded_by, None);
    }

    #[test]
    fn row_errors_carry_the_line_number() {
        let csv = "school_id,subject,term,academic_year,score,staff_id\n\
ORG/STU/2025/0001,Mathematics,first,2025/2026,88,\n\
ORG/STU/2025/0002,English,fifth,2025/2026,71,\n";
        match parse_entries(Cursor::new(csv)) {
            Err(ImportError::Row {
                line,
                source: InputError::UnknownTerm(term),
            }) => {
                assert_eq!(line, 3);
                assert_eq!(term, "fifth");
            }
            other => panic!("expected row error, got {other:?}"),
        }
    }
}
