use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{
    ffi, params, Connection, ErrorCode, OptionalExtension, Row, Transaction,
    TransactionBehavior,
};
use tracing::{debug, warn};

use super::{SchoolDirectory, StoreError};
use crate::config::{StoreConfig, StoreLocation};
use crate::workflows::enrollment::{
    ClassId, EnrolledStaff, EnrolledStudent, EnrollmentYear, IdentifierFormat, Role, SchoolId,
    SequenceStore, StaffEnrollment, StudentEnrollment,
};
use crate::workflows::results::{
    ClassInfo, ClassResults, ResultEntry, ResultPeriod, ResultRecord, ResultStore,
    StudentProfile, SubjectId, SubjectInfo, TranscriptScope,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS school_id_sequences (
    role TEXT NOT NULL,
    year INTEGER NOT NULL,
    last_number INTEGER NOT NULL CHECK (last_number >= 0),
    PRIMARY KEY (role, year)
);

CREATE TABLE IF NOT EXISTS classes (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE CHECK (length(trim(name)) > 0),
    promotes_to INTEGER REFERENCES classes(id)
);

CREATE TABLE IF NOT EXISTS subjects (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE CHECK (length(trim(name)) > 0)
);

CREATE TABLE IF NOT EXISTS students (
    id INTEGER PRIMARY KEY,
    school_id TEXT NOT NULL UNIQUE,
    full_name TEXT NOT NULL,
    class_id INTEGER NOT NULL REFERENCES classes(id),
    date_of_birth TEXT NOT NULL,
    gender TEXT NOT NULL,
    enrollment_year INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS staff (
    id INTEGER PRIMARY KEY,
    school_id TEXT NOT NULL UNIQUE,
    full_name TEXT NOT NULL,
    enrollment_year INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS results (
    id INTEGER PRIMARY KEY,
    student_id INTEGER NOT NULL REFERENCES students(id),
    subject_id INTEGER NOT NULL REFERENCES subjects(id),
    class_id INTEGER NOT NULL REFERENCES classes(id),
    staff_id INTEGER REFERENCES staff(id),
    term TEXT NOT NULL,
    academic_year TEXT NOT NULL,
    score REAL NOT NULL,
    recorded_seq INTEGER NOT NULL DEFAULT 0,
    UNIQUE (student_id, subject_id, term, academic_year)
);

CREATE INDEX IF NOT EXISTS results_by_class_period
    ON results (class_id, term, academic_year);
";

/// Creates the counter at 1 or bumps it, returning the committed value.
const NEXT_SEQUENCE_SQL: &str = "
INSERT INTO school_id_sequences (role, year, last_number)
VALUES (?1, ?2, 1)
ON CONFLICT (role, year) DO UPDATE SET last_number = school_id_sequences.last_number + 1
RETURNING last_number
";

/// Inserts or replaces a score. Both paths stamp the row with a fresh
/// `recorded_seq`, so the highest value marks the latest write.
const UPSERT_RESULT_SQL: &str = "
INSERT INTO results
    (student_id, subject_id, class_id, staff_id, term, academic_year, score, recorded_seq)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, (SELECT COALESCE(MAX(recorded_seq), 0) + 1 FROM results))
ON CONFLICT (student_id, subject_id, term, academic_year) DO UPDATE SET
    score = excluded.score,
    staff_id = excluded.staff_id,
    class_id = excluded.class_id,
    recorded_seq = excluded.recorded_seq
";

/// A student's results for one period always share a class.
const REALIGN_PERIOD_SQL: &str = "
UPDATE results SET class_id = ?1
WHERE student_id = ?2 AND term = ?3 AND academic_year = ?4 AND class_id <> ?1
";

enum Backend {
    Memory(Mutex<Connection>),
    File(PathBuf),
}

/// SQLite implementation of every store trait.
///
/// File databases open a connection per call, run in WAL mode and serialise
/// writers with `BEGIN IMMEDIATE`. In-memory databases share one connection.
pub struct SqliteStore {
    backend: Backend,
    busy_timeout: Duration,
    write_attempts: u32,
    retry_backoff: Duration,
}

impl SqliteStore {
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let backend = match &config.location {
            StoreLocation::Memory => {
                let conn = Connection::open_in_memory()?;
                prepare_connection(&conn, config.busy_timeout)?;
                conn.execute_batch(SCHEMA)?;
                Backend::Memory(Mutex::new(conn))
            }
            StoreLocation::File(path) => {
                let conn = Connection::open(path)?;
                prepare_connection(&conn, config.busy_timeout)?;
                let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                    row.get(0)
                })?;
                conn.execute_batch(SCHEMA)?;
                debug!(path = %path.display(), journal_mode = %mode, "opened sqlite store");
                Backend::File(path.clone())
            }
        };

        Ok(Self {
            backend,
            busy_timeout: config.busy_timeout,
            write_attempts: config.write_attempts.max(1),
            retry_backoff: config.retry_backoff,
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::open(&StoreConfig::in_memory())
    }

    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::open(&StoreConfig::at_path(path.as_ref()))
    }

    fn with_connection<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        match &self.backend {
            Backend::Memory(conn) => {
                let mut guard = conn
                    .lock()
                    .map_err(|_| StoreError::Unavailable("connection mutex poisoned".to_string()))?;
                f(&mut guard)
            }
            Backend::File(path) => {
                let mut conn = Connection::open(path)?;
                prepare_connection(&conn, self.busy_timeout)?;
                f(&mut conn)
            }
        }
    }

    /// Run `f` inside one deferred transaction so every read sees the same
    /// snapshot.
    fn read<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        self.with_connection(|conn| {
            let tx = conn.transaction()?;
            let value = f(&tx)?;
            tx.commit()?;
            Ok(value)
        })
    }

    /// Run `f` inside an immediate write transaction, retrying on contention.
    ///
    /// A failed attempt rolls back completely before the next one starts.
    fn write<T>(
        &self,
        operation: &'static str,
        mut f: impl FnMut(&Transaction<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut attempt = 1;
        loop {
            let outcome = self.with_connection(|conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let value = f(&tx)?;
                tx.commit()?;
                Ok(value)
            });

            match outcome {
                Err(StoreError::Conflict(detail)) if attempt < self.write_attempts => {
                    warn!(operation, attempt, %detail, "write contention, retrying");
                    thread::sleep(self.retry_backoff * attempt);
                    attempt += 1;
                }
                Err(StoreError::Conflict(detail)) => {
                    warn!(operation, attempts = attempt, %detail, "write retries exhausted");
                    return Err(StoreError::Conflict(detail));
                }
                other => return other,
            }
        }
    }
}

fn prepare_connection(conn: &Connection, busy_timeout: Duration) -> Result<(), StoreError> {
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(())
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                    StoreError::Conflict(err.to_string())
                }
                ErrorCode::ConstraintViolation
                    if failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                        || failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
                {
                    StoreError::Duplicate(err.to_string())
                }
                ErrorCode::ConstraintViolation => StoreError::Invalid(err.to_string()),
                _ => StoreError::Unavailable(err.to_string()),
            },
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY
    )
}

fn conversion_error<E>(index: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err))
}

fn next_sequence(conn: &Connection, role: Role, year: EnrollmentYear) -> Result<u32, StoreError> {
    let number: u32 = conn.query_row(
        NEXT_SEQUENCE_SQL,
        params![role.as_str(), year.value()],
        |row| row.get(0),
    )?;
    Ok(number)
}

fn class_from_row(row: &Row<'_>) -> rusqlite::Result<ClassInfo> {
    Ok(ClassInfo {
        id: ClassId(row.get(0)?),
        name: row.get(1)?,
        promotes_to: row.get::<_, Option<i64>>(2)?.map(ClassId),
    })
}

fn load_class(conn: &Connection, id: ClassId) -> Result<Option<ClassInfo>, StoreError> {
    let class = conn
        .query_row(
            "SELECT id, name, promotes_to FROM classes WHERE id = ?1",
            params![id.0],
            class_from_row,
        )
        .optional()?;
    Ok(class)
}

fn load_student(conn: &Connection, school_id: &SchoolId) -> Result<Option<StudentProfile>, StoreError> {
    let profile = conn
        .query_row(
            "SELECT school_id, full_name, class_id, date_of_birth, gender
             FROM students WHERE school_id = ?1",
            params![school_id.as_str()],
            |row| {
                let date_of_birth: String = row.get(3)?;
                let gender: String = row.get(4)?;
                Ok(StudentProfile {
                    school_id: SchoolId(row.get(0)?),
                    full_name: row.get(1)?,
                    class_id: ClassId(row.get(2)?),
                    date_of_birth: NaiveDate::parse_from_str(&date_of_birth, "%Y-%m-%d")
                        .map_err(|err| conversion_error(3, err))?,
                    gender: gender.parse().map_err(|err| conversion_error(4, err))?,
                })
            },
        )
        .optional()?;
    Ok(profile)
}

fn load_class_results(
    conn: &Connection,
    class_id: ClassId,
    period: ResultPeriod,
) -> Result<ClassResults, StoreError> {
    let class = load_class(conn, class_id)?
        .ok_or_else(|| StoreError::NotFound(format!("class {class_id}")))?;
    let promotes_to = match class.promotes_to {
        Some(next) => load_class(conn, next)?,
        None => None,
    };

    let mut stmt = conn.prepare(
        "SELECT s.school_id, s.full_name, sub.name, r.score, st.school_id
         FROM results r
         JOIN students s ON s.id = r.student_id
         JOIN subjects sub ON sub.id = r.subject_id
         LEFT JOIN staff st ON st.id = r.staff_id
         WHERE r.class_id = ?1 AND r.term = ?2 AND r.academic_year = ?3
         ORDER BY s.id, sub.name",
    )?;
    let records = stmt
        .query_map(
            params![
                class_id.0,
                period.term.as_str(),
                period.academic_year.to_string()
            ],
            |row| {
                Ok(ResultRecord {
                    school_id: SchoolId(row.get(0)?),
                    student_name: row.get(1)?,
                    subject: row.get(2)?,
                    score: row.get(3)?,
                    recorded_by: row.get::<_, Option<String>>(4)?.map(SchoolId),
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ClassResults {
        class,
        promotes_to,
        period,
        records,
    })
}

impl SequenceStore for SqliteStore {
    fn increment(&self, role: Role, year: EnrollmentYear) -> Result<u32, StoreError> {
        self.write("increment_sequence", |tx| next_sequence(tx, role, year))
    }

    fn last_issued(&self, role: Role, year: EnrollmentYear) -> Result<Option<u32>, StoreError> {
        self.read(|tx| {
            let last = tx
                .query_row(
                    "SELECT last_number FROM school_id_sequences WHERE role = ?1 AND year = ?2",
                    params![role.as_str(), year.value()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(last)
        })
    }

    fn enroll_student(
        &self,
        enrollment: &StudentEnrollment,
        format: &IdentifierFormat,
    ) -> Result<EnrolledStudent, StoreError> {
        self.write("enroll_student", |tx| {
            let year = enrollment.enrollment_year;
            let number = next_sequence(tx, Role::Student, year)?;
            let school_id = format.format(Role::Student, year, number);

            tx.execute(
                "INSERT INTO students
                    (school_id, full_name, class_id, date_of_birth, gender, enrollment_year)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    school_id.as_str(),
                    enrollment.full_name,
                    enrollment.class_id.0,
                    enrollment.date_of_birth.format("%Y-%m-%d").to_string(),
                    enrollment.gender.as_str(),
                    year.value()
                ],
            )
            .map_err(|err| {
                if is_foreign_key_violation(&err) {
                    StoreError::NotFound(format!("class {}", enrollment.class_id))
                } else {
                    StoreError::from(err)
                }
            })?;

            Ok(EnrolledStudent {
                school_id,
                sequence_number: number,
                full_name: enrollment.full_name.clone(),
                class_id: enrollment.class_id,
                date_of_birth: enrollment.date_of_birth,
                gender: enrollment.gender,
                enrollment_year: year,
            })
        })
    }

    fn enroll_staff(
        &self,
        enrollment: &StaffEnrollment,
        format: &IdentifierFormat,
    ) -> Result<EnrolledStaff, StoreError> {
        self.write("enroll_staff", |tx| {
            let year = enrollment.enrollment_year;
            let number = next_sequence(tx, Role::Staff, year)?;
            let school_id = format.format(Role::Staff, year, number);

            tx.execute(
                "INSERT INTO staff (school_id, full_name, enrollment_year) VALUES (?1, ?2, ?3)",
                params![school_id.as_str(), enrollment.full_name, year.value()],
            )?;

            Ok(EnrolledStaff {
                school_id,
                sequence_number: number,
                full_name: enrollment.full_name.clone(),
                enrollment_year: year,
            })
        })
    }
}

impl ResultStore for SqliteStore {
    fn record_results(&self, entries: &[ResultEntry]) -> Result<usize, StoreError> {
        self.write("record_results", |tx| {
            for entry in entries {
                let (student_id, class_id): (i64, i64) = tx
                    .query_row(
                        "SELECT id, class_id FROM students WHERE school_id = ?1",
                        params![entry.school_id.as_str()],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?
                    .ok_or_else(|| StoreError::NotFound(format!("student {}", entry.school_id)))?;

                let subject_id: i64 = tx
                    .query_row(
                        "SELECT id FROM subjects WHERE name = ?1",
                        params![entry.subject.trim()],
                        |row| row.get(0),
                    )
                    .optional()?
                    .ok_or_else(|| StoreError::NotFound(format!("subject '{}'", entry.subject)))?;

                let staff_id: Option<i64> = match &entry.recorded_by {
                    Some(staff) => Some(
                        tx.query_row(
                            "SELECT id FROM staff WHERE school_id = ?1",
                            params![staff.as_str()],
                            |row| row.get(0),
                        )
                        .optional()?
                        .ok_or_else(|| StoreError::NotFound(format!("staff {staff}")))?,
                    ),
                    None => None,
                };

                let term = entry.period.term.as_str();
                let academic_year = entry.period.academic_year.to_string();
                tx.execute(
                    UPSERT_RESULT_SQL,
                    params![
                        student_id,
                        subject_id,
                        class_id,
                        staff_id,
                        term,
                        academic_year,
                        entry.score
                    ],
                )?;
                let moved = tx.execute(
                    REALIGN_PERIOD_SQL,
                    params![class_id, student_id, term, academic_year],
                )?;
                if moved > 0 {
                    debug!(
                        school_id = %entry.school_id,
                        period = %entry.period,
                        rows = moved,
                        "moved earlier results to the student's current class"
                    );
                }
            }
            Ok(entries.len())
        })
    }

    fn class_results(
        &self,
        class_id: ClassId,
        period: ResultPeriod,
    ) -> Result<ClassResults, StoreError> {
        self.read(|tx| load_class_results(tx, class_id, period))
    }

    fn transcript_scope(
        &self,
        school_id: &SchoolId,
        period: ResultPeriod,
    ) -> Result<TranscriptScope, StoreError> {
        self.read(|tx| {
            let profile = load_student(tx, school_id)?
                .ok_or_else(|| StoreError::NotFound(format!("student {school_id}")))?;

            let mut stmt = tx.prepare(
                "SELECT r.class_id FROM results r
                 JOIN students s ON s.id = r.student_id
                 WHERE s.school_id = ?1 AND r.term = ?2 AND r.academic_year = ?3
                 GROUP BY r.class_id
                 ORDER BY MAX(r.recorded_seq) DESC",
            )?;
            let recorded_in = stmt
                .query_map(
                    params![
                        school_id.as_str(),
                        period.term.as_str(),
                        period.academic_year.to_string()
                    ],
                    |row| row.get::<_, i64>(0),
                )?
                .collect::<Result<Vec<_>, _>>()?;

            let class = match recorded_in.as_slice() {
                [] => None,
                [class_id] => Some(load_class_results(tx, ClassId(*class_id), period)?),
                _ => {
                    return Err(StoreError::Conflict(format!(
                        "results of student {school_id} for {period} span {} classes",
                        recorded_in.len()
                    )))
                }
            };

            Ok(TranscriptScope { profile, class })
        })
    }
}

impl SchoolDirectory for SqliteStore {
    fn create_class(
        &self,
        name: &str,
        promotes_to: Option<ClassId>,
    ) -> Result<ClassInfo, StoreError> {
        let name = name.trim();
        self.write("create_class", |tx| {
            tx.execute(
                "INSERT INTO classes (name, promotes_to) VALUES (?1, ?2)",
                params![name, promotes_to.map(|id| id.0)],
            )
            .map_err(|err| match (is_foreign_key_violation(&err), promotes_to) {
                (true, Some(id)) => StoreError::NotFound(format!("class {id}")),
                _ => match StoreError::from(err) {
                    StoreError::Duplicate(_) => StoreError::Duplicate(format!("class '{name}'")),
                    other => other,
                },
            })?;

            Ok(ClassInfo {
                id: ClassId(tx.last_insert_rowid()),
                name: name.to_string(),
                promotes_to,
            })
        })
    }

    fn create_subject(&self, name: &str) -> Result<SubjectInfo, StoreError> {
        let name = name.trim();
        self.write("create_subject", |tx| {
            tx.execute("INSERT INTO subjects (name) VALUES (?1)", params![name])
                .map_err(|err| match StoreError::from(err) {
                    StoreError::Duplicate(_) => StoreError::Duplicate(format!("subject '{name}'")),
                    other => other,
                })?;

            Ok(SubjectInfo {
                id: SubjectId(tx.last_insert_rowid()),
                name: name.to_string(),
            })
        })
    }

    fn class(&self, id: ClassId) -> Result<Option<ClassInfo>, StoreError> {
        self.read(|tx| load_class(tx, id))
    }

    fn classes(&self) -> Result<Vec<ClassInfo>, StoreError> {
        self.read(|tx| {
            let mut stmt = tx.prepare("SELECT id, name, promotes_to FROM classes ORDER BY name")?;
            let classes = stmt
                .query_map([], class_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(classes)
        })
    }

    fn subjects(&self) -> Result<Vec<SubjectInfo>, StoreError> {
        self.read(|tx| {
            let mut stmt = tx.prepare("SELECT id, name FROM subjects ORDER BY name")?;
            let subjects = stmt
                .query_map([], |row| {
                    Ok(SubjectInfo {
                        id: SubjectId(row.get(0)?),
                        name: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(subjects)
        })
    }

    fn student(&self, school_id: &SchoolId) -> Result<Option<StudentProfile>, StoreError> {
        self.read(|tx| load_student(tx, school_id))
    }

    fn assign_class(&self, school_id: &SchoolId, class_id: ClassId) -> Result<(), StoreError> {
        self.write("assign_class", |tx| {
            let updated = tx
                .execute(
                    "UPDATE students SET class_id = ?1 WHERE school_id = ?2",
                    params![class_id.0, school_id.as_str()],
                )
                .map_err(|err| {
                    if is_foreign_key_violation(&err) {
                        StoreError::NotFound(format!("class {class_id}"))
                    } else {
                        StoreError::from(err)
                    }
                })?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("student {school_id}")));
            }
            Ok(())
        })
    }
}
