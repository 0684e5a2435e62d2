use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use crate::store::StoreError;
use crate::workflows::enrollment::{ClassId, Gender, SchoolId};
use crate::workflows::results::domain::{
    AcademicYear, ClassInfo, ClassResults, ResultEntry, ResultPeriod, ResultRecord,
    StudentProfile, Term, TranscriptScope,
};
use crate::workflows::results::grading::GradingPolicy;
use crate::workflows::results::repository::ResultStore;
use crate::workflows::results::transcript::{RenderError, TranscriptRecord, TranscriptRenderer};
use crate::workflows::results::ResultsService;

pub(super) const JSS1: ClassId = ClassId(1);
pub(super) const JSS2: ClassId = ClassId(2);

pub(super) fn session() -> AcademicYear {
    AcademicYear::starting(2024).expect("valid session")
}

pub(super) fn first_term() -> ResultPeriod {
    ResultPeriod::new(Term::First, session())
}

pub(super) fn third_term() -> ResultPeriod {
    ResultPeriod::new(Term::Third, session())
}

pub(super) fn generated_on() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 7, 18).expect("valid date")
}

pub(super) fn student_id(number: u32) -> SchoolId {
    SchoolId(format!("Kristobell/STU/2024/{number:04}"))
}

pub(super) fn entry(number: u32, subject: &str, period: ResultPeriod, score: f64) -> ResultEntry {
    ResultEntry {
        school_id: student_id(number),
        subject: subject.to_string(),
        period,
        score,
        recorded_by: None,
    }
}

#[derive(Debug, Clone)]
struct StoredResult {
    class_id: ClassId,
    entry: ResultEntry,
}

/// Result store fake keyed the way the relational store keys rows: one score
/// per student, subject and period.
#[derive(Default)]
pub(super) struct MemoryResults {
    classes: Mutex<HashMap<ClassId, ClassInfo>>,
    students: Mutex<HashMap<SchoolId, StudentProfile>>,
    results: Mutex<Vec<StoredResult>>,
}

impl MemoryResults {
    /// JSS 1 promoting to JSS 2, with three JSS 1 students.
    pub(super) fn seeded() -> Self {
        let store = Self::default();
        store.add_class(JSS1, "JSS 1", Some(JSS2));
        store.add_class(JSS2, "JSS 2", None);
        store.add_student(1, "Ada Obi", JSS1);
        store.add_student(2, "Bayo Musa", JSS1);
        store.add_student(3, "Chika Eze", JSS1);
        store
    }

    pub(super) fn add_class(&self, id: ClassId, name: &str, promotes_to: Option<ClassId>) {
        self.classes.lock().expect("classes lock").insert(
            id,
            ClassInfo {
                id,
                name: name.to_string(),
                promotes_to,
            },
        );
    }

    pub(super) fn add_student(&self, number: u32, name: &str, class_id: ClassId) {
        let profile = StudentProfile {
            school_id: student_id(number),
            full_name: name.to_string(),
            class_id,
            date_of_birth: NaiveDate::from_ymd_opt(2012, 3, 14).expect("valid date"),
            gender: Gender::Female,
        };
        self.students
            .lock()
            .expect("students lock")
            .insert(profile.school_id.clone(), profile);
    }

    pub(super) fn move_student(&self, number: u32, class_id: ClassId) {
        if let Some(profile) = self
            .students
            .lock()
            .expect("students lock")
            .get_mut(&student_id(number))
        {
            profile.class_id = class_id;
        }
    }

    pub(super) fn stored_count(&self) -> usize {
        self.results.lock().expect("results lock").len()
    }

    fn class_results_locked(
        &self,
        class_id: ClassId,
        period: ResultPeriod,
    ) -> Result<ClassResults, StoreError> {
        let classes = self.classes.lock().expect("classes lock");
        let class = classes
            .get(&class_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("class {class_id}")))?;
        let promotes_to = class
            .promotes_to
            .and_then(|next| classes.get(&next).cloned());

        let students = self.students.lock().expect("students lock");
        let records = self
            .results
            .lock()
            .expect("results lock")
            .iter()
            .filter(|stored| stored.class_id == class_id && stored.entry.period == period)
            .map(|stored| ResultRecord {
                school_id: stored.entry.school_id.clone(),
                student_name: students
                    .get(&stored.entry.school_id)
                    .map(|profile| profile.full_name.clone())
                    .unwrap_or_default(),
                subject: stored.entry.subject.clone(),
                score: stored.entry.score,
                recorded_by: stored.entry.recorded_by.clone(),
            })
            .collect();

        Ok(ClassResults {
            class,
            promotes_to,
            period,
            records,
        })
    }
}

impl ResultStore for MemoryResults {
    fn record_results(&self, entries: &[ResultEntry]) -> Result<usize, StoreError> {
        let students = self.students.lock().expect("students lock");
        let mut staged = Vec::with_capacity(entries.len());
        for entry in entries {
            let profile = students
                .get(&entry.school_id)
                .ok_or_else(|| StoreError::NotFound(format!("student {}", entry.school_id)))?;
            staged.push(StoredResult {
                class_id: profile.class_id,
                entry: entry.clone(),
            });
        }

        let mut results = self.results.lock().expect("results lock");
        for stored in staged {
            results.retain(|existing| {
                !(existing.entry.school_id == stored.entry.school_id
                    && existing.entry.subject == stored.entry.subject
                    && existing.entry.period == stored.entry.period)
            });
            for existing in results.iter_mut() {
                if existing.entry.school_id == stored.entry.school_id
                    && existing.entry.period == stored.entry.period
                {
                    existing.class_id = stored.class_id;
                }
            }
            results.push(stored);
        }
        Ok(entries.len())
    }

    fn class_results(
        &self,
        class_id: ClassId,
        period: ResultPeriod,
    ) -> Result<ClassResults, StoreError> {
        self.class_results_locked(class_id, period)
    }

    fn transcript_scope(
        &self,
        school_id: &SchoolId,
        period: ResultPeriod,
    ) -> Result<TranscriptScope, StoreError> {
        let profile = self
            .students
            .lock()
            .expect("students lock")
            .get(school_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("student {school_id}")))?;

        let mut recorded_in: Vec<ClassId> = Vec::new();
        for stored in self.results.lock().expect("results lock").iter() {
            if &stored.entry.school_id == school_id
                && stored.entry.period == period
                && !recorded_in.contains(&stored.class_id)
            {
                recorded_in.push(stored.class_id);
            }
        }

        let class = match recorded_in.as_slice() {
            [] => None,
            [class_id] => Some(self.class_results_locked(*class_id, period)?),
            _ => {
                return Err(StoreError::Conflict(format!(
                    "results of student {school_id} for {period} span {} classes",
                    recorded_in.len()
                )))
            }
        };
        Ok(TranscriptScope { profile, class })
    }
}

/// Store whose backend is always offline.
pub(super) struct UnavailableResults;

impl ResultStore for UnavailableResults {
    fn record_results(&self, _entries: &[ResultEntry]) -> Result<usize, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn class_results(
        &self,
        _class_id: ClassId,
        _period: ResultPeriod,
    ) -> Result<ClassResults, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn transcript_scope(
        &self,
        _school_id: &SchoolId,
        _period: ResultPeriod,
    ) -> Result<TranscriptScope, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

/// Renderer that keeps every record it was handed.
#[derive(Default)]
pub(super) struct RecordingRenderer {
    records: Mutex<Vec<TranscriptRecord>>,
}

impl RecordingRenderer {
    pub(super) fn records(&self) -> Vec<TranscriptRecord> {
        self.records.lock().expect("renderer lock").clone()
    }
}

impl TranscriptRenderer for RecordingRenderer {
    fn render(&self, record: &TranscriptRecord) -> Result<Vec<u8>, RenderError> {
        self.records
            .lock()
            .expect("renderer lock")
            .push(record.clone());
        Ok(format!("transcript:{}", record.get("school_id").unwrap_or_default()).into_bytes())
    }
}

pub(super) struct FailingRenderer;

impl TranscriptRenderer for FailingRenderer {
    fn render(&self, _record: &TranscriptRecord) -> Result<Vec<u8>, RenderError> {
        Err(RenderError::Backend("pdf engine crashed".to_string()))
    }
}

pub(super) fn service(
    store: Arc<MemoryResults>,
) -> ResultsService<MemoryResults, RecordingRenderer> {
    ResultsService::new(
        store,
        Arc::new(RecordingRenderer::default()),
        GradingPolicy::default(),
    )
}

/// Scores from the ranking walkthrough: A and B tie on 85, C trails on 75.
pub(super) fn seed_tied_class(store: &MemoryResults, period: ResultPeriod) {
    store
        .record_results(&[
            entry(1, "Mathematics", period, 90.0),
            entry(1, "English", period, 80.0),
            entry(2, "Mathematics", period, 80.0),
            entry(2, "English", period, 90.0),
            entry(3, "Mathematics", period, 70.0),
            entry(3, "English", period, 80.0),
        ])
        .expect("seed results");
}
