//! Integration specifications for ranking, transcripts and exports.
//!
//! Every scenario enrolls real students through the allocator and records
//! scores through the results service so ranking runs over what the SQLite
//! store actually returns.

mod common {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use registrar::store::{SchoolDirectory, SqliteStore};
    use registrar::workflows::enrollment::{
        ClassId, EnrollmentYear, Gender, IdentifierFormat, SchoolId, SequenceAllocator,
        StaffEnrollment, StudentEnrollment,
    };
    use registrar::workflows::results::{
        AcademicYear, GradingPolicy, HtmlTranscriptRenderer, ResultEntry, ResultPeriod,
        ResultsService, Term,
    };

    pub(super) struct School {
        pub(super) store: Arc<SqliteStore>,
        pub(super) allocator: SequenceAllocator<SqliteStore>,
        pub(super) jss1: ClassId,
        pub(super) jss2: ClassId,
        pub(super) teacher: SchoolId,
    }

    impl School {
        pub(super) fn open() -> Self {
            let store = Arc::new(SqliteStore::open_in_memory().expect("store opens"));
            let jss2 = store.create_class("JSS 2", None).expect("class").id;
            let jss1 = store.create_class("JSS 1", Some(jss2)).expect("class").id;
            for subject in ["Mathematics", "English", "Basic Science"] {
                store.create_subject(subject).expect("subject");
            }

            let allocator = SequenceAllocator::new(
                store.clone(),
                IdentifierFormat::new("Kristobell").expect("prefix"),
            );
            let teacher = allocator
                .enroll_staff(StaffEnrollment {
                    full_name: "Grace Okafor".to_string(),
                    enrollment_year: EnrollmentYear::new(2020).expect("year"),
                })
                .expect("staff enrolled")
                .school_id;

            Self {
                store,
                allocator,
                jss1,
                jss2,
                teacher,
            }
        }

        pub(super) fn enroll(&self, name: &str, class_id: ClassId) -> SchoolId {
            self.allocator
                .enroll_student(StudentEnrollment {
                    full_name: name.to_string(),
                    class_id,
                    date_of_birth: NaiveDate::from_ymd_opt(2011, 9, 30).expect("date"),
                    gender: Gender::Female,
                    enrollment_year: EnrollmentYear::new(2024).expect("year"),
                })
                .expect("student enrolled")
                .school_id
        }

        pub(super) fn service(
            &self,
            grading: GradingPolicy,
        ) -> ResultsService<SqliteStore, HtmlTranscriptRenderer> {
            ResultsService::new(
                self.store.clone(),
                Arc::new(HtmlTranscriptRenderer::new()),
                grading,
            )
        }

        pub(super) fn entry(
            &self,
            student: &SchoolId,
            subject: &str,
            period: ResultPeriod,
            score: f64,
        ) -> ResultEntry {
            ResultEntry {
                school_id: student.clone(),
                subject: subject.to_string(),
                period,
                score,
                recorded_by: Some(self.teacher.clone()),
            }
        }
    }

    pub(super) fn period(term: Term) -> ResultPeriod {
        ResultPeriod::new(term, AcademicYear::starting(2024).expect("session"))
    }

    pub(super) fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 18).expect("date")
    }
}

use std::io::Cursor;

use common::*;
use registrar::store::SchoolDirectory;
use registrar::workflows::enrollment::ClassId;
use registrar::workflows::results::{
    read_export, AggregationPolicy, GradingPolicy, ResultsError, ScoreRange, Term,
};
use registrar::workflows::InputError;

#[test]
fn tied_averages_share_a_rank_and_skip_the_next() {
    let school = School::open();
    let a = school.enroll("Ada Obi", school.jss1);
    let b = school.enroll("Bayo Musa", school.jss1);
    let c = school.enroll("Chika Eze", school.jss1);
    let service = school.service(GradingPolicy::default());
    let first = period(Term::First);

    for (student, maths, english) in [(&a, 90.0, 90.0), (&b, 90.0, 90.0), (&c, 70.0, 70.0)] {
        service
            .record_result(school.entry(student, "Mathematics", first, maths))
            .expect("recorded");
        service
            .record_result(school.entry(student, "English", first, english))
            .expect("recorded");
    }

    let snapshot = service
        .class_ranking(school.jss1, first)
        .expect("ranking computes");
    let summary: Vec<(&str, f64, u32)> = snapshot
        .entries
        .iter()
        .map(|entry| (entry.school_id.as_str(), entry.average, entry.rank))
        .collect();
    assert_eq!(
        summary,
        vec![
            (a.as_str(), 90.0, 1),
            (b.as_str(), 90.0, 1),
            (c.as_str(), 70.0, 3),
        ]
    );
}

#[test]
fn single_subject_student_averages_that_subject() {
    let school = School::open();
    let ada = school.enroll("Ada Obi", school.jss1);
    let service = school.service(GradingPolicy::default());
    let first = period(Term::First);

    service
        .record_result(school.entry(&ada, "mathematics", first, 80.0))
        .expect("recorded");

    let snapshot = service
        .class_ranking(school.jss1, first)
        .expect("ranking computes");
    assert_eq!(snapshot.subjects, vec!["Mathematics"]);
    assert_eq!(snapshot.entries[0].average, 80.0);
    assert_eq!(snapshot.entries[0].rank, 1);
}

#[test]
fn transcripts_need_results_for_the_period() {
    let school = School::open();
    let ada = school.enroll("Ada Obi", school.jss1);
    let service = school.service(GradingPolicy::default());

    assert!(matches!(
        service.transcript(&ada, period(Term::Second), today()),
        Err(ResultsError::NoResults(_))
    ));
    assert!(matches!(
        service.class_ranking(school.jss2, period(Term::Second)),
        Err(ResultsError::NoResults(_))
    ));
    assert!(matches!(
        service.class_ranking(ClassId(999), period(Term::Second)),
        Err(ResultsError::NotFound(_))
    ));
}

#[test]
fn third_term_transcript_renders_html_with_promotion() {
    let school = School::open();
    let ada = school.enroll("Ada Obi", school.jss1);
    let bayo = school.enroll("Bayo Musa", school.jss1);
    let service = school
        .service(GradingPolicy::default())
        .with_school_logo_url("https://kristobell.example/logo.png");
    let third = period(Term::Third);

    service
        .record_result(school.entry(&ada, "Mathematics", third, 72.5))
        .expect("recorded");
    service
        .record_result(school.entry(&bayo, "Mathematics", third, 91.0))
        .expect("recorded");

    let transcript = service
        .transcript(&ada, third, today())
        .expect("transcript renders");
    let html = String::from_utf8(transcript.bytes).expect("utf8 html");

    assert_eq!(transcript.record.get("position"), Some("2"));
    assert_eq!(transcript.record.get("class_size"), Some("2"));
    assert_eq!(transcript.record.get("promoted_to"), Some("JSS 2"));
    assert!(html.contains("Ada Obi"));
    assert!(html.contains("72.50"));
    assert!(html.contains("https://kristobell.example/logo.png"));
}

#[test]
fn export_reads_back_to_the_same_ranking() {
    let school = School::open();
    let ada = school.enroll("Ada Obi", school.jss1);
    let bayo = school.enroll("Bayo Musa", school.jss1);
    let service = school.service(GradingPolicy::default());
    let first = period(Term::First);

    let upload = format!(
        "school_id,subject,term,academic_year,score,staff_id\n\
{ada},Mathematics,first,2024/2025,66.5,{teacher}\n\
{ada},English,first,2024/2025,70,{teacher}\n\
{bayo},Mathematics,first,2024/2025,49,\n",
        teacher = school.teacher
    );
    assert_eq!(
        service.import_results(Cursor::new(upload)).expect("imports"),
        3
    );

    let mut buffer = Vec::new();
    let snapshot = service
        .export_class(school.jss1, first, &mut buffer)
        .expect("exports");
    let rows = read_export(Cursor::new(buffer)).expect("reads back");

    assert_eq!(rows.len(), snapshot.entries.len());
    for (row, entry) in rows.iter().zip(&snapshot.entries) {
        assert_eq!(row.school_id, entry.school_id);
        assert_eq!(row.name, entry.student_name);
        assert_eq!(row.average, entry.average);
        assert_eq!(row.rank, entry.rank);
        assert_eq!(row.remark, entry.remark);
    }
    let bayo_row = rows
        .iter()
        .find(|row| row.school_id == bayo)
        .expect("Bayo exported");
    assert_eq!(bayo_row.scores.get("English"), Some(&None));
    assert_eq!(bayo_row.remark, "Needs Improvement");
}

#[test]
fn strict_grading_refuses_incomplete_classes() {
    let school = School::open();
    let ada = school.enroll("Ada Obi", school.jss1);
    let bayo = school.enroll("Bayo Musa", school.jss1);
    let first = period(Term::First);
    let grading = GradingPolicy {
        aggregation: AggregationPolicy::Strict,
        ..GradingPolicy::default()
    };
    let service = school.service(grading);

    service
        .record_result(school.entry(&ada, "Mathematics", first, 60.0))
        .expect("recorded");
    service
        .record_result(school.entry(&ada, "English", first, 60.0))
        .expect("recorded");
    service
        .record_result(school.entry(&bayo, "English", first, 60.0))
        .expect("recorded");

    match service.class_ranking(school.jss1, first) {
        Err(ResultsError::IncompleteResults {
            school_id,
            missing_subjects,
        }) => {
            assert_eq!(school_id, bayo);
            assert_eq!(missing_subjects, vec!["Mathematics"]);
        }
        other => panic!("expected incomplete results, got {other:?}"),
    }
}

#[test]
fn custom_score_range_is_enforced_before_storage() {
    let school = School::open();
    let ada = school.enroll("Ada Obi", school.jss1);
    let grading = GradingPolicy {
        score_range: ScoreRange::new(0.0, 60.0).expect("range"),
        ..GradingPolicy::default()
    };
    let service = school.service(grading);
    let first = period(Term::First);

    assert!(matches!(
        service.record_result(school.entry(&ada, "Mathematics", first, 75.0)),
        Err(ResultsError::InvalidInput(InputError::ScoreOutOfRange { .. }))
    ));
    assert!(matches!(
        service.record_result(school.entry(&ada, "Chemistry", first, 50.0)),
        Err(ResultsError::NotFound(_))
    ));
    assert!(matches!(
        service.class_ranking(school.jss1, first),
        Err(ResultsError::NoResults(_))
    ));
}

#[test]
fn recording_twice_keeps_the_latest_score() {
    let school = School::open();
    let ada = school.enroll("Ada Obi", school.jss1);
    let service = school.service(GradingPolicy::default());
    let first = period(Term::First);

    service
        .record_result(school.entry(&ada, "English", first, 45.0))
        .expect("recorded");
    service
        .record_result(school.entry(&ada, "English", first, 58.0))
        .expect("recorded");

    let snapshot = service
        .class_ranking(school.jss1, first)
        .expect("ranking computes");
    assert_eq!(snapshot.entries.len(), 1);
    assert_eq!(snapshot.entries[0].average, 58.0);
    assert_eq!(
        school.store.classes().expect("classes").len(),
        2,
        "setup classes are untouched"
    );
}

#[test]
fn moving_class_and_re_recording_keeps_the_period_together() {
    let school = School::open();
    let ada = school.enroll("Ada Obi", school.jss1);
    let bayo = school.enroll("Bayo Musa", school.jss1);
    let service = school.service(GradingPolicy::default());
    let first = period(Term::First);

    for (subject, score) in [("Mathematics", 80.0), ("English", 70.0)] {
        service
            .record_result(school.entry(&ada, subject, first, score))
            .expect("recorded");
    }
    service
        .record_result(school.entry(&bayo, "Mathematics", first, 60.0))
        .expect("recorded");

    school.store.assign_class(&ada, school.jss2).expect("moved");
    service
        .record_result(school.entry(&ada, "Mathematics", first, 80.0))
        .expect("re-recorded");

    let transcript = service
        .transcript(&ada, first, today())
        .expect("transcript renders");
    assert_eq!(transcript.record.get("class_name"), Some("JSS 2"));
    assert_eq!(transcript.record.get("subject_count"), Some("2"));
    assert_eq!(transcript.record.get("average"), Some("75.00"));
    assert_eq!(transcript.record.get("class_size"), Some("1"));

    let jss1 = service.class_ranking(school.jss1, first).expect("ranking");
    assert_eq!(jss1.class_size(), 1);
    assert!(jss1.entry_for(&ada).is_none());
    let jss2 = service.class_ranking(school.jss2, first).expect("ranking");
    assert_eq!(jss2.entry_for(&ada).map(|entry| entry.average), Some(75.0));
}
