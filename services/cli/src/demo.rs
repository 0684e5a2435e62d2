use chrono::{Local, NaiveDate};
use clap::Args;
use registrar::config::StoreLocation;
use registrar::error::AppError;
use registrar::store::SchoolDirectory;
use registrar::workflows::enrollment::{
    EnrollmentYear, Gender, Role, StaffEnrollment, StudentEnrollment,
};
use registrar::workflows::results::{AcademicYear, ResultEntry, ResultPeriod, Term};

use crate::infra::{parse_date, Registry};
use crate::results::print_ranking;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Enrollment year used for the demo identifiers
    #[arg(long, default_value_t = 2024)]
    pub(crate) year: i64,
    /// Date printed on the demo transcript (defaults to today)
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Print the rendered transcript HTML as well as its summary
    #[arg(long)]
    pub(crate) show_html: bool,
}

const ROSTER: [(&str, Gender, [f64; 3]); 4] = [
    ("Ada Obi", Gender::Female, [90.0, 80.0, 85.0]),
    ("Bayo Musa", Gender::Male, [80.0, 90.0, 85.0]),
    ("Chika Eze", Gender::Female, [70.0, 80.0, 66.0]),
    ("Dayo Ade", Gender::Male, [42.0, 55.0, 0.0]),
];

const SUBJECTS: [&str; 3] = ["Mathematics", "English", "Basic Science"];

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        year,
        today,
        show_html,
    } = args;
    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let registry = Registry::open(Some(StoreLocation::Memory))?;
    let allocator = registry.allocator()?;
    let results = registry.results()?;
    let enrollment_year = EnrollmentYear::new(year).map_err(|err| AppError::Allocation(err.into()))?;

    println!("Registrar demo (in-memory database)");
    let jss2 = registry.store.create_class("JSS 2", None)?;
    let jss1 = registry.store.create_class("JSS 1", Some(jss2.id))?;
    for subject in SUBJECTS {
        registry.store.create_subject(subject)?;
    }
    println!("Classes: {} -> {}", jss1.name, jss2.name);
    println!("Subjects: {}", SUBJECTS.join(", "));

    println!(
        "\nNext staff identifier (preview): {}",
        allocator.peek_next(Role::Staff, year)?
    );
    let teacher = allocator.enroll_staff(StaffEnrollment {
        full_name: "Grace Okafor".to_string(),
        enrollment_year,
    })?;
    println!("Enrolled staff {}  {}", teacher.school_id, teacher.full_name);

    let session = AcademicYear::starting(enrollment_year.value())
        .map_err(|err| AppError::Allocation(err.into()))?;
    let period = ResultPeriod::new(Term::Third, session);

    let mut first_student = None;
    for (name, gender, scores) in ROSTER {
        let student = allocator.enroll_student(StudentEnrollment {
            full_name: name.to_string(),
            class_id: jss1.id,
            date_of_birth: NaiveDate::from_ymd_opt(2012, 4, 21).unwrap_or_default(),
            gender,
            enrollment_year,
        })?;
        println!("Enrolled student {}  {}", student.school_id, student.full_name);

        // A zero in the roster means no score was recorded for that subject.
        for (subject, score) in SUBJECTS.iter().zip(scores).filter(|(_, score)| *score > 0.0) {
            results.record_result(ResultEntry {
                school_id: student.school_id.clone(),
                subject: subject.to_string(),
                period,
                score,
                recorded_by: Some(teacher.school_id.clone()),
            })?;
        }
        first_student.get_or_insert(student.school_id);
    }

    println!("\nClass ranking");
    let snapshot = results.class_ranking(jss1.id, period)?;
    print_ranking(&snapshot);

    if let Some(school_id) = first_student {
        let transcript = results.transcript(&school_id, period, today)?;
        let record = &transcript.record;
        println!("\nTranscript for {}", school_id);
        for key in ["student_name", "class_name", "average", "position", "class_size", "remark"] {
            println!("  {key}: {}", record.get(key).unwrap_or("-"));
        }
        println!(
            "  promoted_to: {}",
            record.get("promoted_to").unwrap_or("not promoted")
        );
        println!("  rendered bytes: {}", transcript.bytes.len());
        if show_html {
            println!("\n{}", String::from_utf8_lossy(&transcript.bytes));
        }
    }

    println!("\nExport ({} columns)", snapshot.subjects.len() + 5);
    results.export_class(jss1.id, period, std::io::stdout().lock())?;
    Ok(())
}
