use chrono::NaiveDate;
use clap::{Args, Subcommand};
use registrar::error::AppError;
use registrar::store::SchoolDirectory;
use registrar::workflows::enrollment::{
    ClassId, EnrollmentYear, Gender, Role, SchoolId, StaffEnrollment, StudentEnrollment,
};
use registrar::workflows::InputError;

use crate::infra::{parse_date, parse_gender, parse_role, Registry};

#[derive(Subcommand, Debug)]
pub(crate) enum IdCommand {
    /// Show the identifier the next allocation would issue, without consuming it
    Peek(IdArgs),
    /// Consume and print the next identifier
    Allocate(IdArgs),
}

#[derive(Args, Debug)]
pub(crate) struct IdArgs {
    /// student or staff
    #[arg(long, value_parser = parse_role)]
    pub(crate) role: Role,
    /// Four-digit enrollment year
    #[arg(long, allow_negative_numbers = true)]
    pub(crate) year: i64,
}

#[derive(Subcommand, Debug)]
pub(crate) enum EnrollCommand {
    Student(StudentArgs),
    Staff(StaffArgs),
}

#[derive(Args, Debug)]
pub(crate) struct StudentArgs {
    #[arg(long)]
    pub(crate) name: String,
    /// Class row id (see `class list`)
    #[arg(long)]
    pub(crate) class: i64,
    /// Date of birth (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) dob: NaiveDate,
    #[arg(long, value_parser = parse_gender)]
    pub(crate) gender: Gender,
    #[arg(long)]
    pub(crate) year: i64,
}

#[derive(Args, Debug)]
pub(crate) struct StaffArgs {
    #[arg(long)]
    pub(crate) name: String,
    #[arg(long)]
    pub(crate) year: i64,
}

#[derive(Subcommand, Debug)]
pub(crate) enum ClassCommand {
    Create {
        #[arg(long)]
        name: String,
        /// Class id students move to after a passing third term
        #[arg(long)]
        promotes_to: Option<i64>,
    },
    List,
    /// Move a student to another class
    Assign {
        /// Student school identifier
        #[arg(long)]
        student: String,
        #[arg(long)]
        class: i64,
    },
}

#[derive(Subcommand, Debug)]
pub(crate) enum SubjectCommand {
    Create {
        #[arg(long)]
        name: String,
    },
    List,
}

pub(crate) fn run_id(registry: &Registry, command: IdCommand) -> Result<(), AppError> {
    let allocator = registry.allocator()?;
    match command {
        IdCommand::Peek(args) => {
            let next = allocator.peek_next(args.role, args.year)?;
            println!("{next} (preview only, not reserved)");
        }
        IdCommand::Allocate(args) => {
            let issued = allocator.allocate(args.role, args.year)?;
            println!("{issued}");
        }
    }
    Ok(())
}

pub(crate) fn run_enroll(registry: &Registry, command: EnrollCommand) -> Result<(), AppError> {
    let allocator = registry.allocator()?;
    match command {
        EnrollCommand::Student(args) => {
            let student = allocator.enroll_student(StudentEnrollment {
                full_name: args.name,
                class_id: ClassId(args.class),
                date_of_birth: args.dob,
                gender: args.gender,
                enrollment_year: enrollment_year(args.year)?,
            })?;
            println!("{}  {}", student.school_id, student.full_name);
        }
        EnrollCommand::Staff(args) => {
            let staff = allocator.enroll_staff(StaffEnrollment {
                full_name: args.name,
                enrollment_year: enrollment_year(args.year)?,
            })?;
            println!("{}  {}", staff.school_id, staff.full_name);
        }
    }
    Ok(())
}

fn enrollment_year(year: i64) -> Result<EnrollmentYear, AppError> {
    EnrollmentYear::new(year).map_err(|err: InputError| AppError::Allocation(err.into()))
}

pub(crate) fn run_class(registry: &Registry, command: ClassCommand) -> Result<(), AppError> {
    match command {
        ClassCommand::Create { name, promotes_to } => {
            let class = registry
                .store
                .create_class(&name, promotes_to.map(ClassId))?;
            println!("{}  {}", class.id, class.name);
        }
        ClassCommand::List => {
            let classes = registry.store.classes()?;
            if classes.is_empty() {
                println!("No classes defined");
            }
            for class in classes {
                match class.promotes_to {
                    Some(next) => println!("{:>4}  {} (promotes to {next})", class.id, class.name),
                    None => println!("{:>4}  {}", class.id, class.name),
                }
            }
        }
        ClassCommand::Assign { student, class } => {
            let school_id = SchoolId(student.trim().to_string());
            registry.store.assign_class(&school_id, ClassId(class))?;
            println!("{school_id} moved to class {class}");
        }
    }
    Ok(())
}

pub(crate) fn run_subject(registry: &Registry, command: SubjectCommand) -> Result<(), AppError> {
    match command {
        SubjectCommand::Create { name } => {
            let subject = registry.store.create_subject(&name)?;
            println!("{}  {}", subject.id.0, subject.name);
        }
        SubjectCommand::List => {
            for subject in registry.store.subjects()? {
                println!("{:>4}  {}", subject.id.0, subject.name);
            }
        }
    }
    Ok(())
}
