use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::{Args, Subcommand};
use registrar::error::AppError;
use registrar::workflows::enrollment::{ClassId, SchoolId};
use registrar::workflows::results::{
    read_export, AcademicYear, ExportError, RankingSnapshot, ResultEntry, ResultsError, Term,
};
use tracing::info;

use crate::infra::{parse_date, parse_session, parse_term, period, Registry};

#[derive(Args, Debug, Clone)]
pub(crate) struct PeriodArgs {
    /// first, second or third
    #[arg(long, value_parser = parse_term)]
    pub(crate) term: Term,
    /// Academic session such as 2024/2025
    #[arg(long, value_parser = parse_session)]
    pub(crate) session: AcademicYear,
}

#[derive(Subcommand, Debug)]
pub(crate) enum ResultsCommand {
    /// Record or replace one score
    Record {
        #[arg(long)]
        student: String,
        #[arg(long)]
        subject: String,
        #[arg(long, allow_negative_numbers = true)]
        score: f64,
        /// Staff identifier of the recording teacher
        #[arg(long)]
        staff: Option<String>,
        #[command(flatten)]
        period: PeriodArgs,
    },
    /// Record every row of a CSV upload, or none of them
    Import {
        /// CSV with school_id,subject,term,academic_year,score[,staff_id]
        path: PathBuf,
    },
    /// Print the class ranking
    Rank {
        #[arg(long)]
        class: i64,
        #[command(flatten)]
        period: PeriodArgs,
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write the class ranking as CSV
    Export {
        #[arg(long)]
        class: i64,
        #[command(flatten)]
        period: PeriodArgs,
        /// Output file (stdout when omitted)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Parse a previously exported CSV and print it as JSON
    ReadExport { path: PathBuf },
    /// Render one student's transcript
    Transcript {
        #[arg(long)]
        student: String,
        #[command(flatten)]
        period: PeriodArgs,
        /// Output file (stdout when omitted)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Date printed on the transcript (defaults to today)
        #[arg(long, value_parser = parse_date)]
        today: Option<NaiveDate>,
    },
}

pub(crate) fn run(registry: &Registry, command: ResultsCommand) -> Result<(), AppError> {
    let service = registry.results()?;

    match command {
        ResultsCommand::Record {
            student,
            subject,
            score,
            staff,
            period: scope,
        } => {
            service.record_result(ResultEntry {
                school_id: SchoolId(student),
                subject,
                period: period(scope.term, scope.session),
                score,
                recorded_by: staff.map(SchoolId),
            })?;
            println!("Recorded");
        }
        ResultsCommand::Import { path } => {
            let file = File::open(&path)?;
            let written = service.import_results(BufReader::new(file))?;
            println!("Recorded {written} results from {}", path.display());
        }
        ResultsCommand::Rank {
            class,
            period: scope,
            json,
        } => {
            let snapshot = service.class_ranking(ClassId(class), period(scope.term, scope.session))?;
            if json {
                print_json(&snapshot)?;
            } else {
                print_ranking(&snapshot);
            }
        }
        ResultsCommand::Export {
            class,
            period: scope,
            output,
        } => {
            let scope = period(scope.term, scope.session);
            match output {
                Some(path) => {
                    let snapshot = service.export_class(
                        ClassId(class),
                        scope,
                        BufWriter::new(File::create(&path)?),
                    )?;
                    info!(path = %path.display(), rows = snapshot.entries.len(), "export written");
                }
                None => {
                    service.export_class(ClassId(class), scope, io::stdout().lock())?;
                }
            }
        }
        ResultsCommand::ReadExport { path } => {
            let file = File::open(&path)?;
            let rows = read_export(BufReader::new(file))
                .map_err(|err| AppError::Results(ResultsError::Export(err)))?;
            print_json(&rows)?;
        }
        ResultsCommand::Transcript {
            student,
            period: scope,
            output,
            today,
        } => {
            let today = today.unwrap_or_else(|| Local::now().date_naive());
            let transcript = service.transcript(
                &SchoolId(student),
                period(scope.term, scope.session),
                today,
            )?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &transcript.bytes)?;
                    println!(
                        "Transcript written to {} (position {} of {})",
                        path.display(),
                        transcript.record.get("position").unwrap_or("-"),
                        transcript.snapshot.class_size()
                    );
                }
                None => io::stdout().lock().write_all(&transcript.bytes)?,
            }
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(value).map_err(|err| {
        AppError::Results(ResultsError::Export(ExportError::Io(io::Error::from(err))))
    })?;
    println!("{json}");
    Ok(())
}

pub(crate) fn print_ranking(snapshot: &RankingSnapshot) {
    println!(
        "{} - {} ({} students)",
        snapshot.class.name,
        snapshot.period,
        snapshot.class_size()
    );
    for entry in &snapshot.entries {
        let missing = match entry.missing_count() {
            0 => String::new(),
            count => format!(
                "  [missing {count}: {}]",
                entry.missing_subjects.join(", ")
            ),
        };
        println!(
            "{:>3}. {:<24} {:<28} {:>6.2}  {}{}",
            entry.rank,
            entry.school_id.as_str(),
            entry.student_name,
            entry.average,
            entry.remark,
            missing
        );
    }
}
