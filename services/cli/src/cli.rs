use crate::demo::{run_demo, DemoArgs};
use crate::infra::{database_location, Registry};
use crate::results::{self, ResultsCommand};
use crate::school::{self, ClassCommand, EnrollCommand, IdCommand, SubjectCommand};
use clap::{Parser, Subcommand};
use registrar::config::StoreLocation;
use registrar::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "registrar",
    about = "Allocate school identifiers, record results and produce class rankings and transcripts",
    version
)]
struct Cli {
    /// SQLite database file (or :memory:), overriding APP_DATABASE_PATH
    #[arg(long, global = true, value_parser = database_location)]
    database: Option<StoreLocation>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Preview or allocate standalone school identifiers
    Id {
        #[command(subcommand)]
        command: IdCommand,
    },
    /// Enroll a student or staff member, allocating their identifier
    Enroll {
        #[command(subcommand)]
        command: EnrollCommand,
    },
    /// Manage classes
    Class {
        #[command(subcommand)]
        command: ClassCommand,
    },
    /// Manage subjects
    Subject {
        #[command(subcommand)]
        command: SubjectCommand,
    },
    /// Record scores and produce rankings, exports and transcripts
    Results {
        #[command(subcommand)]
        command: ResultsCommand,
    },
    /// Run an end-to-end demo against a throwaway in-memory database
    Demo(DemoArgs),
}

pub(crate) fn run() -> Result<(), AppError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Demo(args) => run_demo(args),
        Command::Id { command } => school::run_id(&Registry::open(cli.database)?, command),
        Command::Enroll { command } => {
            school::run_enroll(&Registry::open(cli.database)?, command)
        }
        Command::Class { command } => school::run_class(&Registry::open(cli.database)?, command),
        Command::Subject { command } => {
            school::run_subject(&Registry::open(cli.database)?, command)
        }
        Command::Results { command } => results::run(&Registry::open(cli.database)?, command),
    }
}
