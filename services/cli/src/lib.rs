mod cli;
mod demo;
mod infra;
mod results;
mod school;

use registrar::error::AppError;

pub fn run() -> Result<(), AppError> {
    cli::run()
}
