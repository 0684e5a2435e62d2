use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use registrar::config::{AppConfig, StoreLocation};
use registrar::error::AppError;
use registrar::store::SqliteStore;
use registrar::telemetry;
use registrar::workflows::enrollment::{
    AllocationError, Gender, IdentifierFormat, Role, SequenceAllocator,
};
use registrar::workflows::results::{
    AcademicYear, HtmlTranscriptRenderer, ResultPeriod, ResultsService, Term,
};
use tracing::info;

/// Loaded configuration plus the store every command works against.
pub(crate) struct Registry {
    pub(crate) config: AppConfig,
    pub(crate) store: Arc<SqliteStore>,
}

impl Registry {
    /// Load configuration, install tracing and open the store. `location`
    /// overrides `APP_DATABASE_PATH`.
    pub(crate) fn open(location: Option<StoreLocation>) -> Result<Self, AppError> {
        let mut config = AppConfig::load()?;
        if let Some(location) = location {
            config.store.location = location;
        }

        telemetry::init(&config.telemetry)?;

        let store = Arc::new(SqliteStore::open(&config.store)?);
        info!(
            environment = ?config.environment,
            location = ?config.store.location,
            "registrar store ready"
        );
        Ok(Self { config, store })
    }

    pub(crate) fn allocator(&self) -> Result<SequenceAllocator<SqliteStore>, AppError> {
        let format = IdentifierFormat::new(self.config.school.org_prefix.as_str())
            .map_err(AllocationError::from)?;
        Ok(SequenceAllocator::new(self.store.clone(), format))
    }

    pub(crate) fn results(
        &self,
    ) -> Result<ResultsService<SqliteStore, HtmlTranscriptRenderer>, AppError> {
        let renderer = match &self.config.transcript.template_path {
            Some(path) => HtmlTranscriptRenderer::from_path(path)?,
            None => HtmlTranscriptRenderer::new(),
        };

        let service = ResultsService::new(
            self.store.clone(),
            Arc::new(renderer),
            self.config.grading.clone(),
        );
        Ok(match &self.config.school.logo_url {
            Some(url) => service.with_school_logo_url(url.clone()),
            None => service,
        })
    }
}

pub(crate) fn database_location(raw: &str) -> Result<StoreLocation, String> {
    match raw.trim() {
        "" => Err("database path must not be empty".to_string()),
        ":memory:" => Ok(StoreLocation::Memory),
        path => Ok(StoreLocation::File(PathBuf::from(path))),
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_role(raw: &str) -> Result<Role, String> {
    raw.parse().map_err(|err| format!("{err}"))
}

pub(crate) fn parse_gender(raw: &str) -> Result<Gender, String> {
    raw.parse().map_err(|err| format!("{err}"))
}

pub(crate) fn parse_term(raw: &str) -> Result<Term, String> {
    raw.parse().map_err(|err| format!("{err}"))
}

pub(crate) fn parse_session(raw: &str) -> Result<AcademicYear, String> {
    raw.parse().map_err(|err| format!("{err}"))
}

pub(crate) fn period(term: Term, session: AcademicYear) -> ResultPeriod {
    ResultPeriod::new(term, session)
}
