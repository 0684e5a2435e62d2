use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use super::domain::{ResultPeriod, StudentProfile};
use super::ranking::{RankedStudent, RankingSnapshot};

/// Flat key-value record handed to the rendering collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TranscriptRecord {
    fields: BTreeMap<String, String>,
}

impl TranscriptRecord {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }
}

/// Inputs of a transcript beyond the ranking itself.
#[derive(Debug, Clone)]
pub(crate) struct TranscriptContext<'a> {
    pub(crate) profile: &'a StudentProfile,
    pub(crate) class_name: &'a str,
    pub(crate) period: ResultPeriod,
    pub(crate) promoted_to: Option<&'a str>,
    pub(crate) school_logo_url: Option<&'a str>,
    pub(crate) generated_on: NaiveDate,
}

pub(crate) fn build_record(
    context: &TranscriptContext<'_>,
    entry: &RankedStudent,
    snapshot: &RankingSnapshot,
) -> TranscriptRecord {
    let mut record = TranscriptRecord::default();
    record.set("school_id", context.profile.school_id.as_str());
    record.set("student_name", context.profile.full_name.as_str());
    record.set("class_name", context.class_name);
    record.set("date_of_birth", context.profile.date_of_birth.to_string());
    record.set("gender", context.profile.gender.label());
    record.set("term", context.period.term.label());
    record.set("academic_year", context.period.academic_year.to_string());

    record.set("subject_count", entry.scores.len().to_string());
    for (index, (subject, score)) in entry.scores.iter().enumerate() {
        let position = index + 1;
        record.set(format!("result.{position:02}.subject"), subject.as_str());
        record.set(format!("result.{position:02}.score"), format_score(*score));
    }
    record.set("missing_subjects", entry.missing_subjects.join(", "));

    record.set("average", format!("{:.2}", entry.average));
    record.set("position", entry.rank.to_string());
    record.set("class_size", snapshot.class_size().to_string());
    record.set("remark", entry.remark.as_str());
    if let Some(target) = context.promoted_to {
        record.set("promoted_to", target);
    }
    if let Some(url) = context.school_logo_url {
        record.set("school_logo_url", url);
    }
    record.set("generated_on", context.generated_on.format("%Y-%m-%d").to_string());
    record
}

/// Whole numbers print without a fractional part.
pub(crate) fn format_score(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{score:.0}")
    } else {
        score.to_string()
    }
}

/// External document backend. Receives data only and returns opaque bytes.
pub trait TranscriptRenderer: Send + Sync {
    fn render(&self, record: &TranscriptRecord) -> Result<Vec<u8>, RenderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to load transcript template: {0}")]
    Io(#[from] std::io::Error),
    #[error("template placeholder '{0}' has no value")]
    UnknownPlaceholder(String),
    #[error("malformed template: {0}")]
    Template(String),
    #[error("renderer backend failed: {0}")]
    Backend(String),
}

/// Rendered transcript plus the ranking it was built from.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub bytes: Vec<u8>,
    pub record: TranscriptRecord,
    pub snapshot: RankingSnapshot,
}

/// HTML renderer with an optional `{{key}}` template.
#[derive(Debug, Clone, Default)]
pub struct HtmlTranscriptRenderer {
    template: Option<String>,
}

impl HtmlTranscriptRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(template: impl Into<String>) -> Self {
        Self {
            template: Some(template.into()),
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, RenderError> {
        let template = std::fs::read_to_string(path)?;
        Ok(Self::with_template(template))
    }
}

impl TranscriptRenderer for HtmlTranscriptRenderer {
    fn render(&self, record: &TranscriptRecord) -> Result<Vec<u8>, RenderError> {
        let html = match &self.template {
            Some(template) => fill_template(template, record)?,
            None => default_layout(record),
        };
        Ok(html.into_bytes())
    }
}

fn fill_template(template: &str, record: &TranscriptRecord) -> Result<String, RenderError> {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| RenderError::Template("unterminated '{{'".to_string()))?;
        let key = after[..end].trim();
        let value = record
            .get(key)
            .ok_or_else(|| RenderError::UnknownPlaceholder(key.to_string()))?;
        output.push_str(&escape_html(value));
        rest = &after[end + 2..];
    }

    output.push_str(rest);
    Ok(output)
}

fn default_layout(record: &TranscriptRecord) -> String {
    let field = |key: &str| escape_html(record.get(key).unwrap_or_default());
    let mut html = String::new();

    let _ = writeln!(html, "<!DOCTYPE html>");
    let _ = writeln!(html, "<html><head><meta charset=\"utf-8\">");
    let _ = writeln!(
        html,
        "<title>Result sheet - {} - {} {}</title></head><body>",
        field("student_name"),
        field("term"),
        field("academic_year")
    );
    if record.get("school_logo_url").is_some() {
        let _ = writeln!(
            html,
            "<img class=\"logo\" src=\"{}\" alt=\"School logo\">",
            field("school_logo_url")
        );
    }
    let _ = writeln!(html, "<h1>{} Result Sheet</h1>", field("term"));
    let _ = writeln!(html, "<table class=\"profile\">");
    for (label, key) in [
        ("Name", "student_name"),
        ("School ID", "school_id"),
        ("Class", "class_name"),
        ("Date of Birth", "date_of_birth"),
        ("Gender", "gender"),
        ("Session", "academic_year"),
    ] {
        let _ = writeln!(html, "<tr><th>{label}</th><td>{}</td></tr>", field(key));
    }
    let _ = writeln!(html, "</table>");

    let _ = writeln!(html, "<table class=\"results\">");
    let _ = writeln!(html, "<tr><th>Subject</th><th>Score</th></tr>");
    let count: usize = record
        .get("subject_count")
        .and_then(|value| value.parse().ok())
        .unwrap_or(0);
    for position in 1..=count {
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td></tr>",
            field(&format!("result.{position:02}.subject")),
            field(&format!("result.{position:02}.score"))
        );
    }
    let _ = writeln!(html, "</table>");

    let _ = writeln!(
        html,
        "<p>Average: {} | Position: {} of {} | Remark: {}</p>",
        field("average"),
        field("position"),
        field("class_size"),
        field("remark")
    );
    if record.get("promoted_to").is_some() {
        let _ = writeln!(html, "<p>Promoted to: {}</p>", field("promoted_to"));
    }
    let _ = writeln!(html, "<footer>Generated {}</footer>", field("generated_on"));
    let _ = writeln!(html, "</body></html>");
    html
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
