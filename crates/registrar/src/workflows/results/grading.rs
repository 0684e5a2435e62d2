use serde::{Deserialize, Serialize};

use crate::workflows::InputError;

/// Inclusive range of scores staff may record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreRange {
    min: f64,
    max: f64,
}

impl ScoreRange {
    pub fn new(min: f64, max: f64) -> Result<Self, GradingError> {
        if !min.is_finite() || !max.is_finite() || min >= max {
            return Err(GradingError::InvalidRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub const fn min(&self) -> f64 {
        self.min
    }

    pub const fn max(&self) -> f64 {
        self.max
    }

    pub fn validate(&self, score: f64) -> Result<f64, InputError> {
        if score.is_finite() && score >= self.min && score <= self.max {
            Ok(score)
        } else {
            Err(InputError::ScoreOutOfRange {
                score,
                min: self.min,
                max: self.max,
            })
        }
    }
}

impl Default for ScoreRange {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemarkBand {
    pub min_average: f64,
    pub remark: String,
}

/// Average-to-remark table, highest threshold first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemarkBands {
    bands: Vec<RemarkBand>,
}

impl RemarkBands {
    pub fn new(mut bands: Vec<RemarkBand>) -> Result<Self, GradingError> {
        if bands.is_empty() {
            return Err(GradingError::EmptyBands);
        }

        for band in &bands {
            if !band.min_average.is_finite() {
                return Err(GradingError::InvalidBand(band.min_average.to_string()));
            }
            if band.remark.trim().is_empty() {
                return Err(GradingError::InvalidBand(format!(
                    "{}:<empty>",
                    band.min_average
                )));
            }
        }

        bands.sort_by(|left, right| right.min_average.total_cmp(&left.min_average));
        if let Some(pair) = bands
            .windows(2)
            .find(|pair| pair[0].min_average == pair[1].min_average)
        {
            return Err(GradingError::DuplicateThreshold(pair[0].min_average));
        }

        Ok(Self { bands })
    }

    /// Parses `70:Excellent,50:Good,0:Needs Improvement`.
    pub fn parse(raw: &str) -> Result<Self, GradingError> {
        let bands = raw
            .split(',')
            .filter(|entry| !entry.trim().is_empty())
            .map(|entry| {
                let (threshold, remark) = entry
                    .split_once(':')
                    .ok_or_else(|| GradingError::InvalidBand(entry.trim().to_string()))?;
                let min_average = threshold
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| GradingError::InvalidBand(entry.trim().to_string()))?;
                Ok(RemarkBand {
                    min_average,
                    remark: remark.trim().to_string(),
                })
            })
            .collect::<Result<Vec<_>, GradingError>>()?;

        Self::new(bands)
    }

    pub fn bands(&self) -> &[RemarkBand] {
        &self.bands
    }

    /// Averages below every threshold take the lowest band's remark.
    pub fn remark_for(&self, average: f64) -> &str {
        self.bands
            .iter()
            .find(|band| average >= band.min_average)
            .or_else(|| self.bands.last())
            .map(|band| band.remark.as_str())
            .unwrap_or_default()
    }
}

impl Default for RemarkBands {
    fn default() -> Self {
        Self {
            bands: vec![
                RemarkBand {
                    min_average: 70.0,
                    remark: "Excellent".to_string(),
                },
                RemarkBand {
                    min_average: 50.0,
                    remark: "Good".to_string(),
                },
                RemarkBand {
                    min_average: 0.0,
                    remark: "Needs Improvement".to_string(),
                },
            ],
        }
    }
}

/// How averages treat students without a record for every class subject.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPolicy {
    /// Average over recorded subjects; missing subjects are reported as data.
    #[default]
    Lenient,
    /// Any missing subject fails the ranking.
    Strict,
}

impl AggregationPolicy {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Lenient => "lenient",
            Self::Strict => "strict",
        }
    }
}

/// Grading settings handed to the results service at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingPolicy {
    pub score_range: ScoreRange,
    pub remark_bands: RemarkBands,
    pub aggregation: AggregationPolicy,
    pub pass_mark: f64,
}

impl Default for GradingPolicy {
    fn default() -> Self {
        Self {
            score_range: ScoreRange::default(),
            remark_bands: RemarkBands::default(),
            aggregation: AggregationPolicy::Lenient,
            pass_mark: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GradingError {
    #[error("remark table must contain at least one band")]
    EmptyBands,
    #[error("invalid remark band '{0}' (expected <min average>:<remark>)")]
    InvalidBand(String),
    #[error("remark threshold {0} appears more than once")]
    DuplicateThreshold(f64),
    #[error("invalid score range {min}..={max}")]
    InvalidRange { min: f64, max: f64 },
}
