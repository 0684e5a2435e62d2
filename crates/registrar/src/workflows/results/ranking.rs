use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::domain::{ClassInfo, ResultPeriod, ResultRecord};
use super::grading::{AggregationPolicy, RemarkBands};
use crate::workflows::enrollment::SchoolId;

/// Per-student aggregate before ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentAverage {
    pub school_id: SchoolId,
    pub student_name: String,
    pub scores: BTreeMap<String, f64>,
    pub average: f64,
    pub missing_subjects: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedStudent {
    pub school_id: SchoolId,
    pub student_name: String,
    pub scores: BTreeMap<String, f64>,
    pub average: f64,
    pub rank: u32,
    pub remark: String,
    pub missing_subjects: Vec<String>,
}

impl RankedStudent {
    pub fn missing_count(&self) -> usize {
        self.missing_subjects.len()
    }
}

/// Ordered ranking of one class for one period. Computed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingSnapshot {
    pub class: ClassInfo,
    pub period: ResultPeriod,
    pub subjects: Vec<String>,
    pub entries: Vec<RankedStudent>,
}

impl RankingSnapshot {
    pub fn class_size(&self) -> usize {
        self.entries.len()
    }

    pub fn entry_for(&self, school_id: &SchoolId) -> Option<&RankedStudent> {
        self.entries
            .iter()
            .find(|entry| &entry.school_id == school_id)
    }

    /// Students averaged over fewer subjects than the class offers.
    pub fn incomplete_entries(&self) -> impl Iterator<Item = &RankedStudent> {
        self.entries
            .iter()
            .filter(|entry| !entry.missing_subjects.is_empty())
    }
}

/// Aggregation failed under [`AggregationPolicy::Strict`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncompleteResults {
    pub school_id: SchoolId,
    pub missing_subjects: Vec<String>,
}

/// Rounds to two decimal places so ranks agree with displayed averages.
pub fn round_average(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Average every student over the subjects they have records for.
///
/// The class subject list is every subject that appears in `records`. Returns
/// the sorted subject list and one aggregate per student, ordered by school
/// identifier.
pub fn aggregate(
    records: &[ResultRecord],
    policy: AggregationPolicy,
) -> Result<(Vec<String>, Vec<StudentAverage>), IncompleteResults> {
    let subjects: BTreeSet<&str> = records
        .iter()
        .map(|record| record.subject.as_str())
        .collect();

    let mut by_student: BTreeMap<&SchoolId, (&str, BTreeMap<String, f64>)> = BTreeMap::new();
    for record in records {
        let (_, scores) = by_student
            .entry(&record.school_id)
            .or_insert_with(|| (record.student_name.as_str(), BTreeMap::new()));
        scores.insert(record.subject.clone(), record.score);
    }

    let mut averages = Vec::with_capacity(by_student.len());
    for (school_id, (student_name, scores)) in by_student {
        let missing_subjects: Vec<String> = subjects
            .iter()
            .filter(|subject| !scores.contains_key(**subject))
            .map(|subject| subject.to_string())
            .collect();

        if policy == AggregationPolicy::Strict && !missing_subjects.is_empty() {
            return Err(IncompleteResults {
                school_id: school_id.clone(),
                missing_subjects,
            });
        }

        let total: f64 = scores.values().sum();
        let average = round_average(total / scores.len() as f64);

        averages.push(StudentAverage {
            school_id: school_id.clone(),
            student_name: student_name.to_string(),
            scores,
            average,
            missing_subjects,
        });
    }

    let subjects = subjects.into_iter().map(str::to_string).collect();
    Ok((subjects, averages))
}

/// Standard competition ranks for values already sorted in descending order:
/// `[90, 90, 80]` ranks `[1, 1, 3]`.
pub fn competition_ranks(sorted_desc: &[f64]) -> Vec<u32> {
    let mut ranks = Vec::with_capacity(sorted_desc.len());
    for (index, value) in sorted_desc.iter().enumerate() {
        let rank = match index {
            0 => 1,
            _ if sorted_desc[index - 1] == *value => ranks[index - 1],
            _ => index as u32 + 1,
        };
        ranks.push(rank);
    }
    ranks
}

/// Sort descending by average (ties by school identifier) and assign ranks
/// and remarks.
pub fn rank(mut averages: Vec<StudentAverage>, bands: &RemarkBands) -> Vec<RankedStudent> {
    averages.sort_by(|left, right| {
        right
            .average
            .total_cmp(&left.average)
            .then_with(|| left.school_id.cmp(&right.school_id))
    });

    let sorted: Vec<f64> = averages.iter().map(|entry| entry.average).collect();
    let ranks = competition_ranks(&sorted);

    averages
        .into_iter()
        .zip(ranks)
        .map(|(entry, rank)| RankedStudent {
            remark: bands.remark_for(entry.average).to_string(),
            school_id: entry.school_id,
            student_name: entry.student_name,
            scores: entry.scores,
            average: entry.average,
            rank,
            missing_subjects: entry.missing_subjects,
        })
        .collect()
}
