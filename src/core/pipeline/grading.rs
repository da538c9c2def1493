use std::collections::HashMap;

use itertools::Itertools;
use serde::Deserialize;

use crate::core::{
    domain::{JudgeResult, SubgradeWeight, TestCase, Verdict},
    errors::DataError,
};

const WEIGHT_EPSILON: f64 = 1e-6;

/// What to do when test case weights do not add up to 100%.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightPolicy {
    /// Award each weight as written, clamp the sum to the maximum grade.
    #[default]
    AsIs,
    /// Rescale weights proportionally so that they add up to 100%.
    Normalize,
    /// Refuse test case sets that do not add up to 100%.
    Reject,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CaseScore {
    pub index: u32,
    pub weight: SubgradeWeight,
    /// `None` when the judge never produced a result for the case.
    pub verdict: Option<Verdict>,
    pub awarded: f64,
    pub feedback: String,
}

impl CaseScore {
    pub fn passed(&self) -> bool {
        self.verdict.is_some_and(|verdict| verdict.is_accepted())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GradeBreakdown {
    pub grade: f64,
    pub max_grade: f64,
    pub cases: Vec<CaseScore>,
}

impl GradeBreakdown {
    pub fn fraction(&self) -> f64 {
        if self.max_grade > 0.0 {
            self.grade / self.max_grade
        } else {
            0.0
        }
    }

    /// Feedback of the failed test cases, one per line.
    pub fn feedback(&self) -> Option<String> {
        let feedback = self
            .cases
            .iter()
            .filter(|case| !case.passed() && !case.feedback.trim().is_empty())
            .map(|case| case.feedback.trim())
            .join("\n");
        (!feedback.is_empty()).then_some(feedback)
    }
}

/// Sum of the weights in percent, checked against `policy`.
pub fn validate_weights(test_cases: &[TestCase], policy: WeightPolicy) -> Result<f64, DataError> {
    for test_case in test_cases {
        SubgradeWeight::percent(test_case.weight.as_percent())?;
    }
    if let Some(index) = test_cases.iter().map(|test_case| test_case.index).duplicates().next() {
        return Err(DataError::DuplicateTestCase { index });
    }

    let total: f64 = test_cases
        .iter()
        .map(|test_case| test_case.weight.as_percent())
        .sum();
    if policy == WeightPolicy::Reject && (total - 100.0).abs() > WEIGHT_EPSILON {
        return Err(DataError::WeightsDoNotSum { total });
    }
    Ok(total)
}

/// Computes the grade of one submission.
///
/// An accepted test case awards its weight of `max_grade`, anything else
/// awards nothing. Test cases without a result count as not accepted.
pub fn aggregate(
    test_cases: &[TestCase],
    results: &[JudgeResult],
    max_grade: f64,
    policy: WeightPolicy,
) -> Result<GradeBreakdown, DataError> {
    if !max_grade.is_finite() || max_grade < 0.0 {
        return Err(DataError::InvalidMaxGrade { value: max_grade });
    }
    let total = validate_weights(test_cases, policy)?;

    let verdicts: HashMap<u32, Verdict> = results
        .iter()
        .map(|result| (result.test_case_index, result.verdict))
        .collect();

    let cases = test_cases
        .iter()
        .sorted_by_key(|test_case| test_case.index)
        .map(|test_case| {
            let verdict = verdicts.get(&test_case.index).copied();
            let share = match policy {
                WeightPolicy::Normalize if total > WEIGHT_EPSILON => {
                    test_case.weight.as_percent() / total
                }
                _ => test_case.weight.as_fraction(),
            };
            let awarded = if verdict.is_some_and(|verdict| verdict.is_accepted()) {
                share * max_grade
            } else {
                0.0
            };

            CaseScore {
                index: test_case.index,
                weight: test_case.weight,
                verdict,
                awarded,
                feedback: test_case.feedback.clone(),
            }
        })
        .collect_vec();

    let grade = cases
        .iter()
        .map(|case| case.awarded)
        .sum::<f64>()
        .clamp(0.0, max_grade);

    Ok(GradeBreakdown {
        grade,
        max_grade,
        cases,
    })
}

/// Maps an achieved fraction onto scale levels `1..=levels`.
pub fn scale_grade(fraction: f64, levels: u32) -> f64 {
    if levels == 0 {
        return 0.0;
    }
    1.0 + (fraction.clamp(0.0, 1.0) * f64::from(levels - 1)).round()
}
