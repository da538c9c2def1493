use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{errors::DataError, text::outputs_match};

pub type AssignmentId = i64;
pub type CourseId = i64;
pub type UserId = i64;

/// Language identifier as understood by the judge service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageId(pub i32);

impl fmt::Display for LanguageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Judge service account. Sent with every call, never reused as a session.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Share of the assignment grade a test case awards when accepted,
/// as a percentage.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct SubgradeWeight(f64);

impl SubgradeWeight {
    pub fn percent(value: f64) -> Result<Self, DataError> {
        if !value.is_finite() || value < 0.0 {
            return Err(DataError::InvalidWeight { value });
        }
        Ok(Self(value))
    }

    /// Maps the position in the 10%..100% sub-grade menu to a weight.
    pub fn from_choice_index(index: usize) -> Result<Self, DataError> {
        match index {
            0..=9 => Ok(Self((index as f64 + 1.0) * 10.0)),
            _ => Err(DataError::WeightChoiceOutOfRange { index }),
        }
    }

    pub fn as_percent(self) -> f64 {
        self.0
    }

    pub fn as_fraction(self) -> f64 {
        self.0 / 100.0
    }
}

impl TryFrom<f64> for SubgradeWeight {
    type Error = DataError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::percent(value)
    }
}

impl From<SubgradeWeight> for f64 {
    fn from(weight: SubgradeWeight) -> Self {
        weight.0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Grading {
    Points { max: f64 },
    Scale { id: i64, levels: u32 },
    NotGraded,
}

impl Default for Grading {
    fn default() -> Self {
        Grading::Points { max: 100.0 }
    }
}

impl Grading {
    /// Upper bound used when aggregating; scales are computed on 0..=100
    /// and mapped onto their levels afterwards.
    pub fn max_points(&self) -> f64 {
        match self {
            Grading::Points { max } => *max,
            Grading::Scale { .. } | Grading::NotGraded => 100.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    pub id: AssignmentId,
    pub course_id: CourseId,
    pub name: String,
    pub language: LanguageId,
    pub grading: Grading,
    /// Overrides the globally configured judge account.
    pub credentials: Option<Credentials>,
}

/// One entry of the instructor's repeating test case form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestCaseDraft {
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub expected_output: String,
    pub weight: SubgradeWeight,
    #[serde(default)]
    pub feedback: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TestCase {
    pub id: Uuid,
    pub assignment_id: AssignmentId,
    pub index: u32,
    pub input: String,
    pub expected_output: String,
    pub weight: SubgradeWeight,
    pub feedback: String,
}

impl TestCase {
    pub fn from_draft(assignment_id: AssignmentId, index: u32, draft: TestCaseDraft) -> Self {
        Self {
            id: Uuid::new_v4(),
            assignment_id,
            index,
            input: draft.input,
            expected_output: draft.expected_output,
            weight: draft.weight,
            feedback: draft.feedback,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Submission {
    pub id: Uuid,
    pub assignment_id: AssignmentId,
    pub user_id: UserId,
    pub source_code: String,
    pub language: LanguageId,
    pub created_at: DateTime<Utc>,
    pub judged_at: Option<DateTime<Utc>>,
    pub results: Vec<JudgeResult>,
}

impl Submission {
    pub fn new(
        assignment_id: AssignmentId,
        user_id: UserId,
        source_code: String,
        language: LanguageId,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            assignment_id,
            user_id,
            source_code,
            language,
            created_at: Utc::now(),
            judged_at: None,
            results: Vec::new(),
        }
    }

    /// A run that produced no result leaves the submission unjudged.
    pub fn with_results(&self, results: Vec<JudgeResult>, judged_at: DateTime<Utc>) -> Self {
        Self {
            judged_at: (!results.is_empty()).then_some(judged_at),
            results,
            ..self.clone()
        }
    }

    pub fn result_for(&self, test_case_index: u32) -> Option<&JudgeResult> {
        self.results
            .iter()
            .find(|result| result.test_case_index == test_case_index)
    }

    pub fn is_judged(&self) -> bool {
        self.judged_at.is_some()
    }
}

/// Run state reported by the judge. Codes are kept verbatim so that
/// unknown values survive a round trip.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubmissionStatus {
    Queued(i64),
    Compiling,
    Running,
    Done,
    Other(i64),
}

impl SubmissionStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            c if c < 0 => SubmissionStatus::Queued(c),
            0 => SubmissionStatus::Done,
            1 => SubmissionStatus::Compiling,
            3 => SubmissionStatus::Running,
            c => SubmissionStatus::Other(c),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            SubmissionStatus::Queued(c) | SubmissionStatus::Other(c) => *c,
            SubmissionStatus::Done => 0,
            SubmissionStatus::Compiling => 1,
            SubmissionStatus::Running => 3,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmissionStatus::Done)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResultCode {
    NotRun,
    CompileError,
    RuntimeError,
    TimeLimitExceeded,
    Success,
    MemoryLimitExceeded,
    IllegalSystemCall,
    InternalError,
    Other(i64),
}

impl ResultCode {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => ResultCode::NotRun,
            11 => ResultCode::CompileError,
            12 => ResultCode::RuntimeError,
            13 => ResultCode::TimeLimitExceeded,
            15 => ResultCode::Success,
            17 => ResultCode::MemoryLimitExceeded,
            19 => ResultCode::IllegalSystemCall,
            20 => ResultCode::InternalError,
            c => ResultCode::Other(c),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            ResultCode::NotRun => 0,
            ResultCode::CompileError => 11,
            ResultCode::RuntimeError => 12,
            ResultCode::TimeLimitExceeded => 13,
            ResultCode::Success => 15,
            ResultCode::MemoryLimitExceeded => 17,
            ResultCode::IllegalSystemCall => 19,
            ResultCode::InternalError => 20,
            ResultCode::Other(c) => *c,
        }
    }
}

/// Local outcome of a test case once the judge's output has been checked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verdict {
    Accepted,
    WrongAnswer,
    CompileError,
    RuntimeError,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    IllegalSystemCall,
    InternalError,
    NotRun,
    Unknown(i64),
}

impl Verdict {
    pub fn from_run(result: ResultCode, output: Option<&str>, expected_output: &str) -> Self {
        match result {
            ResultCode::Success => {
                if outputs_match(output.unwrap_or_default(), expected_output) {
                    Verdict::Accepted
                } else {
                    Verdict::WrongAnswer
                }
            }
            other => Self::from_failure(other),
        }
    }

    pub fn from_compilation(result: ResultCode) -> Self {
        match result {
            ResultCode::Success | ResultCode::NotRun => Verdict::Accepted,
            other => Self::from_failure(other),
        }
    }

    fn from_failure(result: ResultCode) -> Self {
        match result {
            ResultCode::Success => Verdict::Accepted,
            ResultCode::NotRun => Verdict::NotRun,
            ResultCode::CompileError => Verdict::CompileError,
            ResultCode::RuntimeError => Verdict::RuntimeError,
            ResultCode::TimeLimitExceeded => Verdict::TimeLimitExceeded,
            ResultCode::MemoryLimitExceeded => Verdict::MemoryLimitExceeded,
            ResultCode::IllegalSystemCall => Verdict::IllegalSystemCall,
            ResultCode::InternalError => Verdict::InternalError,
            ResultCode::Other(c) => Verdict::Unknown(c),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct JudgeResult {
    pub test_case_index: u32,
    pub link: String,
    pub status: SubmissionStatus,
    pub result: ResultCode,
    pub verdict: Verdict,
    /// Seconds.
    pub elapsed_time: f64,
    /// Kilobytes.
    pub memory_used: i64,
    pub signal: i64,
    pub is_public: bool,
    pub output: Option<String>,
}

/// Selects the optional text fields returned with submission details.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DetailFlags {
    pub source: bool,
    pub input: bool,
    pub output: bool,
    pub stderr: bool,
    pub compile_info: bool,
}

impl DetailFlags {
    pub const VERDICT: Self = Self {
        source: false,
        input: false,
        output: true,
        stderr: false,
        compile_info: true,
    };
}

/// Outbound unit of work for the judge service. Built fresh for every call.
#[derive(Clone, Debug, PartialEq)]
pub struct JudgeRequest {
    pub credentials: Credentials,
    pub source_code: String,
    pub language: LanguageId,
    pub input: String,
    pub run: bool,
    pub private: bool,
}

impl JudgeRequest {
    pub fn for_test_case(
        credentials: &Credentials,
        submission: &Submission,
        test_case: &TestCase,
        private: bool,
    ) -> Self {
        Self {
            credentials: credentials.clone(),
            source_code: submission.source_code.clone(),
            language: submission.language,
            input: test_case.input.clone(),
            run: true,
            private,
        }
    }

    pub fn compile_only(credentials: &Credentials, submission: &Submission, private: bool) -> Self {
        Self {
            credentials: credentials.clone(),
            source_code: submission.source_code.clone(),
            language: submission.language,
            input: String::new(),
            run: false,
            private,
        }
    }
}

/// Opaque address of a file kept by the host's file storage.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FileArea {
    pub area: String,
    pub item_id: i64,
    pub name: String,
}

impl FileArea {
    pub fn new(area: impl Into<String>, item_id: i64, name: impl Into<String>) -> Self {
        Self {
            area: area.into(),
            item_id,
            name: name.into(),
        }
    }
}

impl fmt::Display for FileArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.area, self.item_id, self.name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SubmissionSource {
    Inline(String),
    File(FileArea),
}

#[derive(Clone, Debug, PartialEq)]
pub struct GradeEntry {
    pub course_id: CourseId,
    pub assignment_id: AssignmentId,
    pub user_id: UserId,
    pub grade: f64,
    pub feedback: Option<String>,
    pub graded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_round_trip() {
        for code in [-1, -7, 0, 1, 3, 2, 42] {
            assert_eq!(SubmissionStatus::from_code(code).code(), code);
        }
        assert_eq!(SubmissionStatus::from_code(-1), SubmissionStatus::Queued(-1));
        assert_eq!(SubmissionStatus::from_code(2), SubmissionStatus::Other(2));
        assert!(SubmissionStatus::from_code(0).is_terminal());
        assert!(!SubmissionStatus::from_code(3).is_terminal());
    }

    #[test]
    fn test_result_codes_round_trip() {
        for code in [0, 11, 12, 13, 15, 17, 19, 20, 99] {
            assert_eq!(ResultCode::from_code(code).code(), code);
        }
        assert_eq!(ResultCode::from_code(15), ResultCode::Success);
        assert_eq!(ResultCode::from_code(99), ResultCode::Other(99));
    }

    #[test]
    fn test_verdict_compares_output() {
        assert_eq!(
            Verdict::from_run(ResultCode::Success, Some("3\r\n"), "3\n"),
            Verdict::Accepted
        );
        assert_eq!(
            Verdict::from_run(ResultCode::Success, Some("4\n"), "3\n"),
            Verdict::WrongAnswer
        );
        assert_eq!(
            Verdict::from_run(ResultCode::Success, None, "3\n"),
            Verdict::WrongAnswer
        );
        assert_eq!(
            Verdict::from_run(ResultCode::TimeLimitExceeded, Some("3\n"), "3\n"),
            Verdict::TimeLimitExceeded
        );
    }

    #[test]
    fn test_verdict_for_compilation() {
        assert_eq!(Verdict::from_compilation(ResultCode::NotRun), Verdict::Accepted);
        assert_eq!(
            Verdict::from_compilation(ResultCode::CompileError),
            Verdict::CompileError
        );
    }

    #[test]
    fn test_subgrade_weight_choices() {
        assert_eq!(SubgradeWeight::from_choice_index(0).unwrap().as_percent(), 10.0);
        assert_eq!(SubgradeWeight::from_choice_index(9).unwrap().as_percent(), 100.0);
        assert_eq!(
            SubgradeWeight::from_choice_index(10),
            Err(DataError::WeightChoiceOutOfRange { index: 10 })
        );
    }

    #[test]
    fn test_subgrade_weight_rejects_negative() {
        assert!(SubgradeWeight::percent(-10.0).is_err());
        assert!(SubgradeWeight::percent(f64::NAN).is_err());
        assert_eq!(SubgradeWeight::percent(50.0).unwrap().as_fraction(), 0.5);
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let credentials = Credentials::new("judge", "s3cret");
        let printed = format!("{:?}", credentials);
        assert!(printed.contains("judge"));
        assert!(!printed.contains("s3cret"));
    }
}
