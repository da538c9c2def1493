use std::time::Duration;

use uuid::Uuid;

use crate::core::domain::{AssignmentId, UserId};

/// Failures talking to the judge service. Judging outcomes such as
/// compile errors are not errors, they are reported as verdicts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JudgeError {
    #[error("transport error calling {method} at {endpoint}: {message}")]
    Transport {
        endpoint: String,
        method: String,
        message: String,
    },

    #[error("SOAP fault from {method}: {code}: {message}")]
    Fault {
        method: String,
        code: String,
        message: String,
    },

    #[error("judge service rejected the credentials in {method}")]
    Authentication { method: String },

    #[error("judge service answered {method} with {code}")]
    Service { method: String, code: String },

    #[error("invalid response from {method}: {message}")]
    InvalidResponse { method: String, message: String },

    #[error("{operation} timed out after {attempts} attempt(s) in {elapsed:?}")]
    Timeout {
        operation: String,
        attempts: u32,
        elapsed: Duration,
    },

    #[error("{operation} was cancelled")]
    Cancelled { operation: String },
}

impl JudgeError {
    /// Whether resubmitting later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            JudgeError::Transport { .. } | JudgeError::Fault { .. } | JudgeError::Timeout { .. }
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, JudgeError::Timeout { .. })
    }
}

/// Local precondition violations: bad test cases, missing records.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataError {
    #[error("sub-grade weight must be a finite, non-negative percentage, got {value}")]
    InvalidWeight { value: f64 },

    #[error("sub-grade choice {index} is outside 0..=9")]
    WeightChoiceOutOfRange { index: usize },

    #[error("test case weights add up to {total}%, expected 100%")]
    WeightsDoNotSum { total: f64 },

    #[error("test case index {index} is used more than once")]
    DuplicateTestCase { index: u32 },

    #[error("maximum grade must be finite and non-negative, got {value}")]
    InvalidMaxGrade { value: f64 },

    #[error("assignment {assignment_id} does not exist")]
    AssignmentNotFound { assignment_id: AssignmentId },

    #[error("assignment {assignment_id} has no test cases")]
    NoTestCases { assignment_id: AssignmentId },

    #[error("user {user_id} has no submission for assignment {assignment_id}")]
    SubmissionNotFound {
        assignment_id: AssignmentId,
        user_id: UserId,
    },

    #[error("source file {area} does not exist")]
    SourceFileNotFound { area: String },

    #[error("submitted source code is empty")]
    EmptySource,

    #[error("submission {submission_id} was replaced while it was being judged")]
    SubmissionSuperseded { submission_id: Uuid },

    #[error(
        "test cases of assignment {assignment_id} are locked, {judged} submission(s) were judged against them"
    )]
    TestCasesLocked {
        assignment_id: AssignmentId,
        judged: usize,
    },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("storage backend failed: {message}")]
    Backend { message: String },
}

/// How the host should present a failure to its user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presentation {
    TryAgain,
    Configuration,
    Forbidden,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Judge(#[from] JudgeError),

    #[error("test case {index}: {source}")]
    TestCase {
        index: u32,
        #[source]
        source: JudgeError,
    },

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("user {user_id} lacks capability {capability}")]
    PermissionDenied { user_id: UserId, capability: String },
}

impl ServiceError {
    pub fn presentation(&self) -> Presentation {
        match self {
            ServiceError::Judge(error) | ServiceError::TestCase { source: error, .. } => {
                match error {
                    JudgeError::Authentication { .. } | JudgeError::Service { .. } => {
                        Presentation::Configuration
                    }
                    _ => Presentation::TryAgain,
                }
            }
            ServiceError::Data(DataError::SubmissionSuperseded { .. }) => Presentation::TryAgain,
            ServiceError::Data(_) => Presentation::Configuration,
            ServiceError::PermissionDenied { .. } => Presentation::Forbidden,
            ServiceError::Store(_) => Presentation::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        let timeout = JudgeError::Timeout {
            operation: "polling abc123".to_string(),
            attempts: 3,
            elapsed: Duration::from_secs(9),
        };
        assert!(timeout.is_retryable());
        assert!(timeout.is_timeout());

        let auth = JudgeError::Authentication {
            method: "createSubmission".to_string(),
        };
        assert!(!auth.is_retryable());
        assert!(!auth.is_timeout());
    }

    #[test]
    fn test_presentation() {
        let timeout = ServiceError::TestCase {
            index: 2,
            source: JudgeError::Timeout {
                operation: "polling abc123".to_string(),
                attempts: 30,
                elapsed: Duration::from_secs(120),
            },
        };
        assert_eq!(timeout.presentation(), Presentation::TryAgain);

        let auth = ServiceError::Judge(JudgeError::Authentication {
            method: "testFunction".to_string(),
        });
        assert_eq!(auth.presentation(), Presentation::Configuration);

        let data = ServiceError::Data(DataError::NoTestCases { assignment_id: 1 });
        assert_eq!(data.presentation(), Presentation::Configuration);

        let denied = ServiceError::PermissionDenied {
            user_id: 7,
            capability: "mod/onlinejudge:submit".to_string(),
        };
        assert_eq!(denied.presentation(), Presentation::Forbidden);
    }
}
