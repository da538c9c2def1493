use std::collections::BTreeMap;

use crate::{
    constants::{AUTH_ERROR, OK},
    core::{
        domain::{
            Credentials, DetailFlags, JudgeRequest, LanguageId, ResultCode, SubmissionStatus,
        },
        errors::JudgeError,
    },
};

/// Value of the in-band `error` field every response carries.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum ServiceStatus {
    #[default]
    Ok,
    AuthError,
    Other(String),
}

impl ServiceStatus {
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "" | OK => ServiceStatus::Ok,
            AUTH_ERROR => ServiceStatus::AuthError,
            other => ServiceStatus::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            ServiceStatus::Ok => OK,
            ServiceStatus::AuthError => AUTH_ERROR,
            ServiceStatus::Other(code) => code,
        }
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(self, ServiceStatus::AuthError)
    }

    /// Turns an in-band failure into an error for `method`.
    pub fn check(&self, method: &str) -> Result<(), JudgeError> {
        match self {
            ServiceStatus::Ok => Ok(()),
            ServiceStatus::AuthError => Err(JudgeError::Authentication {
                method: method.to_string(),
            }),
            ServiceStatus::Other(code) => Err(JudgeError::Service {
                method: method.to_string(),
                code: code.clone(),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConnectivityProbe {
    pub error: ServiceStatus,
    pub help_text: String,
    pub float_probe: f64,
    pub numeric_probe: i64,
    pub bool_probe: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CreatedSubmission {
    pub error: ServiceStatus,
    pub link: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StatusReport {
    pub error: ServiceStatus,
    pub status: SubmissionStatus,
    pub result: ResultCode,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SubmissionDetails {
    pub error: ServiceStatus,
    pub language: LanguageId,
    pub elapsed_time: f64,
    pub status: SubmissionStatus,
    pub result: ResultCode,
    pub memory_used: i64,
    pub signal: i64,
    pub is_public: bool,
    pub source: Option<String>,
    pub input: Option<String>,
    pub output: Option<String>,
    pub stderr: Option<String>,
    pub compile_info: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LanguageList {
    pub error: ServiceStatus,
    pub languages: BTreeMap<LanguageId, String>,
}

/// Remote judge. Implementations report whatever the service currently
/// says; authentication failures come back in-band through `error`.
#[mockall::automock]
#[async_trait::async_trait]
pub trait JudgeService: std::fmt::Debug + Send + Sync {
    async fn test_connectivity(
        &self,
        credentials: &Credentials,
    ) -> Result<ConnectivityProbe, JudgeError>;

    async fn create_submission(
        &self,
        request: &JudgeRequest,
    ) -> Result<CreatedSubmission, JudgeError>;

    async fn get_submission_status(
        &self,
        credentials: &Credentials,
        link: &str,
    ) -> Result<StatusReport, JudgeError>;

    async fn get_submission_details(
        &self,
        credentials: &Credentials,
        link: &str,
        flags: &DetailFlags,
    ) -> Result<SubmissionDetails, JudgeError>;

    async fn get_languages(&self, credentials: &Credentials) -> Result<LanguageList, JudgeError>;
}
