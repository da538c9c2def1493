use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::domain::{
    Assignment, AssignmentId, CourseId, Credentials, Grading, LanguageId, TestCaseDraft, UserId,
};

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid job file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Everything needed to grade one submission offline of any host:
/// the assignment, its test cases and the submitted file.
#[derive(Debug, Clone, Deserialize)]
pub struct JobFile {
    pub assignment: JobAssignment,
    #[serde(default)]
    pub test_cases: Vec<TestCaseDraft>,
    pub submission: JobSubmission,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobAssignment {
    #[serde(default = "default_id")]
    pub id: AssignmentId,
    #[serde(default = "default_id")]
    pub course_id: CourseId,
    pub name: String,
    pub language: LanguageId,
    #[serde(default)]
    pub grading: Grading,
    pub credentials: Option<Credentials>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobSubmission {
    #[serde(default = "default_id")]
    pub user_id: UserId,
    /// Source file, relative to the job file.
    pub source: PathBuf,
    pub language: Option<LanguageId>,
}

fn default_id() -> i64 {
    1
}

impl From<JobAssignment> for Assignment {
    fn from(job: JobAssignment) -> Self {
        Self {
            id: job.id,
            course_id: job.course_id,
            name: job.name,
            language: job.language,
            grading: job.grading,
            credentials: job.credentials,
        }
    }
}

impl JobFile {
    pub fn parse(text: &str) -> Result<Self, JobError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads the job and the submission source it points to.
    pub async fn load(path: &Path) -> Result<(Self, String), JobError> {
        let job = Self::parse(&read(path).await?)?;
        let source_path = path
            .parent()
            .map(|dir| dir.join(&job.submission.source))
            .unwrap_or_else(|| job.submission.source.clone());
        let source = read(&source_path).await?;
        Ok((job, source))
    }
}

async fn read(path: &Path) -> Result<String, JobError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| JobError::Io {
            path: path.to_path_buf(),
            source,
        })
}
