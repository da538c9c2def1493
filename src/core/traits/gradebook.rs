use crate::core::{domain::GradeEntry, errors::StoreError};

/// Host grade book.
#[mockall::automock]
#[async_trait::async_trait]
pub trait GradeSink: std::fmt::Debug + Send + Sync {
    async fn push_grade(&self, entry: GradeEntry) -> Result<(), StoreError>;
}
