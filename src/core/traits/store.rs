use crate::core::{
    domain::{Assignment, AssignmentId, FileArea, Submission, TestCase, UserId},
    errors::StoreError,
};

#[async_trait::async_trait]
pub trait AssignmentStore: std::fmt::Debug + Send + Sync {
    async fn get_assignment(&self, id: AssignmentId) -> Result<Option<Assignment>, StoreError>;

    async fn save_assignment(&self, assignment: Assignment) -> Result<(), StoreError>;

    async fn delete_assignment(&self, id: AssignmentId) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
pub trait TestCaseStore: std::fmt::Debug + Send + Sync {
    /// Test cases of an assignment, in no particular order.
    async fn list_test_cases(&self, assignment_id: AssignmentId)
    -> Result<Vec<TestCase>, StoreError>;

    async fn replace_test_cases(
        &self,
        assignment_id: AssignmentId,
        test_cases: Vec<TestCase>,
    ) -> Result<(), StoreError>;

    async fn delete_test_cases(&self, assignment_id: AssignmentId) -> Result<(), StoreError>;
}

/// Keyed by (assignment, user). Saving replaces the previous submission.
#[async_trait::async_trait]
pub trait SubmissionStore: std::fmt::Debug + Send + Sync {
    async fn get_submission(
        &self,
        assignment_id: AssignmentId,
        user_id: UserId,
    ) -> Result<Option<Submission>, StoreError>;

    async fn save_submission(&self, submission: Submission) -> Result<(), StoreError>;

    async fn list_submissions(
        &self,
        assignment_id: AssignmentId,
    ) -> Result<Vec<Submission>, StoreError>;

    async fn delete_submissions(&self, assignment_id: AssignmentId) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
pub trait FileStore: std::fmt::Debug + Send + Sync {
    async fn read_text(&self, area: &FileArea) -> Result<Option<String>, StoreError>;
}
