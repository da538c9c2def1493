use dashmap::DashMap;

use crate::core::{
    domain::{Assignment, AssignmentId, FileArea, Submission, TestCase, UserId},
    errors::StoreError,
    traits::store::{AssignmentStore, FileStore, SubmissionStore, TestCaseStore},
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    assignments: DashMap<AssignmentId, Assignment>,
    test_cases: DashMap<AssignmentId, Vec<TestCase>>,
    submissions: DashMap<(AssignmentId, UserId), Submission>,
    files: DashMap<FileArea, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_file(&self, area: FileArea, content: String) {
        self.files.insert(area, content);
    }
}

#[async_trait::async_trait]
impl AssignmentStore for MemoryStore {
    async fn get_assignment(&self, id: AssignmentId) -> Result<Option<Assignment>, StoreError> {
        Ok(self.assignments.get(&id).map(|entry| entry.value().clone()))
    }

    async fn save_assignment(&self, assignment: Assignment) -> Result<(), StoreError> {
        self.assignments.insert(assignment.id, assignment);
        Ok(())
    }

    async fn delete_assignment(&self, id: AssignmentId) -> Result<(), StoreError> {
        self.assignments.remove(&id);
        Ok(())
    }
}

#[async_trait::async_trait]
impl TestCaseStore for MemoryStore {
    async fn list_test_cases(
        &self,
        assignment_id: AssignmentId,
    ) -> Result<Vec<TestCase>, StoreError> {
        Ok(self
            .test_cases
            .get(&assignment_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn replace_test_cases(
        &self,
        assignment_id: AssignmentId,
        test_cases: Vec<TestCase>,
    ) -> Result<(), StoreError> {
        self.test_cases.insert(assignment_id, test_cases);
        Ok(())
    }

    async fn delete_test_cases(&self, assignment_id: AssignmentId) -> Result<(), StoreError> {
        self.test_cases.remove(&assignment_id);
        Ok(())
    }
}

#[async_trait::async_trait]
impl SubmissionStore for MemoryStore {
    async fn get_submission(
        &self,
        assignment_id: AssignmentId,
        user_id: UserId,
    ) -> Result<Option<Submission>, StoreError> {
        Ok(self
            .submissions
            .get(&(assignment_id, user_id))
            .map(|entry| entry.value().clone()))
    }

    async fn save_submission(&self, submission: Submission) -> Result<(), StoreError> {
        self.submissions
            .insert((submission.assignment_id, submission.user_id), submission);
        Ok(())
    }

    async fn list_submissions(
        &self,
        assignment_id: AssignmentId,
    ) -> Result<Vec<Submission>, StoreError> {
        Ok(self
            .submissions
            .iter()
            .filter(|entry| entry.key().0 == assignment_id)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn delete_submissions(&self, assignment_id: AssignmentId) -> Result<(), StoreError> {
        self.submissions.retain(|key, _| key.0 != assignment_id);
        Ok(())
    }
}

#[async_trait::async_trait]
impl FileStore for MemoryStore {
    async fn read_text(&self, area: &FileArea) -> Result<Option<String>, StoreError> {
        Ok(self.files.get(area).map(|entry| entry.value().clone()))
    }
}
