use std::{collections::BTreeMap, sync::Arc};

use chrono::Utc;
use itertools::Itertools;
use tokio_util::sync::CancellationToken;

use crate::{
    constants::{CAP_MANAGE_TEST_CASES, CAP_SUBMIT, GET_LANGUAGES, TEST_FUNCTION},
    core::{
        domain::{
            Assignment, AssignmentId, Credentials, GradeEntry, Grading, LanguageId, Submission,
            SubmissionSource, TestCase, TestCaseDraft, UserId,
        },
        errors::{DataError, ServiceError},
        pipeline::{
            grading::{GradeBreakdown, WeightPolicy, aggregate, scale_grade, validate_weights},
            judging::{JudgeSettings, RunMode, judge_test_cases},
            polling::{PollPolicy, bounded_call},
        },
        traits::{
            gradebook::GradeSink,
            judge::{ConnectivityProbe, JudgeService},
            permissions::PermissionOracle,
            store::{AssignmentStore, FileStore, SubmissionStore, TestCaseStore},
        },
    },
};

/// Host-owned collaborators the service reads from and writes to.
#[derive(Clone, Debug)]
pub struct Collaborators {
    pub assignments: Arc<dyn AssignmentStore>,
    pub test_cases: Arc<dyn TestCaseStore>,
    pub submissions: Arc<dyn SubmissionStore>,
    pub files: Arc<dyn FileStore>,
    pub grades: Arc<dyn GradeSink>,
    pub permissions: Arc<dyn PermissionOracle>,
}

#[derive(Clone, Debug)]
pub struct GradingSettings {
    /// Judge account used unless the assignment names its own.
    pub credentials: Credentials,
    pub run_mode: RunMode,
    pub weight_policy: WeightPolicy,
    pub private: bool,
    pub max_concurrency: usize,
    pub poll: PollPolicy,
}

impl GradingSettings {
    fn judge_settings(&self, assignment: &Assignment) -> JudgeSettings {
        JudgeSettings {
            credentials: assignment
                .credentials
                .clone()
                .unwrap_or_else(|| self.credentials.clone()),
            run_mode: self.run_mode,
            private: self.private,
            max_concurrency: self.max_concurrency,
            poll: self.poll.clone(),
        }
    }
}

/// Entry points the host calls: test case maintenance, submission,
/// judging and grading.
#[derive(Clone, Debug)]
pub struct GradingService {
    judge: Arc<dyn JudgeService>,
    ports: Collaborators,
    settings: GradingSettings,
}

impl GradingService {
    pub fn new(
        judge: Arc<dyn JudgeService>,
        ports: Collaborators,
        settings: GradingSettings,
    ) -> Self {
        Self {
            judge,
            ports,
            settings,
        }
    }

    /// Smoke test of a judge account.
    #[tracing::instrument(skip(self))]
    pub async fn check_credentials(
        &self,
        credentials: &Credentials,
    ) -> Result<ConnectivityProbe, ServiceError> {
        let probe = bounded_call(
            TEST_FUNCTION,
            self.settings.poll.call_timeout,
            &CancellationToken::new(),
            self.judge.test_connectivity(credentials),
        )
        .await?;
        probe.error.check(TEST_FUNCTION)?;
        Ok(probe)
    }

    #[tracing::instrument(skip(self))]
    pub async fn languages(&self) -> Result<BTreeMap<LanguageId, String>, ServiceError> {
        let list = bounded_call(
            GET_LANGUAGES,
            self.settings.poll.call_timeout,
            &CancellationToken::new(),
            self.judge.get_languages(&self.settings.credentials),
        )
        .await?;
        list.error.check(GET_LANGUAGES)?;
        Ok(list.languages)
    }

    /// Test cases of an assignment ordered by index.
    pub async fn test_cases(&self, assignment_id: AssignmentId) -> Result<Vec<TestCase>, ServiceError> {
        let test_cases = self.ports.test_cases.list_test_cases(assignment_id).await?;
        Ok(test_cases
            .into_iter()
            .sorted_by_key(|test_case| test_case.index)
            .collect())
    }

    /// Replaces the test cases of an assignment.
    ///
    /// Refused once any submission has been judged, unless `force` is set.
    #[tracing::instrument(skip(self, drafts), fields(drafts = drafts.len()))]
    pub async fn save_test_cases(
        &self,
        actor: UserId,
        assignment_id: AssignmentId,
        drafts: Vec<TestCaseDraft>,
        force: bool,
    ) -> Result<Vec<TestCase>, ServiceError> {
        self.require(actor, CAP_MANAGE_TEST_CASES).await?;
        self.assignment(assignment_id).await?;

        let judged = self
            .ports
            .submissions
            .list_submissions(assignment_id)
            .await?
            .iter()
            .filter(|submission| submission.is_judged())
            .count();
        if judged > 0 && !force {
            return Err(DataError::TestCasesLocked {
                assignment_id,
                judged,
            }
            .into());
        }

        let test_cases = (0u32..)
            .zip(drafts)
            .map(|(index, draft)| TestCase::from_draft(assignment_id, index, draft))
            .collect_vec();
        validate_weights(&test_cases, self.settings.weight_policy)?;

        self.ports
            .test_cases
            .replace_test_cases(assignment_id, test_cases.clone())
            .await?;
        tracing::info!("Saved {} test cases", test_cases.len());
        Ok(test_cases)
    }

    /// Stores a new submission for `actor`, replacing any previous one.
    #[tracing::instrument(skip(self, source))]
    pub async fn submit(
        &self,
        actor: UserId,
        assignment_id: AssignmentId,
        source: SubmissionSource,
        language: Option<LanguageId>,
    ) -> Result<Submission, ServiceError> {
        self.require(actor, CAP_SUBMIT).await?;
        let assignment = self.assignment(assignment_id).await?;

        let source_code = match source {
            SubmissionSource::Inline(code) => code,
            SubmissionSource::File(area) => self
                .ports
                .files
                .read_text(&area)
                .await?
                .ok_or_else(|| DataError::SourceFileNotFound {
                    area: area.to_string(),
                })?,
        };
        if source_code.trim().is_empty() {
            return Err(DataError::EmptySource.into());
        }

        let submission = Submission::new(
            assignment.id,
            actor,
            source_code,
            language.unwrap_or(assignment.language),
        );
        self.ports
            .submissions
            .save_submission(submission.clone())
            .await?;
        tracing::info!("Stored submission {}", submission.id);
        Ok(submission)
    }

    /// Sends the stored submission to the judge and records the results.
    ///
    /// Results obtained before a failure are kept; the failure of the
    /// lowest test case index is returned.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn judge_submission(
        &self,
        assignment_id: AssignmentId,
        user_id: UserId,
        cancel: &CancellationToken,
    ) -> Result<Submission, ServiceError> {
        let assignment = self.assignment(assignment_id).await?;
        let submission = self.submission(assignment_id, user_id).await?;
        let test_cases = self.test_cases(assignment_id).await?;
        if test_cases.is_empty() {
            return Err(DataError::NoTestCases { assignment_id }.into());
        }

        let report = judge_test_cases(
            self.judge.clone(),
            &submission,
            &test_cases,
            &self.settings.judge_settings(&assignment),
            cancel,
        )
        .await;

        let current = self.submission(assignment_id, user_id).await?;
        if current.id != submission.id {
            tracing::warn!(
                "Submission {} was replaced by {} while judging, results dropped",
                submission.id,
                current.id
            );
            return Err(DataError::SubmissionSuperseded {
                submission_id: submission.id,
            }
            .into());
        }

        let submission = submission.with_results(report.results, Utc::now());
        self.ports
            .submissions
            .save_submission(submission.clone())
            .await?;

        match report.failures.into_iter().next() {
            Some((index, source)) => Err(ServiceError::TestCase { index, source }),
            None => Ok(submission),
        }
    }

    /// Grades the stored results and hands the grade to the grade book.
    #[tracing::instrument(skip(self))]
    pub async fn grade_submission(
        &self,
        assignment_id: AssignmentId,
        user_id: UserId,
    ) -> Result<GradeBreakdown, ServiceError> {
        let assignment = self.assignment(assignment_id).await?;
        let submission = self.submission(assignment_id, user_id).await?;
        let test_cases = self.test_cases(assignment_id).await?;

        let breakdown = aggregate(
            &test_cases,
            &submission.results,
            assignment.grading.max_points(),
            self.settings.weight_policy,
        )?;

        let grade = match assignment.grading {
            Grading::Points { .. } => Some(breakdown.grade),
            Grading::Scale { levels, .. } => Some(scale_grade(breakdown.fraction(), levels)),
            Grading::NotGraded => None,
        };
        if let Some(grade) = grade {
            self.ports
                .grades
                .push_grade(GradeEntry {
                    course_id: assignment.course_id,
                    assignment_id,
                    user_id,
                    grade,
                    feedback: breakdown.feedback(),
                    graded_at: Utc::now(),
                })
                .await?;
            tracing::info!("Graded user {}: {}", user_id, grade);
        }

        Ok(breakdown)
    }

    pub async fn judge_and_grade(
        &self,
        assignment_id: AssignmentId,
        user_id: UserId,
        cancel: &CancellationToken,
    ) -> Result<GradeBreakdown, ServiceError> {
        self.judge_submission(assignment_id, user_id, cancel).await?;
        self.grade_submission(assignment_id, user_id).await
    }

    /// Removes an assignment with its test cases and submissions.
    #[tracing::instrument(skip(self))]
    pub async fn delete_assignment(&self, assignment_id: AssignmentId) -> Result<(), ServiceError> {
        self.ports.submissions.delete_submissions(assignment_id).await?;
        self.ports.test_cases.delete_test_cases(assignment_id).await?;
        self.ports.assignments.delete_assignment(assignment_id).await?;
        Ok(())
    }

    async fn require(&self, user_id: UserId, capability: &str) -> Result<(), ServiceError> {
        if self
            .ports
            .permissions
            .has_capability(user_id, capability)
            .await?
        {
            Ok(())
        } else {
            tracing::warn!("User {} lacks {}", user_id, capability);
            Err(ServiceError::PermissionDenied {
                user_id,
                capability: capability.to_string(),
            })
        }
    }

    async fn assignment(&self, assignment_id: AssignmentId) -> Result<Assignment, ServiceError> {
        self.ports
            .assignments
            .get_assignment(assignment_id)
            .await?
            .ok_or_else(|| DataError::AssignmentNotFound { assignment_id }.into())
    }

    async fn submission(
        &self,
        assignment_id: AssignmentId,
        user_id: UserId,
    ) -> Result<Submission, ServiceError> {
        self.ports
            .submissions
            .get_submission(assignment_id, user_id)
            .await?
            .ok_or_else(|| {
                DataError::SubmissionNotFound {
                    assignment_id,
                    user_id,
                }
                .into()
            })
    }
}
