use std::sync::Arc;

use futures::stream::FuturesUnordered;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::{
    constants::{CREATE_SUBMISSION, GET_SUBMISSION_DETAILS},
    core::{
        domain::{
            Credentials, DetailFlags, JudgeRequest, JudgeResult, Submission, TestCase, Verdict,
        },
        errors::JudgeError,
        pipeline::polling::{PollPolicy, bounded_call, wait_for_completion},
        traits::judge::{JudgeService, SubmissionDetails},
    },
};

/// How a submission is sent to the judge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// One run per test case, stdin taken from the test case.
    #[default]
    PerTestCase,
    /// A single compile-only run whose outcome applies to every test case.
    CompileOnly,
}

#[derive(Clone, Debug)]
pub struct JudgeSettings {
    pub credentials: Credentials,
    pub run_mode: RunMode,
    pub private: bool,
    pub max_concurrency: usize,
    pub poll: PollPolicy,
}

#[derive(Debug, Default)]
pub struct JudgeReport {
    /// Ordered by test case index.
    pub results: Vec<JudgeResult>,
    /// Ordered by test case index.
    pub failures: Vec<(u32, JudgeError)>,
}

/// Judges `submission` against every test case.
///
/// Runs are independent and issued concurrently; the report is ordered by
/// test case index regardless of completion order.
#[tracing::instrument(skip_all, fields(submission = %submission.id, test_cases = test_cases.len()))]
pub async fn judge_test_cases(
    judge: Arc<dyn JudgeService>,
    submission: &Submission,
    test_cases: &[TestCase],
    settings: &JudgeSettings,
    cancel: &CancellationToken,
) -> JudgeReport {
    let report = match settings.run_mode {
        RunMode::PerTestCase => {
            run_test_cases_concurrently(judge, submission, test_cases, settings, cancel).await
        }
        RunMode::CompileOnly => compile_once(judge, submission, test_cases, settings, cancel).await,
    };

    tracing::info!(
        judged = report.results.len(),
        failed = report.failures.len(),
        "Judging finished"
    );
    report
}

async fn run_test_cases_concurrently(
    judge: Arc<dyn JudgeService>,
    submission: &Submission,
    test_cases: &[TestCase],
    settings: &JudgeSettings,
    cancel: &CancellationToken,
) -> JudgeReport {
    let semaphore = Semaphore::new(settings.max_concurrency.max(1));
    let semaphore = &semaphore;
    let mut futures = FuturesUnordered::new();

    for test_case in test_cases {
        let judge = judge.clone();
        let request = JudgeRequest::for_test_case(
            &settings.credentials,
            submission,
            test_case,
            settings.private,
        );
        tracing::debug!("Queueing test case {}", test_case.index);

        futures.push(async move {
            let _permit = semaphore.acquire().await.ok();
            let outcome = run_once(judge.as_ref(), &request, settings, cancel)
                .await
                .map(|(link, details)| {
                    let verdict = Verdict::from_run(
                        details.result,
                        details.output.as_deref(),
                        &test_case.expected_output,
                    );
                    to_judge_result(test_case.index, link, details, verdict)
                });
            (test_case.index, outcome)
        });
    }

    let mut report = JudgeReport::default();
    while let Some((index, outcome)) = futures.next().await {
        match outcome {
            Ok(result) => {
                tracing::debug!("Test case {} judged: {:?}", index, result.verdict);
                report.results.push(result);
            }
            Err(error) => {
                tracing::warn!("Test case {} failed: {}", index, error);
                report.failures.push((index, error));
            }
        }
    }

    report.results.sort_by_key(|result| result.test_case_index);
    report.failures.sort_by_key(|(index, _)| *index);
    report
}

async fn compile_once(
    judge: Arc<dyn JudgeService>,
    submission: &Submission,
    test_cases: &[TestCase],
    settings: &JudgeSettings,
    cancel: &CancellationToken,
) -> JudgeReport {
    let request = JudgeRequest::compile_only(&settings.credentials, submission, settings.private);
    let mut report = JudgeReport::default();

    match run_once(judge.as_ref(), &request, settings, cancel).await {
        Ok((link, details)) => {
            let verdict = Verdict::from_compilation(details.result);
            report.results = test_cases
                .iter()
                .map(|test_case| {
                    to_judge_result(test_case.index, link.clone(), details.clone(), verdict)
                })
                .collect();
            report.results.sort_by_key(|result| result.test_case_index);
        }
        Err(error) => {
            tracing::warn!("Compile-only run failed: {}", error);
            if let Some(first) = test_cases.iter().map(|test_case| test_case.index).min() {
                report.failures.push((first, error));
            }
        }
    }

    report
}

/// Create, poll, fetch.
async fn run_once(
    judge: &dyn JudgeService,
    request: &JudgeRequest,
    settings: &JudgeSettings,
    cancel: &CancellationToken,
) -> Result<(String, SubmissionDetails), JudgeError> {
    let limit = settings.poll.call_timeout;

    let created = bounded_call(
        CREATE_SUBMISSION,
        limit,
        cancel,
        judge.create_submission(request),
    )
    .await?;
    created.error.check(CREATE_SUBMISSION)?;

    wait_for_completion(
        judge,
        &request.credentials,
        &created.link,
        &settings.poll,
        cancel,
    )
    .await?;

    let details = bounded_call(
        GET_SUBMISSION_DETAILS,
        limit,
        cancel,
        judge.get_submission_details(&request.credentials, &created.link, &DetailFlags::VERDICT),
    )
    .await?;
    details.error.check(GET_SUBMISSION_DETAILS)?;

    Ok((created.link, details))
}

fn to_judge_result(
    test_case_index: u32,
    link: String,
    details: SubmissionDetails,
    verdict: Verdict,
) -> JudgeResult {
    JudgeResult {
        test_case_index,
        link,
        status: details.status,
        result: details.result,
        verdict,
        elapsed_time: details.elapsed_time,
        memory_used: details.memory_used,
        signal: details.signal,
        is_public: details.is_public,
        output: details.output,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::{
            domain::{LanguageId, ResultCode, SubgradeWeight, SubmissionStatus},
            traits::judge::{CreatedSubmission, MockJudgeService, ServiceStatus, StatusReport},
        },
        stubs::judge::JudgeStub,
    };
    use std::time::Duration;

    fn create_test_case(index: u32, input: &str, expected_output: &str) -> TestCase {
        TestCase {
            id: uuid::Uuid::new_v4(),
            assignment_id: 1,
            index,
            input: input.to_string(),
            expected_output: expected_output.to_string(),
            weight: SubgradeWeight::percent(50.0).unwrap(),
            feedback: String::new(),
        }
    }

    fn create_submission() -> Submission {
        Submission::new(1, 42, "int main() { return 0; }".to_string(), LanguageId(1))
    }

    fn settings(run_mode: RunMode) -> JudgeSettings {
        JudgeSettings {
            credentials: Credentials::new("judge", "secret"),
            run_mode,
            private: true,
            max_concurrency: 2,
            poll: PollPolicy {
                initial_delay: Duration::from_millis(10),
                interval: Duration::from_millis(10),
                max_interval: Duration::from_millis(10),
                backoff: 1.0,
                max_attempts: 5,
                timeout: Duration::from_secs(5),
                call_timeout: Duration::from_secs(1),
            },
        }
    }

    fn details(result: ResultCode, output: &str) -> SubmissionDetails {
        SubmissionDetails {
            error: ServiceStatus::Ok,
            language: LanguageId(1),
            elapsed_time: 0.02,
            status: SubmissionStatus::Done,
            result,
            memory_used: 2048,
            signal: 0,
            is_public: false,
            source: None,
            input: None,
            output: Some(output.to_string()),
            stderr: None,
            compile_info: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_judges_every_test_case_in_index_order() {
        let judge = Arc::new(
            JudgeStub::new(Duration::ZERO)
                .with_output("1 2\n", "3\n")
                .with_output("2 2\n", "5\n"),
        );
        let test_cases = vec![
            create_test_case(1, "2 2\n", "4\n"),
            create_test_case(0, "1 2\n", "3\n"),
        ];

        let report = judge_test_cases(
            judge.clone(),
            &create_submission(),
            &test_cases,
            &settings(RunMode::PerTestCase),
            &CancellationToken::new(),
        )
        .await;

        assert!(report.failures.is_empty());
        let verdicts: Vec<_> = report
            .results
            .iter()
            .map(|result| (result.test_case_index, result.verdict))
            .collect();
        assert_eq!(verdicts, vec![(0, Verdict::Accepted), (1, Verdict::WrongAnswer)]);

        let requests = judge.requests().await;
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|request| request.run && request.private));
    }

    #[tokio::test(start_paused = true)]
    async fn test_compile_only_applies_single_run_to_all_cases() {
        let judge = Arc::new(JudgeStub::new(Duration::ZERO).with_result(ResultCode::CompileError));
        let test_cases = vec![
            create_test_case(0, "1\n", "1\n"),
            create_test_case(1, "2\n", "2\n"),
        ];

        let report = judge_test_cases(
            judge.clone(),
            &create_submission(),
            &test_cases,
            &settings(RunMode::CompileOnly),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(report.results.len(), 2);
        assert!(
            report
                .results
                .iter()
                .all(|result| result.verdict == Verdict::CompileError)
        );
        let requests = judge.requests().await;
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].run);
        assert!(requests[0].input.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_error_on_create_is_reported_per_case() {
        let mut judge = MockJudgeService::new();
        judge.expect_create_submission().returning(|_| {
            Ok(CreatedSubmission {
                error: ServiceStatus::AuthError,
                link: String::new(),
            })
        });
        judge.expect_get_submission_status().never();

        let report = judge_test_cases(
            Arc::new(judge),
            &create_submission(),
            &[create_test_case(0, "", "")],
            &settings(RunMode::PerTestCase),
            &CancellationToken::new(),
        )
        .await;

        assert!(report.results.is_empty());
        assert!(matches!(
            report.failures.as_slice(),
            [(0, JudgeError::Authentication { .. })]
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_failing_case_keeps_the_others() {
        let mut judge = MockJudgeService::new();
        judge.expect_create_submission().returning(|request| {
            Ok(CreatedSubmission {
                error: ServiceStatus::Ok,
                link: format!("link-{}", request.input.trim()),
            })
        });
        judge.expect_get_submission_status().returning(|_, _| {
            Ok(StatusReport {
                error: ServiceStatus::Ok,
                status: SubmissionStatus::Done,
                result: ResultCode::Success,
            })
        });
        judge
            .expect_get_submission_details()
            .returning(|_, link, _| match link {
                "link-b" => Err(JudgeError::Transport {
                    endpoint: "http://judge.local/api".to_string(),
                    method: GET_SUBMISSION_DETAILS.to_string(),
                    message: "connection reset".to_string(),
                }),
                _ => Ok(details(ResultCode::Success, "ok\n")),
            });

        let report = judge_test_cases(
            Arc::new(judge),
            &create_submission(),
            &[
                create_test_case(0, "a", "ok"),
                create_test_case(1, "b", "ok"),
                create_test_case(2, "c", "ok"),
            ],
            &settings(RunMode::PerTestCase),
            &CancellationToken::new(),
        )
        .await;

        let judged: Vec<_> = report
            .results
            .iter()
            .map(|result| result.test_case_index)
            .collect();
        assert_eq!(judged, vec![0, 2]);
        assert!(matches!(
            report.failures.as_slice(),
            [(1, JudgeError::Transport { .. })]
        ));
    }
}
