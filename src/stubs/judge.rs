use std::{
    collections::{BTreeMap, HashMap},
    time::Duration,
};

use tokio::sync::Mutex;

use crate::core::{
    domain::{
        Credentials, DetailFlags, JudgeRequest, LanguageId, ResultCode, SubmissionStatus,
        TestCaseDraft,
    },
    errors::JudgeError,
    traits::judge::{
        ConnectivityProbe, CreatedSubmission, JudgeService, LanguageList, ServiceStatus,
        StatusReport, SubmissionDetails,
    },
};

/// In-process judge. Every link walks through the same status script and
/// ends with `result`; program output is looked up by stdin.
#[derive(Debug)]
pub struct JudgeStub {
    script: Vec<SubmissionStatus>,
    result: ResultCode,
    outputs: HashMap<String, String>,
    languages: BTreeMap<LanguageId, String>,
    account: Option<Credentials>,
    delay: Duration,
    state: Mutex<StubState>,
}

#[derive(Debug, Default)]
struct StubState {
    next_link: u64,
    inputs: HashMap<String, String>,
    polls: HashMap<String, usize>,
    status_calls: usize,
    requests: Vec<JudgeRequest>,
}

impl JudgeStub {
    pub fn new(delay: Duration) -> Self {
        Self {
            script: vec![SubmissionStatus::Done],
            result: ResultCode::Success,
            outputs: HashMap::new(),
            languages: BTreeMap::from([(LanguageId(1), "C++ (stub)".to_string())]),
            account: None,
            delay,
            state: Mutex::new(StubState::default()),
        }
    }

    /// Answers every test case with its expected output.
    pub fn echoing(test_cases: &[TestCaseDraft]) -> Self {
        test_cases
            .iter()
            .fold(Self::new(Duration::ZERO), |stub, draft| {
                stub.with_output(&draft.input, &draft.expected_output)
            })
    }

    pub fn with_script(mut self, script: Vec<SubmissionStatus>) -> Self {
        self.script = script;
        self
    }

    pub fn with_result(mut self, result: ResultCode) -> Self {
        self.result = result;
        self
    }

    pub fn with_output(mut self, input: &str, output: &str) -> Self {
        self.outputs.insert(input.to_string(), output.to_string());
        self
    }

    /// Only these credentials are accepted; others get `AUTH_ERROR`.
    pub fn with_account(mut self, credentials: Credentials) -> Self {
        self.account = Some(credentials);
        self
    }

    pub async fn status_calls(&self) -> usize {
        self.state.lock().await.status_calls
    }

    pub async fn requests(&self) -> Vec<JudgeRequest> {
        self.state.lock().await.requests.clone()
    }

    fn authenticate(&self, credentials: &Credentials) -> ServiceStatus {
        match &self.account {
            Some(account) if account != credentials => ServiceStatus::AuthError,
            _ => ServiceStatus::Ok,
        }
    }

    fn status_at(&self, poll: usize) -> SubmissionStatus {
        self.script
            .get(poll)
            .or(self.script.last())
            .copied()
            .unwrap_or(SubmissionStatus::Done)
    }
}

#[async_trait::async_trait]
impl JudgeService for JudgeStub {
    #[tracing::instrument]
    async fn test_connectivity(
        &self,
        credentials: &Credentials,
    ) -> Result<ConnectivityProbe, JudgeError> {
        tokio::time::sleep(self.delay).await;
        Ok(ConnectivityProbe {
            error: self.authenticate(credentials),
            help_text: String::new(),
            float_probe: std::f64::consts::PI,
            numeric_probe: 42,
            bool_probe: true,
        })
    }

    #[tracing::instrument]
    async fn create_submission(
        &self,
        request: &JudgeRequest,
    ) -> Result<CreatedSubmission, JudgeError> {
        tokio::time::sleep(self.delay).await;
        let error = self.authenticate(&request.credentials);
        if error != ServiceStatus::Ok {
            return Ok(CreatedSubmission {
                error,
                link: String::new(),
            });
        }

        let mut state = self.state.lock().await;
        state.next_link += 1;
        let link = format!("stub{}", state.next_link);
        state.inputs.insert(link.clone(), request.input.clone());
        state.requests.push(request.clone());
        tracing::debug!("Created stub submission {}", link);

        Ok(CreatedSubmission { error, link })
    }

    #[tracing::instrument]
    async fn get_submission_status(
        &self,
        credentials: &Credentials,
        link: &str,
    ) -> Result<StatusReport, JudgeError> {
        tokio::time::sleep(self.delay).await;
        let mut state = self.state.lock().await;
        state.status_calls += 1;
        let polls = state.polls.entry(link.to_string()).or_default();
        let status = self.status_at(*polls);
        *polls += 1;

        Ok(StatusReport {
            error: self.authenticate(credentials),
            status,
            result: if status.is_terminal() {
                self.result
            } else {
                ResultCode::NotRun
            },
        })
    }

    #[tracing::instrument]
    async fn get_submission_details(
        &self,
        credentials: &Credentials,
        link: &str,
        flags: &DetailFlags,
    ) -> Result<SubmissionDetails, JudgeError> {
        tokio::time::sleep(self.delay).await;
        let state = self.state.lock().await;
        let input = state.inputs.get(link).cloned().unwrap_or_default();
        let output = self.outputs.get(&input).cloned().unwrap_or_default();

        Ok(SubmissionDetails {
            error: self.authenticate(credentials),
            language: LanguageId(1),
            elapsed_time: 0.01,
            status: SubmissionStatus::Done,
            result: self.result,
            memory_used: 1024,
            signal: 0,
            is_public: false,
            source: None,
            input: flags.input.then(|| input.clone()),
            output: flags.output.then_some(output),
            stderr: flags.stderr.then(String::new),
            compile_info: flags.compile_info.then(String::new),
        })
    }

    #[tracing::instrument]
    async fn get_languages(&self, credentials: &Credentials) -> Result<LanguageList, JudgeError> {
        tokio::time::sleep(self.delay).await;
        Ok(LanguageList {
            error: self.authenticate(credentials),
            languages: self.languages.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_foreign_credentials() {
        let stub = JudgeStub::new(Duration::ZERO).with_account(Credentials::new("judge", "right"));

        let probe = stub
            .test_connectivity(&Credentials::new("judge", "wrong"))
            .await
            .unwrap();
        assert!(probe.error.is_auth_error());

        let probe = stub
            .test_connectivity(&Credentials::new("judge", "right"))
            .await
            .unwrap();
        assert_eq!(probe.error, ServiceStatus::Ok);
    }

    #[tokio::test]
    async fn test_outputs_follow_input() {
        let stub = JudgeStub::new(Duration::ZERO).with_output("1 2\n", "3\n");
        let request = JudgeRequest {
            credentials: Credentials::new("judge", "secret"),
            source_code: "int main() {}".to_string(),
            language: LanguageId(1),
            input: "1 2\n".to_string(),
            run: true,
            private: true,
        };

        let created = stub.create_submission(&request).await.unwrap();
        let details = stub
            .get_submission_details(&request.credentials, &created.link, &DetailFlags::VERDICT)
            .await
            .unwrap();

        assert_eq!(details.output.as_deref(), Some("3\n"));
        assert_eq!(stub.requests().await, vec![request]);
    }
}
