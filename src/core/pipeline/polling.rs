use std::{future::Future, time::Duration};

use tokio::time::{Instant, sleep_until, timeout_at};
use tokio_util::sync::CancellationToken;

use crate::{
    constants::GET_SUBMISSION_STATUS,
    core::{
        domain::Credentials,
        errors::JudgeError,
        traits::judge::{JudgeService, StatusReport},
    },
};

#[derive(Clone, Debug, PartialEq)]
pub struct PollPolicy {
    /// Wait before the first status call.
    pub initial_delay: Duration,
    pub interval: Duration,
    pub max_interval: Duration,
    /// Multiplier applied to the interval after every non-terminal poll.
    pub backoff: f64,
    pub max_attempts: u32,
    /// Overall budget of the poll loop, initial delay included.
    pub timeout: Duration,
    /// Budget of a single remote call.
    pub call_timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(3),
            interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(8),
            backoff: 2.0,
            max_attempts: 30,
            timeout: Duration::from_secs(120),
            call_timeout: Duration::from_secs(30),
        }
    }
}

impl PollPolicy {
    fn next_interval(&self, current: Duration) -> Duration {
        current
            .mul_f64(self.backoff.max(1.0))
            .min(self.max_interval.max(current))
    }
}

/// Polls `link` until the judge reports a terminal status.
///
/// Returns the first terminal report and stops there. Fails with
/// [`JudgeError::Timeout`] once `max_attempts` polls or the overall
/// timeout are used up, and with [`JudgeError::Cancelled`] when `cancel`
/// fires first.
#[tracing::instrument(skip(judge, credentials, policy, cancel))]
pub async fn wait_for_completion(
    judge: &dyn JudgeService,
    credentials: &Credentials,
    link: &str,
    policy: &PollPolicy,
    cancel: &CancellationToken,
) -> Result<StatusReport, JudgeError> {
    let started = Instant::now();
    let deadline = started + policy.timeout;
    let mut delay = policy.initial_delay;
    let mut interval = policy.interval;
    let mut attempts = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(link)),
            _ = sleep_until((Instant::now() + delay).min(deadline)) => {}
        }
        if Instant::now() >= deadline {
            return Err(timed_out(link, attempts, started));
        }

        attempts += 1;
        let call_deadline = (Instant::now() + policy.call_timeout).min(deadline);
        let report = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(link)),
            outcome = timeout_at(call_deadline, judge.get_submission_status(credentials, link)) => {
                match outcome {
                    Ok(report) => report?,
                    Err(_) => return Err(timed_out(link, attempts, started)),
                }
            }
        };
        report.error.check(GET_SUBMISSION_STATUS)?;

        tracing::debug!(
            attempts,
            status = ?report.status,
            result = ?report.result,
            "Polled submission status"
        );
        if report.status.is_terminal() {
            return Ok(report);
        }
        if attempts >= policy.max_attempts {
            tracing::warn!(attempts, "Gave up polling, judge still busy");
            return Err(timed_out(link, attempts, started));
        }

        delay = interval;
        interval = policy.next_interval(interval);
    }
}

/// Runs a single remote call under `limit`, honouring `cancel`.
pub async fn bounded_call<T, F>(
    operation: &str,
    limit: Duration,
    cancel: &CancellationToken,
    call: F,
) -> Result<T, JudgeError>
where
    F: Future<Output = Result<T, JudgeError>>,
{
    let started = Instant::now();
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(JudgeError::Cancelled { operation: operation.to_string() }),
        outcome = timeout_at(started + limit, call) => match outcome {
            Ok(result) => result,
            Err(_) => Err(JudgeError::Timeout {
                operation: operation.to_string(),
                attempts: 1,
                elapsed: started.elapsed(),
            }),
        },
    }
}

fn timed_out(link: &str, attempts: u32, started: Instant) -> JudgeError {
    JudgeError::Timeout {
        operation: format!("polling {link}"),
        attempts,
        elapsed: started.elapsed(),
    }
}

fn cancelled(link: &str) -> JudgeError {
    JudgeError::Cancelled {
        operation: format!("polling {link}"),
    }
}
