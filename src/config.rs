use std::{fmt, path::Path, time::Duration};

use config::{Config, ConfigError, Environment, File, builder::DefaultState};
use serde::Deserialize;

use crate::{
    constants::{DEFAULT_CONFIG_FILE, DEFAULT_NAMESPACE, ENV_PREFIX},
    core::{
        domain::Credentials,
        pipeline::{grading::WeightPolicy, judging::RunMode, polling::PollPolicy},
        service::GradingSettings,
    },
    soap::client::SoapClientConfig,
};

#[derive(Deserialize, Clone)]
pub struct JudgeConfig {
    pub wsdl_url: Option<String>,
    pub endpoint: Option<String>,
    pub namespace: String,
    pub user: String,
    pub password: String,
    pub request_timeout_ms: u64,
    /// Ask the judge to keep submissions private.
    pub private: bool,
}

impl fmt::Debug for JudgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JudgeConfig")
            .field("wsdl_url", &self.wsdl_url)
            .field("endpoint", &self.endpoint)
            .field("namespace", &self.namespace)
            .field("user", &self.user)
            .field("password", &"***")
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("private", &self.private)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollConfig {
    pub initial_delay_ms: u64,
    pub interval_ms: u64,
    pub max_interval_ms: u64,
    pub backoff: f64,
    pub max_attempts: u32,
    pub timeout_ms: u64,
    pub call_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GradingConfig {
    pub run_mode: RunMode,
    pub weight_policy: WeightPolicy,
    pub max_concurrency: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub judge: JudgeConfig,
    pub poll: PollConfig,
    pub grading: GradingConfig,
}

impl AppConfig {
    /// Defaults, then `path` (or `config/judgex.*` when present), then
    /// `JUDGEX__SECTION__KEY` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        Self::build(Self::defaults()?.add_source(file).add_source(environment()))
    }

    fn defaults() -> Result<config::ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("judge.namespace", DEFAULT_NAMESPACE)?
            .set_default("judge.user", "")?
            .set_default("judge.password", "")?
            .set_default("judge.request_timeout_ms", 30_000)?
            .set_default("judge.private", true)?
            .set_default("poll.initial_delay_ms", 3_000)?
            .set_default("poll.interval_ms", 1_000)?
            .set_default("poll.max_interval_ms", 8_000)?
            .set_default("poll.backoff", 2.0)?
            .set_default("poll.max_attempts", 30)?
            .set_default("poll.timeout_ms", 120_000)?
            .set_default("poll.call_timeout_ms", 30_000)?
            .set_default("grading.run_mode", "per_test_case")?
            .set_default("grading.weight_policy", "as_is")?
            .set_default("grading.max_concurrency", 4)
    }

    fn build(builder: config::ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| Err(ConfigError::Message(message.to_string()));

        if self.judge.request_timeout_ms == 0 {
            return invalid("judge.request_timeout_ms must be positive");
        }
        let poll = &self.poll;
        if poll.interval_ms == 0 || poll.timeout_ms == 0 || poll.call_timeout_ms == 0 {
            return invalid("poll intervals and timeouts must be positive");
        }
        if poll.max_attempts == 0 {
            return invalid("poll.max_attempts must be positive");
        }
        if !poll.backoff.is_finite() || poll.backoff < 1.0 {
            return invalid("poll.backoff must be at least 1.0");
        }
        if self.grading.max_concurrency == 0 {
            return invalid("grading.max_concurrency must be positive");
        }
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.judge.user, &self.judge.password)
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            initial_delay: Duration::from_millis(self.poll.initial_delay_ms),
            interval: Duration::from_millis(self.poll.interval_ms),
            max_interval: Duration::from_millis(self.poll.max_interval_ms),
            backoff: self.poll.backoff,
            max_attempts: self.poll.max_attempts,
            timeout: Duration::from_millis(self.poll.timeout_ms),
            call_timeout: Duration::from_millis(self.poll.call_timeout_ms),
        }
    }

    /// Fails when the judge cannot be located.
    pub fn soap_client_config(&self) -> Result<SoapClientConfig, ConfigError> {
        if self.judge.wsdl_url.is_none() && self.judge.endpoint.is_none() {
            return Err(ConfigError::Message(
                "either judge.wsdl_url or judge.endpoint must be set".to_string(),
            ));
        }
        Ok(SoapClientConfig {
            wsdl_url: self.judge.wsdl_url.clone(),
            endpoint: self.judge.endpoint.clone(),
            namespace: self.judge.namespace.clone(),
            request_timeout: Duration::from_millis(self.judge.request_timeout_ms),
        })
    }

    pub fn grading_settings(&self) -> GradingSettings {
        GradingSettings {
            credentials: self.credentials(),
            run_mode: self.grading.run_mode,
            weight_policy: self.grading.weight_policy,
            private: self.judge.private,
            max_concurrency: self.grading.max_concurrency,
            poll: self.poll_policy(),
        }
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}
