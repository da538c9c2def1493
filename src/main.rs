use std::{panic, path::Path, sync::Arc};

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use judgex::{
    config::AppConfig,
    core::{
        domain::{Assignment, SubmissionSource},
        service::{Collaborators, GradingService},
        traits::{judge::JudgeService, store::AssignmentStore},
    },
    job::JobFile,
    memory::{gradebook::MemoryGradebook, permissions::StaticPermissions, store::MemoryStore},
    soap::client::SoapJudgeClient,
    stubs::judge::JudgeStub,
};

use crate::cli::{Cli, Command};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    set_panic_hook();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "Loaded configuration");

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling outstanding judge calls");
                cancel.cancel();
            }
        }
    });

    match cli.command {
        Command::Ping => {
            let service = build_service(&config, remote_judge(&config)?, MemoryStore::new());
            let probe = service.check_credentials(&config.credentials()).await?;
            println!("judge reachable, account {} accepted", config.judge.user);
            if !probe.help_text.is_empty() {
                println!("{}", probe.help_text);
            }
        }
        Command::Languages => {
            let service = build_service(&config, remote_judge(&config)?, MemoryStore::new());
            for (id, name) in service.languages().await? {
                println!("{id:>4}  {name}");
            }
        }
        Command::Grade { job, offline } => grade(&config, &job, offline, &cancel).await?,
    }

    Ok(())
}

async fn grade(
    config: &AppConfig,
    path: &Path,
    offline: bool,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let (job, source) = JobFile::load(path).await?;
    let judge: Arc<dyn JudgeService> = if offline {
        Arc::new(JudgeStub::echoing(&job.test_cases))
    } else {
        remote_judge(config)?
    };

    let assignment = Assignment::from(job.assignment);
    let (assignment_id, user_id) = (assignment.id, job.submission.user_id);
    let store = MemoryStore::new();
    store.save_assignment(assignment).await?;
    let service = build_service(config, judge, store);

    service
        .save_test_cases(user_id, assignment_id, job.test_cases, false)
        .await?;
    service
        .submit(
            user_id,
            assignment_id,
            SubmissionSource::Inline(source),
            job.submission.language,
        )
        .await?;

    let breakdown = match service
        .judge_and_grade(assignment_id, user_id, cancel)
        .await
    {
        Ok(breakdown) => breakdown,
        Err(error) => {
            tracing::error!(presentation = ?error.presentation(), "Grading failed: {}", error);
            return Err(error.into());
        }
    };

    for case in &breakdown.cases {
        let verdict = case
            .verdict
            .map_or_else(|| "no result".to_string(), |verdict| format!("{verdict:?}"));
        println!(
            "#{:<3} {:>6.2}%  {:<20} {:>8.2}",
            case.index,
            case.weight.as_percent(),
            verdict,
            case.awarded
        );
    }
    println!("grade: {:.2} / {:.2}", breakdown.grade, breakdown.max_grade);
    if let Some(feedback) = breakdown.feedback() {
        println!("{feedback}");
    }
    Ok(())
}

fn remote_judge(config: &AppConfig) -> anyhow::Result<Arc<dyn JudgeService>> {
    Ok(Arc::new(SoapJudgeClient::new(config.soap_client_config()?)?))
}

fn build_service(
    config: &AppConfig,
    judge: Arc<dyn JudgeService>,
    store: MemoryStore,
) -> GradingService {
    let store = Arc::new(store);
    let ports = Collaborators {
        assignments: store.clone(),
        test_cases: store.clone(),
        submissions: store.clone(),
        files: store,
        grades: Arc::new(MemoryGradebook::new()),
        permissions: Arc::new(StaticPermissions::allow_all()),
    };
    GradingService::new(judge, ports, config.grading_settings())
}

fn set_panic_hook() {
    panic::set_hook(Box::new(|panic_info| {
        tracing::error!(
            message = "panic occurred",
            panic = %panic_info
        );
    }));
}
