use anyhow::Context;
use bounce_sweep::utils::{logger, validation::Validate};
use bounce_sweep::{
    CliArgs, HttpConnector, ReconciliationJob, RunStatus, Settings, SkipReason, SqliteDirectory,
};
use clap::Parser;

// 單執行緒依序執行，不需要多執行緒 runtime
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    logger::init_logger(args.verbose, args.log_format);

    tracing::info!("Starting bounce-sweep");

    let settings = match &args.config {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => Settings::from_env().context("failed to build default settings")?,
    };
    tracing::debug!(
        "Provider endpoint: {}{}, account database: {}",
        settings.provider.base_url,
        settings.provider.bounces_path,
        settings.directory.database_path
    );

    // 驗證配置
    if let Err(e) = settings.validate() {
        tracing::error!(
            "❌ Configuration validation failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    let connector = HttpConnector::new(settings.provider.clone());
    let directory = SqliteDirectory::open(&settings.directory.database_path);
    let job = ReconciliationJob::new(settings, connector, directory);

    let status = job.run().await;
    match &status {
        RunStatus::Completed(outcome) => {
            let summary = serde_json::to_string(outcome)?;
            tracing::info!(outcome = %summary, "📊 Run outcome");
        }
        RunStatus::Skipped(SkipReason::MissingCredential) => {
            tracing::debug!("Run skipped: no credential");
        }
        RunStatus::Skipped(SkipReason::ClientUnavailable(reason)) => {
            tracing::debug!("Run skipped: {}", reason);
        }
        RunStatus::Failed { kind, message } => {
            tracing::debug!("Run failed ({:?}): {}", kind, message);
        }
    }

    let exit_code = status.exit_code();
    if exit_code > 0 {
        std::process::exit(exit_code);
    }

    Ok(())
}
