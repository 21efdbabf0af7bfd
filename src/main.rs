use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use interview_notify::batch::BatchRunner;
use interview_notify::config::Config;
use interview_notify::dispatch::RoundDispatcher;
use interview_notify::error::ConfigError;
use interview_notify::notify::SmtpNotifier;
use interview_notify::source::{CsvFileSource, RecordSource};
use interview_notify::store::RestStore;

/// Dispatch per-round interview scheduling emails from a CSV export.
#[derive(Debug, Parser)]
#[command(name = "interview-notify", version)]
struct Cli {
    /// Path to the scheduling CSV export.
    input: Option<PathBuf>,

    /// Read input rows from the outcome store instead of a CSV file.
    #[arg(long)]
    from_store: bool,

    /// Re-send rounds that already have a stored outcome.
    #[arg(long)]
    force_resend: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if cli.from_store {
        return Err(ConfigError::UnimplementedMode(
            "--from-store (reading input rows back out of the store) is not implemented; \
             pass a CSV path instead"
                .into(),
        )
        .into());
    }
    let Some(input) = cli.input else {
        anyhow::bail!("a CSV input path is required (see --help)");
    };

    let config = Config::from_env()?;

    eprintln!("📬 Interview Notify v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Input: {}", input.display());
    eprintln!("   Store: {}/{}", config.store.base_id, config.store.table);
    eprintln!("   SMTP: {}:{}", config.smtp.host, config.smtp.port);
    if cli.force_resend {
        eprintln!("   Force resend: on");
    }

    let store = RestStore::new(&config.store);
    // Total provisioning failure is fatal; partial failure already warned.
    let provisioned = store.provision_schema().await?;
    if provisioned > 0 {
        eprintln!("   Provisioned {provisioned} store field(s)");
    }

    let source = CsvFileSource::new(&input);
    let rows = source.fetch_rows().await?;

    let dispatcher = RoundDispatcher::new(
        Arc::new(store),
        Arc::new(SmtpNotifier::new(config.smtp.clone())),
        cli.force_resend,
    );
    let runner = BatchRunner::new(dispatcher, config.default_offset);
    let summary = runner.run(rows).await;

    eprintln!();
    eprintln!(
        "   Rows: {} ({} skipped)",
        summary.rows_total, summary.rows_skipped
    );
    eprintln!(
        "   Rounds: {} ({} sent, {} failed, {} queued, {} skipped, {} already processed)",
        summary.rounds_seen,
        summary.sent,
        summary.failed,
        summary.queued,
        summary.skipped,
        summary.already_processed
    );
    match summary.avg_tat_seconds {
        Some(avg) => eprintln!("   Mean turnaround: {avg:.0}s"),
        None => eprintln!("   Mean turnaround: n/a"),
    }

    Ok(())
}
