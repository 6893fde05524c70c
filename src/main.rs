use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use secrecy::ExposeSecret;

use vcf_bot::bot::{Bot, BotDeps};
use vcf_bot::channels::{Channel, ChannelManager, CliChannel, TelegramChannel};
use vcf_bot::config::BotConfig;
use vcf_bot::contacts::DialogueRegistry;
use vcf_bot::notifier::{NoopNotifier, Notifier, OperatorNotifier};
use vcf_bot::snapshot::{
    ArtifactStore, FileArtifactStore, SnapshotCompiler, SnapshotSchedule, artifact_routes,
    spawn_snapshot_ticker,
};
use vcf_bot::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env().context("invalid configuration")?;
    let schedule = SnapshotSchedule::parse(&config.schedule)?;

    eprintln!("📇 VCF Bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Artifact: {}", config.artifact_url());
    eprintln!("   Schedule: {}", schedule.expr());

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("failed to open database at {}", config.db_path.display()))?,
    );
    eprintln!("   Database: {}", config.db_path.display());

    // ── Snapshot compiler ────────────────────────────────────────────────
    let artifacts = Arc::new(FileArtifactStore::new(
        config.vcf_dir.clone(),
        config.public_url.clone(),
    ));
    let compiler = Arc::new(SnapshotCompiler::new(
        Arc::clone(&db),
        Arc::clone(&artifacts) as Arc<dyn ArtifactStore>,
    ));

    if config.compile_on_start {
        compiler.run_scheduled(Utc::now()).await;
    }
    let _ticker = spawn_snapshot_ticker(Arc::clone(&compiler), schedule, config.poll_interval);

    // ── Artifact server ──────────────────────────────────────────────────
    if let Some(port) = config.http_port {
        let app = artifact_routes(artifacts.dir().to_path_buf());
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
            .await
            .with_context(|| format!("failed to bind artifact server port {port}"))?;
        eprintln!("   Artifact server: http://0.0.0.0:{port}/vcf/");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Artifact server stopped: {}", e);
            }
        });
    }

    // ── Channels ─────────────────────────────────────────────────────────
    let mut channels = ChannelManager::new();
    if let Some(token) = &config.telegram_token {
        let telegram = TelegramChannel::new(token.expose_secret().to_string().into());
        if let Err(e) = telegram.health_check().await {
            tracing::warn!("Telegram health check failed: {}", e);
        }
        channels.add(Box::new(telegram));
    }
    if config.enable_cli {
        channels.add(Box::new(CliChannel::new()));
    }
    eprintln!("   Channels: {}", channels.names().join(", "));
    let channels = Arc::new(channels);

    // ── Notifier ─────────────────────────────────────────────────────────
    let notifier: Arc<dyn Notifier> = match &config.operator_id {
        Some(operator_id) => {
            eprintln!(
                "   Operator: {} via {}",
                operator_id, config.operator_channel
            );
            Arc::new(OperatorNotifier::new(
                Arc::clone(&channels),
                config.operator_channel.clone(),
                operator_id.clone(),
            ))
        }
        None => {
            eprintln!("   Operator: none (notifications disabled)");
            Arc::new(NoopNotifier)
        }
    };

    // ── Bot ──────────────────────────────────────────────────────────────
    let bot = Arc::new(Bot::new(BotDeps {
        store: db,
        registry: Arc::new(DialogueRegistry::new()),
        notifier,
    }));
    eprintln!();

    bot.run(channels).await?;

    Ok(())
}
