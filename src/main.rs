use anyhow::Context;
use automod_correlator::{
    alerts::InMemoryAlertSystem,
    clock::{Clock, SystemClock},
    config::Config,
    integrations::StaticPlatformClient,
    models::{MemberJoin, MessageEvent, RawActionEvent},
    state::ActivityCaches,
    MessageVerdict, ModerationPipeline,
};
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Correlates auto-moderation events read from stdin into moderator alerts
#[derive(Parser, Debug)]
#[command(name = "automod-correlator", version, about)]
struct Args {
    /// Configuration file layered over the built-in defaults
    #[arg(short, long, env = "CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

/// One line of newline-delimited JSON input
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InboundEvent {
    Action(RawActionEvent),
    Message(MessageEvent),
    Join(MemberJoin),
}

fn init_tracing(json: bool, default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("automod_correlator={}", default_level).into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let (config, load_error) = match &args.config {
        Some(path) => match Config::load_from(path) {
            Ok(config) => (config, None),
            Err(e) => (Config::default(), Some(e)),
        },
        None => match Config::load() {
            Ok(config) => (config, None),
            Err(e) => (Config::default(), Some(e)),
        },
    };

    init_tracing(
        args.json_logs || config.observability.json_logs,
        &config.observability.log_level,
    );
    if let Some(e) = load_error {
        tracing::warn!(error = %e, "Failed to load configuration, using defaults");
    }

    tracing::info!(
        service = %config.observability.service_name,
        "Starting automod-correlator v{}",
        env!("CARGO_PKG_VERSION")
    );

    if config.observability.prometheus_enabled {
        if let Err(e) = automod_correlator::metrics::init_metrics() {
            tracing::warn!(error = %e, "Failed to initialize metrics, continuing without them");
        }
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let caches = ActivityCaches::new(&config.caches, Arc::clone(&clock));
    let alerts = Arc::new(InMemoryAlertSystem::new(caches.clone()));
    let platform = Arc::new(StaticPlatformClient::new());

    let pipeline = ModerationPipeline::new(&config, platform.clone(), alerts.clone(), caches, clock);
    pipeline
        .start()
        .await
        .context("failed to start moderation pipeline")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("failed to read stdin")? {
                    Some(line) => dispatch(&pipeline, &platform, &line).await,
                    None => {
                        tracing::info!("Input closed");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl-C");
                break;
            }
        }
    }

    pipeline.shutdown().await;

    let stats = pipeline.stats().await;
    tracing::info!(
        alerts = alerts.all_alerts().len(),
        sweep_cycles = stats.scheduler.cycles_completed,
        "Final statistics"
    );

    if config.observability.prometheus_enabled {
        match automod_correlator::metrics::gather_metrics() {
            Ok(text) => tracing::info!("Metrics:\n{}", text),
            Err(e) => tracing::warn!(error = %e, "Failed to gather metrics"),
        }
    }

    Ok(())
}

async fn dispatch(pipeline: &ModerationPipeline, platform: &StaticPlatformClient, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    let event: InboundEvent = match serde_json::from_str(line) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Skipping malformed input line");
            return;
        }
    };

    match event {
        InboundEvent::Action(action) => {
            platform.add_guild(action.guild_id.clone());
            if let Err(e) = pipeline.handle_action(action).await {
                tracing::warn!(error = %e, "Rejected action event");
            }
        }
        InboundEvent::Message(message) => {
            platform.add_guild(message.guild_id.clone());
            match pipeline.handle_message(message) {
                Ok(MessageVerdict::Spam) => tracing::debug!("Message flagged as spam"),
                Ok(MessageVerdict::Clean) => {}
                Err(e) => tracing::warn!(error = %e, "Rejected message event"),
            }
        }
        InboundEvent::Join(join) => {
            platform.add_guild(join.guild_id.clone());
            if let Err(e) = pipeline.handle_member_join(join) {
                tracing::warn!(error = %e, "Rejected join event");
            }
        }
    }
}
