//! Legal Intake server
//!
//! Serves the intake agent over HTTP: batch turns, streamed turns and a
//! health probe.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use legal_intake::adapters::ai::AnthropicProvider;
use legal_intake::adapters::http::{create_router, AgentAppState};
use legal_intake::adapters::intake::{InMemoryIntakeServices, InMemoryTeamDirectory};
use legal_intake::adapters::TracingTelemetry;
use legal_intake::application::{ToolDispatcher, TurnOrchestrator};
use legal_intake::config::{AppConfig, LogFormat, ServerConfig, ValidationError};
use legal_intake::domain::conversation::tools::ToolRegistry;
use legal_intake::ports::{AIProvider, IntakeServices, TeamDirectory, TelemetrySink};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    let anthropic = config
        .ai
        .anthropic()
        .ok_or(ValidationError::MissingRequired("ANTHROPIC_API_KEY"))?;
    tracing::info!(model = %anthropic.model, "Anthropic provider configured");
    let provider: Arc<dyn AIProvider> = Arc::new(AnthropicProvider::new(anthropic)?);

    let teams: Arc<dyn TeamDirectory> = match &config.teams.seed_file {
        Some(path) => {
            let directory = InMemoryTeamDirectory::from_yaml_file(path)?;
            tracing::info!(
                path = %path.display(),
                teams = directory.team_count().await,
                "Team directory loaded"
            );
            Arc::new(directory)
        }
        None => {
            tracing::warn!("No team seed file configured; every team falls back to defaults");
            Arc::new(InMemoryTeamDirectory::new())
        }
    };

    // In-memory services are the default intake adapter.
    let services: Arc<dyn IntakeServices> = Arc::new(InMemoryIntakeServices::new());
    let telemetry: Arc<dyn TelemetrySink> = Arc::new(TracingTelemetry);

    let registry = Arc::new(ToolRegistry::standard());
    let dispatcher =
        Arc::new(ToolDispatcher::standard(registry, services).with_telemetry(telemetry.clone()));
    let orchestrator = Arc::new(TurnOrchestrator::new(
        provider,
        teams,
        dispatcher,
        telemetry,
        config.agent.orchestrator(),
    ));

    let state = AgentAppState::new(orchestrator)
        .with_held_stream_timeout(config.server.held_stream_timeout());
    let app = create_router(state, &config.server);

    let addr = config.server.socket_addr()?;
    tracing::info!(%addr, environment = ?config.server.environment, "Legal intake server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&server.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match server.log_format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
