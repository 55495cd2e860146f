//! Service wiring: builds every component from configuration and runs the
//! poller and HTTP surface until shutdown.

use crate::config::BotConfig;
use crate::db::{PgConversationRepository, PgDeviceRegistry, StateRepository};
use crate::error::StartupError;
use crate::poller::Poller;
use crate::telegram::{Allowlist, TelegramApi};
use crate::web;
use chatdeck_ai::ProviderRegistry;
use chatdeck_bot::{DeviceController, EventRouter, RouterSettings};
use chatdeck_conversation::{
    ConversationStore, RetryingConversationRepository, RetryingStateStore, SessionManager,
    SessionOrchestrator, TitleWorker,
};
use chatdeck_home::{HomeAssistantClient, RetryingControl, RetryingRegistry};
use rootcause::Report;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Runs the service until Ctrl-C.
///
/// # Errors
///
/// Returns an error if any component cannot be set up or the HTTP server fails.
pub async fn run(config: BotConfig) -> Result<(), Report<StartupError>> {
    let cancel = CancellationToken::new();

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .map_err(|e| StartupError::Database {
            details: e.to_string(),
        })?;

    info!("running database migrations");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| StartupError::Migration {
            details: e.to_string(),
        })?;

    let policy = config.retry_policy();

    let orchestrator_settings = config.orchestrator_settings().map_err(|e| StartupError::Config {
        details: e.to_string(),
    })?;
    let default_provider = orchestrator_settings.default_provider;
    let conversation_settings = config.conversation_settings().map_err(|e| StartupError::Config {
        details: e.to_string(),
    })?;
    let providers = ProviderRegistry::from_credentials(&config.provider_credentials(), &policy)
        .map_err(|e| StartupError::Provider {
            details: e.to_string(),
        })?;
    if !providers.contains(default_provider) {
        return Err(StartupError::Provider {
            details: format!("default provider '{default_provider}' has no API key"),
        }
        .into());
    }

    let repo = Arc::new(RetryingConversationRepository::new(
        PgConversationRepository::new(pool.clone()),
        policy.clone(),
    ));
    let store = ConversationStore::open(repo, conversation_settings)
        .await
        .map_err(|e| StartupError::Store {
            details: e.to_string(),
        })?;

    let titler = TitleWorker::new(store.clone(), config.title_settings(), cancel.child_token());
    let orchestrator = SessionOrchestrator::new(
        store,
        providers,
        titler.clone(),
        orchestrator_settings,
    );

    let state = Arc::new(RetryingStateStore::new(
        StateRepository::new(pool.clone()),
        policy.clone(),
    ));
    let sessions = SessionManager::new(state);

    let home = HomeAssistantClient::new(
        config.home_assistant.base_url.clone(),
        config.home_assistant.token.clone(),
    )
    .map_err(|e| StartupError::HomeAssistant {
        details: e.to_string(),
    })?;
    let devices = DeviceController::new(
        Arc::new(RetryingRegistry::new(
            PgDeviceRegistry::new(pool.clone()),
            policy.clone(),
        )),
        Arc::new(RetryingControl::new(home, policy)),
    );

    let api = TelegramApi::new(&config.telegram.api_base_url, &config.telegram.bot_token)
        .map_err(|e| StartupError::Transport {
            details: e.to_string(),
        })?;
    let router = EventRouter::new(
        sessions,
        orchestrator,
        devices,
        Arc::new(api.clone()),
        RouterSettings {
            discussion_thread_id: config.telegram.discussion_thread_id,
        },
    );
    let poller = Poller::new(
        api,
        router,
        Allowlist {
            superuser_id: config.telegram.superuser_id,
            supergroup_id: config.telegram.supergroup_id,
        },
        Duration::from_secs(config.telegram.poll_timeout_seconds),
    );

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|e| StartupError::Serve {
            details: e.to_string(),
        })?;
    info!("listening on http://{}", config.listen_addr);

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for shutdown signal");
        }
        info!("shutdown requested");
        shutdown.cancel();
    });

    let poller_task = tokio::spawn(poller.run(cancel.clone()));

    let served = axum::serve(listener, web::router(&config.static_dir))
        .with_graceful_shutdown(cancel.clone().cancelled_owned())
        .await;
    cancel.cancel();

    if let Err(e) = poller_task.await {
        error!(error = %e, "poller task failed");
    }
    titler.shutdown().await;
    pool.close().await;
    info!("shutdown complete");

    served.map_err(|e| StartupError::Serve {
        details: e.to_string(),
    })?;
    Ok(())
}
