//! taskgrid entry point: master orchestrator, LLM fallback manager, and
//! slave manager wiring, plus a standalone slave agent mode.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use clap::Parser;
use eyre::{Context, Result};
use serde_json::json;
use tracing::info;

use taskgrid::cli::{Cli, Command};
use taskgrid::config::Config;
use taskgrid::llm_fallback::{FallbackManager, HttpProviderAdapter, ProviderAdapter};
use taskgrid::notify::TracingNotifier;
use taskgrid::orchestrator::Orchestrator;
use taskgrid::persistence;
use taskgrid::slave::{InstallMethod, SlaveManager, SlaveServerState, slave_router};
use taskgrid::version::MasterVersion;

fn setup_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging().context("failed to set up logging")?;

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("failed to load configuration")?;

    match cli.command {
        Command::Serve => serve(config).await,
        Command::SlaveAgent { host, port, token } => serve_slave_agent(host, port, token, config).await,
        Command::RegisterSlave { master, host, port, token, install_method } => register_slave(master, host, port, token, install_method, config).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    let data_dir = persistence::data_dir();
    let master_version = MasterVersion::capture();
    master_version.persist().context("failed to persist version_info.json")?;
    info!(commit = %master_version.commit, branch = %master_version.branch, "version captured");

    let orchestrator = Arc::new(Orchestrator::new(config.orchestrator.clone(), data_dir.clone()));
    let sweep_handles = taskgrid::orchestrator::spawn_sweepers(
        orchestrator.clone(),
        Duration::from_secs(config.orchestrator.sweep_interval_secs),
        Duration::from_secs(config.orchestrator.timeout_sweep_interval_secs),
    );

    let notifier = Arc::new(TracingNotifier);

    let mut adapters: HashMap<String, Box<dyn ProviderAdapter>> = HashMap::new();
    let http_client = reqwest::Client::new();
    for provider in &config.llm.providers {
        let adapter = HttpProviderAdapter::new(http_client.clone(), provider.clone());
        if !adapter.has_credentials() {
            tracing::warn!(provider_id = %provider.provider_id, env = %provider.api_key_env, "no credentials found, provider starts unavailable");
        }
        adapters.insert(provider.provider_id.clone(), Box::new(adapter));
    }
    let fallback_manager = Arc::new(FallbackManager::new(config.llm.clone(), adapters, notifier.clone(), data_dir.clone()));

    let slave_manager = Arc::new(SlaveManager::new(config.slaves.clone(), notifier.clone(), master_version.clone(), data_dir.clone()));
    let health_check_manager = slave_manager.clone();
    let health_check_interval = Duration::from_secs(config.slaves.health_check_interval_secs);
    let slave_health_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(health_check_interval);
        loop {
            ticker.tick().await;
            health_check_manager.check_all_health().await;
        }
    });

    let audit_orchestrator = orchestrator.clone();
    let audit_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(30));
        loop {
            ticker.tick().await;
            audit_orchestrator.persist_audit().await;
        }
    });

    let llm_health_manager = fallback_manager.clone();
    let app = taskgrid::orchestrator::router(orchestrator.clone()).route(
        "/api/llm/health",
        axum::routing::get(move || {
            let manager = llm_health_manager.clone();
            async move { Json(json!({ "providers": manager.provider_snapshots().await })) }
        }),
    );

    let listener = tokio::net::TcpListener::bind(&config.orchestrator.bind_addr).await.context("failed to bind orchestrator HTTP listener")?;
    info!(addr = %config.orchestrator.bind_addr, "orchestrator listening");

    let shutdown_orchestrator = orchestrator.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            shutdown_orchestrator.begin_shutdown();
            info!("shutdown signal received");
        })
        .await
        .context("orchestrator HTTP server failed")?;

    sweep_handles.into_iter().for_each(|h| h.abort());
    slave_health_handle.abort();
    audit_handle.abort();
    Ok(())
}

async fn serve_slave_agent(host: String, port: u16, token: String, config: Config) -> Result<()> {
    let state = Arc::new(SlaveServerState {
        auth_token: token,
        execution_methods: vec!["native"],
        default_timeout: Duration::from_secs(config.slaves.execute_timeout_secs),
    });
    let app = slave_router(state);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await.context("failed to bind slave agent HTTP listener")?;
    info!(addr = %addr, "slave agent listening");
    axum::serve(listener, app).await.context("slave agent HTTP server failed")?;
    Ok(())
}

async fn register_slave(_master: String, host: String, port: u16, token: String, install_method: String, config: Config) -> Result<()> {
    let install_method = match install_method.as_str() {
        "docker" => InstallMethod::Docker,
        "venv" => InstallMethod::Venv,
        _ => InstallMethod::Native,
    };

    let data_dir = persistence::data_dir();
    let master_version = MasterVersion::capture();
    let notifier = Arc::new(TracingNotifier);
    let manager = SlaveManager::new(config.slaves.clone(), notifier, master_version, data_dir);

    let slave_id = manager.register_slave("shell_slave", host, port, token, install_method).await.context("failed to register slave")?;
    println!("registered slave {slave_id}");
    println!("restart a running master to pick up the new entry from slaves/config.json");
    Ok(())
}
