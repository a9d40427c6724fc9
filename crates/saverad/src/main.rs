use anyhow::{Context, Result};
use savera_core::{ChatSession, OllamaAssistant};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;

const BUS_NAME: &str = "org.savera.Savera1";
const OBJECT_PATH: &str = "/org/savera/Savera1";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("saverad starting");

    let config = config::Config::from_env();
    tracing::info!(
        model_dir = %config.model_dir.display(),
        base_threshold = config.detection.base_threshold,
        scale_factor = config.detection.scale_factor,
        min_neighbors = config.detection.min_neighbors,
        "configuration loaded"
    );

    let engine = engine::spawn_engine(
        &config.scrfd_model_path(),
        &config.panic_model_path(),
        config.detection.clone(),
    )
    .context("failed to start detection engine")?;

    let assistant = OllamaAssistant::new(config.ollama_url.clone(), config.chat_model.clone());
    tracing::info!(url = %config.ollama_url, model = assistant.model(), "chat assistant configured");
    let chat = ChatSession::new(config.chat.clone(), Arc::new(assistant));

    let service = dbus_interface::SaveraService::new(engine, chat, config.chat_model.clone());

    let builder = if config.system_bus {
        zbus::connection::Builder::system()?
    } else {
        zbus::connection::Builder::session()?
    };
    let _connection = builder
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, service)?
        .build()
        .await
        .context("failed to register D-Bus service")?;

    tracing::info!(bus_name = BUS_NAME, path = OBJECT_PATH, system_bus = config.system_bus, "saverad ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("saverad shutting down");

    Ok(())
}
