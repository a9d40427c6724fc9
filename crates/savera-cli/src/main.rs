use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "savera", about = "Savera panic detection and support CLI")]
struct Cli {
    /// Talk to saverad on the system bus instead of the session bus
    #[arg(long, global = true)]
    system: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check an image for signs of panic
    Detect {
        /// Image file (PNG, JPEG, ...)
        image: PathBuf,
        /// The image is already a cropped face; skip face detection
        #[arg(long)]
        cropped: bool,
    },
    /// Send a message to the supportive assistant
    Chat {
        /// Message text
        message: String,
    },
    /// Start a fresh conversation
    Reset,
    /// Print the current conversation
    History,
    /// Show daemon status
    Status,
}

#[zbus::proxy(
    interface = "org.savera.Savera1",
    default_service = "org.savera.Savera1",
    default_path = "/org/savera/Savera1"
)]
trait Savera {
    async fn detect_panic(&self, image: &[u8], cropped: bool) -> zbus::Result<String>;
    async fn send_message(&self, message: &str) -> zbus::Result<String>;
    async fn reset_chat(&self) -> zbus::Result<()>;
    async fn chat_history(&self) -> zbus::Result<String>;
    async fn status(&self) -> zbus::Result<String>;
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let connection = if cli.system {
        zbus::Connection::system().await
    } else {
        zbus::Connection::session().await
    }
    .context("failed to connect to D-Bus")?;
    let proxy = SaveraProxy::new(&connection)
        .await
        .context("saverad is not reachable")?;

    match cli.command {
        Commands::Detect { image, cropped } => {
            let bytes = std::fs::read(&image)
                .with_context(|| format!("failed to read {}", image.display()))?;
            tracing::debug!(path = %image.display(), bytes = bytes.len(), cropped, "sending image");
            let json = proxy.detect_panic(&bytes, cropped).await?;
            print_detection(&json)?;
        }
        Commands::Chat { message } => {
            let reply = proxy.send_message(&message).await?;
            println!("{reply}");
        }
        Commands::Reset => {
            proxy.reset_chat().await?;
            println!("Chat history has been reset.");
        }
        Commands::History => {
            let json = proxy.chat_history().await?;
            let turns: Vec<serde_json::Value> = serde_json::from_str(&json)?;
            for turn in turns {
                println!(
                    "[{}] {}",
                    turn["role"].as_str().unwrap_or("?"),
                    turn["content"].as_str().unwrap_or_default()
                );
            }
        }
        Commands::Status => {
            let json = proxy.status().await?;
            let value: serde_json::Value = serde_json::from_str(&json)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }

    Ok(())
}

fn print_detection(json: &str) -> Result<()> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    match value["status"].as_str() {
        Some("panic") => {
            println!("Panic detected.");
            if let Some(suggestion) = value["suggestion"].as_str() {
                println!("\n{suggestion}");
            }
        }
        Some("no-face-detected") => println!("No face detected."),
        _ => println!("No panic detected."),
    }
    if let Some(faces) = value["faces"].as_array() {
        for face in faces {
            let c = &face["classification"];
            println!(
                "  face {}: score={:.4} threshold={:.2} panic={}",
                face["index"].as_u64().unwrap_or(0) + 1,
                c["score"].as_f64().unwrap_or(0.0),
                c["threshold_used"].as_f64().unwrap_or(0.0),
                c["is_panic"].as_bool().unwrap_or(false),
            );
        }
    }
    Ok(())
}
