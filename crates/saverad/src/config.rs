use savera_core::assistant::{DEFAULT_CHAT_MODEL, DEFAULT_OLLAMA_URL};
use savera_core::config::{
    DEFAULT_BASE_THRESHOLD, DEFAULT_MIN_NEIGHBORS, DEFAULT_MODEL_INPUT_SIZE, DEFAULT_PERSONA,
    DEFAULT_SCALE_FACTOR,
};
use savera_core::{ChatConfig, DetectionConfig};
use std::path::PathBuf;
use std::time::Duration;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    pub detection: DetectionConfig,
    pub chat: ChatConfig,
    /// Base URL of the Ollama server.
    pub ollama_url: String,
    /// Ollama model used for the supportive chat.
    pub chat_model: String,
    /// Register on the system bus instead of the session bus.
    pub system_bus: bool,
}

impl Config {
    /// Load configuration from `SAVERA_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("SAVERA_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share/savera/models")
            });

        let model_input_size = std::env::var("SAVERA_MODEL_INPUT_SIZE")
            .ok()
            .and_then(|v| parse_size(&v))
            .unwrap_or(DEFAULT_MODEL_INPUT_SIZE);

        Self {
            model_dir,
            detection: DetectionConfig {
                base_threshold: env_parse("SAVERA_BASE_THRESHOLD", DEFAULT_BASE_THRESHOLD),
                model_input_size,
                scale_factor: env_parse("SAVERA_SCALE_FACTOR", DEFAULT_SCALE_FACTOR),
                min_neighbors: env_parse("SAVERA_MIN_NEIGHBORS", DEFAULT_MIN_NEIGHBORS),
            },
            chat: ChatConfig {
                persona_text: std::env::var("SAVERA_PERSONA")
                    .unwrap_or_else(|_| DEFAULT_PERSONA.to_string()),
                timeout: Duration::from_secs(env_parse("SAVERA_CHAT_TIMEOUT_SECS", 60u64)),
            },
            ollama_url: std::env::var("SAVERA_OLLAMA_URL")
                .unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string()),
            chat_model: std::env::var("SAVERA_CHAT_MODEL")
                .unwrap_or_else(|_| DEFAULT_CHAT_MODEL.to_string()),
            system_bus: std::env::var("SAVERA_SYSTEM_BUS")
                .map(|v| v != "0")
                .unwrap_or(false),
        }
    }

    /// Path to the SCRFD detection model.
    pub fn scrfd_model_path(&self) -> String {
        self.model_dir
            .join("det_10g.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the panic classifier.
    pub fn panic_model_path(&self) -> String {
        self.model_dir
            .join("panic_detector_cnn.onnx")
            .to_string_lossy()
            .into_owned()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parse `48x48` (or `48`) into (width, height).
fn parse_size(value: &str) -> Option<(u32, u32)> {
    let value = value.trim();
    let (w, h) = match value.split_once(['x', 'X']) {
        Some((w, h)) => (w.trim().parse().ok()?, h.trim().parse().ok()?),
        None => {
            let side = value.parse().ok()?;
            (side, side)
        }
    };
    (w > 0 && h > 0).then_some((w, h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("48x48"), Some((48, 48)));
        assert_eq!(parse_size("64X32"), Some((64, 32)));
        assert_eq!(parse_size(" 96 "), Some((96, 96)));
        assert_eq!(parse_size("0x48"), None);
        assert_eq!(parse_size("abc"), None);
    }
}
