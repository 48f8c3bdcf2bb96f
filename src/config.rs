use std::env;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {0}: '{1}'")]
    Invalid(&'static str, String),
}

#[derive(Clone, Debug)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub db: DbConfig,
    pub bind_addr: String,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    /// Network path to the Open Dental image store (patient photos).
    pub image_root: PathBuf,
    pub briefing_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match env::var("DB_PORT") {
            Ok(s) => s
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid("DB_PORT", s))?,
            Err(_) => 3306,
        };

        let db = DbConfig {
            host: require("DB_HOST")?,
            port,
            user: require("DB_USER")?,
            password: env::var("DB_PASSWORD").unwrap_or_default(),
            name: require("DB_NAME")?,
        };

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let anthropic_api_key = env::var("ANTHROPIC_API_KEY").ok().filter(|k| !k.is_empty());
        let anthropic_model =
            env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| "claude-opus-5".to_string());
        let image_root = env::var("OPENDENT_IMAGE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/mnt/opendent-images"));
        let briefing_dir = env::var("BRIEFING_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("logs"));

        Ok(Self {
            db,
            bind_addr,
            anthropic_api_key,
            anthropic_model,
            image_root,
            briefing_dir,
        })
    }

    /// Briefing mode needs credentials the plain JSON report does not.
    pub fn require_narration_key(&self) -> Result<&str, ConfigError> {
        self.anthropic_api_key
            .as_deref()
            .ok_or(ConfigError::Missing("ANTHROPIC_API_KEY"))
    }
}

fn require(key: &'static str) -> Result<String, ConfigError> {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(key))
}
