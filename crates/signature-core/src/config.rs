use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

pub const DEFAULT_API_BASE: &str = "https://ia-signature-ia-back.hf.space";
pub const DEFAULT_CHAT_URL: &str = "http://localhost:8000/generate";
pub const DEFAULT_KNOWLEDGE_GRAPH_URL: &str = "https://ia-signature-analyse-agent.hf.space";

const API_BASE_ENV: &str = "SIGNATURE_API_BASE";
const CHAT_URL_ENV: &str = "SIGNATURE_CHAT_URL";

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub api_base: Option<String>,
    pub chat_url: Option<String>,
    pub knowledge_graph_url: Option<String>,
}

/// Fully resolved service URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub chat: String,
    pub whatif_chat: String,
    pub whatif_alternatives: String,
    pub riddle: String,
    pub verify: String,
    pub artworks: String,
    pub knowledge_graph: String,
}

impl Endpoints {
    pub fn artworks_url(&self, artist: &str) -> String {
        format!("{}/{}", self.artworks, artist)
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    /// Resolve endpoints, letting environment variables win over the file.
    pub fn endpoints(&self) -> Endpoints {
        self.resolve_endpoints(|key| std::env::var(key).ok())
    }

    fn resolve_endpoints(&self, env: impl Fn(&str) -> Option<String>) -> Endpoints {
        let base = env(API_BASE_ENV)
            .or_else(|| self.api_base.clone())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let base = base.trim_end_matches('/');

        let chat = env(CHAT_URL_ENV)
            .or_else(|| self.chat_url.clone())
            .unwrap_or_else(|| DEFAULT_CHAT_URL.to_string());

        let knowledge_graph = self
            .knowledge_graph_url
            .clone()
            .unwrap_or_else(|| DEFAULT_KNOWLEDGE_GRAPH_URL.to_string());

        Endpoints {
            chat,
            whatif_chat: format!("{}/whatif_chat", base),
            whatif_alternatives: format!("{}/whatif", base),
            riddle: format!("{}/generate_sphinx", base),
            verify: format!("{}/verify_sphinx", base),
            artworks: format!("{}/artworks", base),
            knowledge_graph,
        }
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("ia-signature").join("config.json"))
    }
}
