use crate::error::{Result, UiRefineError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_FIGMA_BASE_URL: &str = "https://api.figma.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub api_key: Option<String>,
    pub figma_token: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
    /// 改善理由の最大文字数
    pub reasoning_max_chars: usize,
    pub gemini_base_url: String,
    pub figma_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            figma_token: None,
            model: "gemini-2.0-flash".into(),
            temperature: 0.2,
            timeout_seconds: 120,
            reasoning_max_chars: ui_refine_common::analyzer::DEFAULT_REASONING_MAX_CHARS,
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.into(),
            figma_base_url: DEFAULT_FIGMA_BASE_URL.into(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| UiRefineError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("ui-refine").join("config.json"))
    }

    pub fn get_api_key(&self) -> Result<String> {
        // 環境変数を優先
        if let Some(key) = env_value("GEMINI_API_KEY") {
            return Ok(key);
        }

        self.api_key.clone().ok_or(UiRefineError::MissingApiKey)
    }

    pub fn get_figma_token(&self) -> Result<String> {
        if let Some(token) = env_value("FIGMA_TOKEN") {
            return Ok(token);
        }

        self.figma_token.clone().ok_or(UiRefineError::MissingFigmaToken)
    }

    pub fn set_api_key(&mut self, key: String) -> Result<()> {
        self.api_key = Some(key);
        self.save()
    }

    pub fn set_figma_token(&mut self, token: String) -> Result<()> {
        self.figma_token = Some(token);
        self.save()
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
