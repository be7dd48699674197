use crate::domain::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_MIN_CONFIDENCE: u8 = 85;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Root for the database and artifact payloads. Defaults to the app data dir.
    pub data_dir: Option<PathBuf>,
    pub llm: LlmConfig,
    pub labeling: LabelingConfig,
    pub paper_search: PaperSearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    pub labeler_model: String,
    pub critic_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            labeler_model: "gpt-5-mini".to_string(),
            critic_model: "gpt-5-mini".to_string(),
            temperature: 0.1,
            max_tokens: 4096,
            timeout_secs: 60,
        }
    }
}

/// Knobs of the labeling pipeline. Passed explicitly to the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelingConfig {
    /// Minimum critic confidence (0-100) for an accept to count
    pub min_confidence: u8,
    /// Maximum number of labeling attempts that may be consumed
    pub max_retries: u32,
    /// Directory with `<task_type>.json` rubric files
    pub rubric_dir: Option<PathBuf>,
}

impl Default for LabelingConfig {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            max_retries: DEFAULT_MAX_RETRIES,
            rubric_dir: None,
        }
    }
}

impl LabelingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_confidence > 100 {
            return Err(ConfigError::InvalidValue {
                field: "labeling.min_confidence".into(),
                message: format!("{} is outside 0..=100", self.min_confidence),
            });
        }
        if self.max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "labeling.max_retries".into(),
                message: "at least one attempt is required".into(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperSearchConfig {
    pub enabled: bool,
    /// Providers tried in order; the first non-empty result wins
    pub providers: Vec<String>,
    pub limit: usize,
    pub timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_scholar_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openalex_email: Option<String>,
}

impl Default for PaperSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            providers: vec!["semantic_scholar".to_string(), "openalex".to_string()],
            limit: 8,
            timeout_secs: 10,
            semantic_scholar_api_key: None,
            openalex_email: None,
        }
    }
}

impl AppConfig {
    /// Directory holding the database and the project payload tree.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(app_data_dir)
    }

    pub fn db_path(&self) -> PathBuf {
        if let Ok(path) = std::env::var("PAPERTRAIL_DB_PATH") {
            return PathBuf::from(path);
        }
        self.data_dir().join("papertrail.db")
    }

    pub fn projects_dir(&self) -> PathBuf {
        self.data_dir().join("projects")
    }

    /// Apply environment overrides on top of file values.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(key) = get("OPENAI_API_KEY").filter(|v| !v.is_empty()) {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = get("OPENAI_BASE_URL").filter(|v| !v.is_empty()) {
            self.llm.base_url = url;
        }
        if let Some(model) = get("LABELER_MODEL").filter(|v| !v.is_empty()) {
            self.llm.labeler_model = model;
        }
        if let Some(model) = get("CRITIC_MODEL").filter(|v| !v.is_empty()) {
            self.llm.critic_model = model;
        }
        if let Some(t) = get("TEMPERATURE").and_then(|v| v.parse().ok()) {
            self.llm.temperature = t;
        }
        if let Some(n) = get("MAX_TOKENS").and_then(|v| v.parse().ok()) {
            self.llm.max_tokens = n;
        }
        if let Some(key) = get("SEMANTIC_SCHOLAR_API_KEY").filter(|v| !v.is_empty()) {
            self.paper_search.semantic_scholar_api_key = Some(key);
        }
        if let Some(email) = get("OPENALEX_EMAIL").filter(|v| !v.is_empty()) {
            self.paper_search.openalex_email = Some(email);
        }
    }
}

/// Load the config file (defaults when missing or invalid) and apply env overrides.
pub fn load_config() -> AppConfig {
    let path = config_path();
    let mut config = match std::fs::read_to_string(&path) {
        Ok(contents) => toml::from_str(&contents).unwrap_or_else(|err| {
            log::warn!("Ignoring invalid config at {}: {}", path.display(), err);
            AppConfig::default()
        }),
        Err(_) => AppConfig::default(),
    };
    config.apply_env();
    config
}

pub fn save_config(config: &AppConfig) -> std::io::Result<()> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = toml::to_string_pretty(config).unwrap_or_default();
    std::fs::write(path, contents)
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("PAPERTRAIL_CONFIG_PATH") {
        return PathBuf::from(path);
    }

    app_data_dir().join("config.toml")
}

fn app_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var("PAPERTRAIL_DATA_HOME") {
        return PathBuf::from(path);
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = home::home_dir() {
            return home
                .join("Library")
                .join("Application Support")
                .join("PaperTrail");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("PaperTrail");
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Some(xdg) = std::env::var_os("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("papertrail");
        }
        if let Some(home) = home::home_dir() {
            return home.join(".local").join("share").join("papertrail");
        }
    }

    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".papertrail")
}
