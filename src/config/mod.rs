//! Configuration management.

use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration for atomnote.
#[derive(Debug, Clone)]
pub struct AtomnoteConfig {
    /// Path to the vault root directory.
    pub vault_path: PathBuf,
    /// Vault-relative folder for plan documents.
    pub plans_folder: String,
    /// Vault-relative folder for generated note drafts.
    pub drafts_folder: String,
    /// Vault-relative folder for note templates.
    pub templates_folder: String,
    /// Vault-relative path of the hierarchy index document.
    pub hierarchy_index_path: String,
    /// Vault-relative path of the activity log document.
    pub activity_log_path: String,
    /// Recognized source-section heading markers, checked in order.
    pub source_headings: Vec<String>,
    /// The default note kind that needs no template resolution.
    pub default_kind: String,
    /// LLM provider configuration.
    pub llm: LlmConfig,
}

/// LLM provider configuration.
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    /// Provider name: "anthropic" or "openai".
    pub provider: Provider,
    /// Model name.
    pub model: Option<String>,
    /// API key. Falls back to the provider's environment variable.
    pub api_key: Option<String>,
    /// Base URL for the provider (for self-hosted gateways).
    pub base_url: Option<String>,
    /// Maximum number of retries for transient overload errors.
    pub max_retries: Option<u32>,
    /// Initial retry backoff in milliseconds.
    pub initial_delay_ms: Option<u64>,
}

/// Available completion backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provider {
    /// Anthropic Claude.
    #[default]
    Anthropic,
    /// `OpenAI` GPT.
    OpenAi,
}

impl Provider {
    /// Parses a provider string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "openai" => Self::OpenAi,
            _ => Self::Anthropic,
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Vault root path.
    pub vault_path: Option<String>,
    /// Plans folder.
    pub plans_folder: Option<String>,
    /// Drafts folder.
    pub drafts_folder: Option<String>,
    /// Templates folder.
    pub templates_folder: Option<String>,
    /// Hierarchy index path.
    pub hierarchy_index_path: Option<String>,
    /// Activity log path.
    pub activity_log_path: Option<String>,
    /// Source heading markers.
    pub source_headings: Option<Vec<String>>,
    /// Default note kind.
    pub default_kind: Option<String>,
    /// LLM configuration.
    pub llm: Option<ConfigFileLlm>,
}

/// LLM section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLlm {
    /// Provider name.
    pub provider: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// API key.
    pub api_key: Option<String>,
    /// Base URL.
    pub base_url: Option<String>,
    /// Maximum retries.
    pub max_retries: Option<u32>,
    /// Initial backoff delay in milliseconds.
    pub initial_delay_ms: Option<u64>,
}

impl Default for AtomnoteConfig {
    fn default() -> Self {
        Self {
            vault_path: PathBuf::from("."),
            plans_folder: "Plans".to_string(),
            drafts_folder: "Drafts".to_string(),
            templates_folder: "Templates".to_string(),
            hierarchy_index_path: "Hierarchy.md".to_string(),
            activity_log_path: "Activity Log.md".to_string(),
            source_headings: vec![
                "## Raw Notes".to_string(),
                "## Transcript".to_string(),
                "## Source".to_string(),
            ],
            default_kind: "Standard".to_string(),
            llm: LlmConfig::default(),
        }
    }
}

impl AtomnoteConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &std::path::Path) -> crate::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| crate::Error::OperationFailed {
                operation: "read_config_file".to_string(),
                cause: e.to_string(),
            })?;

        let file: ConfigFile =
            toml::from_str(&contents).map_err(|e| crate::Error::OperationFailed {
                operation: "parse_config_file".to_string(),
                cause: e.to_string(),
            })?;

        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the platform config dir, then `~/.config/atomnote/config.toml`.
    /// Returns default configuration if no config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let platform_config = base_dirs.config_dir().join("atomnote").join("config.toml");
        if platform_config.exists() {
            if let Ok(config) = Self::load_from_file(&platform_config) {
                return config;
            }
        }

        let xdg_config = base_dirs
            .home_dir()
            .join(".config")
            .join("atomnote")
            .join("config.toml");
        if xdg_config.exists() {
            if let Ok(config) = Self::load_from_file(&xdg_config) {
                return config;
            }
        }

        Self::default()
    }

    /// Converts a `ConfigFile` to `AtomnoteConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(vault_path) = file.vault_path {
            config.vault_path = PathBuf::from(vault_path);
        }
        if let Some(plans_folder) = file.plans_folder {
            config.plans_folder = plans_folder;
        }
        if let Some(drafts_folder) = file.drafts_folder {
            config.drafts_folder = drafts_folder;
        }
        if let Some(templates_folder) = file.templates_folder {
            config.templates_folder = templates_folder;
        }
        if let Some(path) = file.hierarchy_index_path {
            config.hierarchy_index_path = path;
        }
        if let Some(path) = file.activity_log_path {
            config.activity_log_path = path;
        }
        if let Some(headings) = file.source_headings {
            if !headings.is_empty() {
                config.source_headings = headings;
            }
        }
        if let Some(kind) = file.default_kind {
            config.default_kind = kind;
        }
        if let Some(llm) = file.llm {
            if let Some(provider) = llm.provider {
                config.llm.provider = Provider::parse(&provider);
            }
            config.llm.model = llm.model;
            config.llm.api_key = llm.api_key;
            config.llm.base_url = llm.base_url;
            config.llm.max_retries = llm.max_retries;
            config.llm.initial_delay_ms = llm.initial_delay_ms;
        }

        config
    }

    /// Sets the vault path.
    #[must_use]
    pub fn with_vault_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.vault_path = path.into();
        self
    }

    /// Sets the drafts folder.
    #[must_use]
    pub fn with_drafts_folder(mut self, folder: impl Into<String>) -> Self {
        self.drafts_folder = folder.into();
        self
    }

    /// Sets the plans folder.
    #[must_use]
    pub fn with_plans_folder(mut self, folder: impl Into<String>) -> Self {
        self.plans_folder = folder.into();
        self
    }

    /// Sets the templates folder.
    #[must_use]
    pub fn with_templates_folder(mut self, folder: impl Into<String>) -> Self {
        self.templates_folder = folder.into();
        self
    }

    /// Vault-relative path of the drafts subfolder for template drafts.
    #[must_use]
    pub fn template_drafts_folder(&self) -> String {
        format!("{}/Drafts", self.templates_folder)
    }

    /// Vault-relative template path for a note kind.
    #[must_use]
    pub fn template_path(&self, kind: &str) -> String {
        format!("{}/{kind} Template.md", self.templates_folder)
    }
}
