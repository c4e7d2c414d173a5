use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use homedir::my_home;
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_VOCABULARY_PATH: &str = "vocabulary.json";
const DEFAULT_CATALOG_URL: &str = "https://api.notion.com/v1";
const DEFAULT_CATALOG_TOKEN_ENV: &str = "NOTION_TOKEN";

const DEFAULT_COMPLETION_URL: &str = "https://api.mistral.ai";
const DEFAULT_COMPLETION_MODEL: &str = "mistral-large-latest";
const DEFAULT_COMPLETION_KEY_ENV: &str = "MISTRAL_API_KEY";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const DEFAULT_LISTEN: &str = "127.0.0.1:8080";

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VocabularySource {
    #[default]
    File,
    Catalog,
}

/// Where the reference vocabulary is loaded from
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VocabularyConfig {
    #[serde(default)]
    pub source: VocabularySource,

    /// File for the `file` source, relative paths resolve against the base dir
    #[serde(default = "default_vocabulary_path")]
    pub path: String,

    #[serde(default = "default_catalog_url")]
    pub catalog_url: String,

    #[serde(default)]
    pub database_id: Option<String>,

    /// Name of the environment variable holding the catalog token
    #[serde(default = "default_catalog_token_env")]
    pub token_env: String,

    /// Periodic refresh in server mode, 0 disables it
    #[serde(default)]
    pub refresh_interval_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            source: VocabularySource::default(),
            path: default_vocabulary_path(),
            catalog_url: default_catalog_url(),
            database_id: None,
            token_env: default_catalog_token_env(),
            refresh_interval_secs: 0,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Completion service used by the fallback parser
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_completion_url")]
    pub base_url: String,

    #[serde(default = "default_completion_model")]
    pub model: String,

    /// Name of the environment variable holding the api key
    #[serde(default = "default_completion_key_env")]
    pub api_key_env: String,

    #[serde(default)]
    pub temperature: f32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_completion_url(),
            model: default_completion_model(),
            api_key_env: default_completion_key_env(),
            temperature: 0.0,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn default_vocabulary_path() -> String {
    DEFAULT_VOCABULARY_PATH.to_string()
}

fn default_catalog_url() -> String {
    DEFAULT_CATALOG_URL.to_string()
}

fn default_catalog_token_env() -> String {
    DEFAULT_CATALOG_TOKEN_ENV.to_string()
}

fn default_completion_url() -> String {
    DEFAULT_COMPLETION_URL.to_string()
}

fn default_completion_model() -> String {
    DEFAULT_COMPLETION_MODEL.to_string()
}

fn default_completion_key_env() -> String {
    DEFAULT_COMPLETION_KEY_ENV.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub vocabulary: VocabularyConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Config {
    /// `$DEALSEARCH_BASE_PATH`, else `~/.local/share/dealsearch`.
    pub fn base_path() -> anyhow::Result<PathBuf> {
        if let Ok(base_path) = std::env::var("DEALSEARCH_BASE_PATH") {
            return Ok(PathBuf::from(base_path));
        }
        let home = my_home()?.context("could not determine home directory")?;
        Ok(home.join(".local/share/dealsearch"))
    }

    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(&Self::base_path()?)
    }

    pub fn load_with(base_path: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(base_path)
            .with_context(|| format!("creating {}", base_path.display()))?;
        let config_path = base_path.join(CONFIG_FILE);

        // create new if does not exist
        if !config_path.exists() {
            std::fs::write(&config_path, serde_yml::to_string(&Self::default())?)?;
        }

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let mut config: Self = serde_yml::from_str(&config_str).context("config is malformed")?;

        config.base_path = base_path.to_path_buf();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_str = serde_yml::to_string(&self)?;
        std::fs::write(self.base_path.join(CONFIG_FILE), config_str)?;
        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        let completion = &self.completion;
        if !(0.0..=2.0).contains(&completion.temperature) {
            bail!(
                "completion.temperature must be between 0.0 and 2.0, got {}",
                completion.temperature
            );
        }
        if completion.timeout_secs == 0 {
            bail!("completion.timeout_secs must be greater than 0");
        }
        url::Url::parse(&completion.base_url)
            .with_context(|| format!("completion.base_url is not a url: {}", completion.base_url))?;

        let vocabulary = &self.vocabulary;
        if vocabulary.timeout_secs == 0 {
            bail!("vocabulary.timeout_secs must be greater than 0");
        }
        if vocabulary.source == VocabularySource::Catalog {
            if vocabulary.database_id.as_deref().unwrap_or_default().is_empty() {
                bail!("vocabulary.database_id is required for the catalog source");
            }
            url::Url::parse(&vocabulary.catalog_url).with_context(|| {
                format!("vocabulary.catalog_url is not a url: {}", vocabulary.catalog_url)
            })?;
        }

        Ok(())
    }

    /// Vocabulary file path, resolved against the base dir.
    pub fn vocabulary_path(&self) -> PathBuf {
        self.base_path.join(&self.vocabulary.path)
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_secs(self.completion.timeout_secs)
    }

    pub fn vocabulary_timeout(&self) -> Duration {
        Duration::from_secs(self.vocabulary.timeout_secs)
    }
}
