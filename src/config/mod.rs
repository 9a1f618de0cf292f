//! Configuration (layered: CLI flags > config file > environment > defaults).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default model when neither the CLI nor the config file names one.
pub const DEFAULT_MODEL: &str = "claude-3-7-sonnet-20250219";
/// Default step budget per turn.
pub const DEFAULT_MAX_STEPS: usize = 100;
/// Default embedding model for semantic memory.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";

/// Values read from `config.toml`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileSettings {
    pub model: Option<String>,
    pub max_steps: Option<usize>,
    pub max_tokens: Option<u32>,
    pub system: Option<String>,
    pub db_path: Option<PathBuf>,
    pub embedding_model: Option<String>,
}

/// Resolved configuration for Parley.
#[derive(Debug, Clone, Default)]
pub struct ParleyConfig {
    api_keys: HashMap<String, String>,
    base_urls: HashMap<String, String>,
    pub settings: FileSettings,
    home_dir: Option<PathBuf>,
    config_override: Option<PathBuf>,
}

const ENV_KEY_MAPPINGS: &[(&str, &str)] = &[
    ("ANTHROPIC_API_KEY", "anthropic"),
    ("OPENAI_API_KEY", "openai"),
    ("GOOGLE_GENERATIVE_AI_API_KEY", "google"),
    ("GOOGLE_API_KEY", "google"),
    ("GEMINI_API_KEY", "google"),
    ("DEEPSEEK_API_KEY", "deepseek"),
];

const ENV_URL_MAPPINGS: &[(&str, &str)] = &[
    ("ANTHROPIC_BASE_URL", "anthropic"),
    ("OPENAI_BASE_URL", "openai"),
    ("GOOGLE_BASE_URL", "google"),
    ("DEEPSEEK_BASE_URL", "deepseek"),
];

impl ParleyConfig {
    /// Load `.env`, the process environment and the config file.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let mut config = Self::from_vars(std::env::vars());
        let path = config.config_path();
        config.settings = read_settings(&path)?;
        Ok(config)
    }

    /// Build from explicit `(name, value)` pairs, as found in the environment.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.into()))
            .collect();

        let mut config = Self::default();
        // First mapping wins when several variables feed one provider.
        for (env_var, provider) in ENV_KEY_MAPPINGS.iter().rev() {
            if let Some(key) = vars.get(*env_var).filter(|v| !v.is_empty()) {
                config.set_api_key(provider, key.clone());
            }
        }
        for (env_var, provider) in ENV_URL_MAPPINGS {
            if let Some(url) = vars.get(*env_var).filter(|v| !v.is_empty()) {
                config.set_base_url(provider, url.clone());
            }
        }
        config.home_dir = vars.get("PARLEY_HOME").map(PathBuf::from);
        config.config_override = vars.get("PARLEY_CONFIG").map(PathBuf::from);
        config
    }

    pub fn set_api_key(&mut self, provider: &str, key: String) {
        self.api_keys.insert(provider.to_string(), key);
    }

    pub fn get_api_key(&self, provider: &str) -> Option<String> {
        self.api_keys.get(provider).cloned()
    }

    pub fn set_base_url(&mut self, provider: &str, url: String) {
        self.base_urls.insert(provider.to_string(), url);
    }

    pub fn get_base_url(&self, provider: &str) -> Option<String> {
        self.base_urls.get(provider).cloned()
    }

    pub fn has_credentials(&self, provider: &str) -> bool {
        self.api_keys.contains_key(provider)
    }

    /// Directory holding the config file and default databases.
    pub fn home_dir(&self) -> PathBuf {
        self.home_dir.clone().unwrap_or_else(default_parley_dir)
    }

    /// Location of `config.toml`.
    pub fn config_path(&self) -> PathBuf {
        self.config_override
            .clone()
            .unwrap_or_else(|| self.home_dir().join("config.toml"))
    }

    /// Database used for `--memory` when no `--db` is given.
    pub fn default_db_path(&self) -> PathBuf {
        self.settings
            .db_path
            .clone()
            .unwrap_or_else(|| self.home_dir().join("memory.db"))
    }

    pub fn model(&self) -> &str {
        self.settings.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn max_steps(&self) -> usize {
        self.settings.max_steps.unwrap_or(DEFAULT_MAX_STEPS)
    }

    pub fn embedding_model(&self) -> &str {
        self.settings
            .embedding_model
            .as_deref()
            .unwrap_or(DEFAULT_EMBEDDING_MODEL)
    }
}

/// Read `config.toml`; a missing file yields defaults.
pub fn read_settings(path: &Path) -> Result<FileSettings> {
    let raw = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(FileSettings::default())
        }
        Err(err) => return Err(err.into()),
    };
    let settings = toml::from_str(&raw)?;
    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(settings)
}

fn default_parley_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".parley"))
        .unwrap_or_else(|| PathBuf::from(".parley"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn env_vars_map_to_providers() {
        let config = ParleyConfig::from_vars([
            ("ANTHROPIC_API_KEY", "sk-ant"),
            ("GEMINI_API_KEY", "gem-low"),
            ("GOOGLE_GENERATIVE_AI_API_KEY", "gem-high"),
            ("OPENAI_BASE_URL", "http://localhost:9999/v1"),
            ("UNRELATED", "x"),
        ]);
        assert_eq!(config.get_api_key("anthropic").as_deref(), Some("sk-ant"));
        assert_eq!(config.get_api_key("google").as_deref(), Some("gem-high"));
        assert_eq!(
            config.get_base_url("openai").as_deref(),
            Some("http://localhost:9999/v1")
        );
        assert!(!config.has_credentials("deepseek"));
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let config = ParleyConfig::from_vars([("OPENAI_API_KEY", "")]);
        assert_eq!(config.get_api_key("openai"), None);
    }

    #[test]
    fn defaults_apply_without_file_settings() {
        let config = ParleyConfig::from_vars([("PARLEY_HOME", "/tmp/parley-home")]);
        assert_eq!(config.model(), DEFAULT_MODEL);
        assert_eq!(config.max_steps(), 100);
        assert_eq!(config.embedding_model(), "text-embedding-ada-002");
        assert_eq!(
            config.default_db_path(),
            PathBuf::from("/tmp/parley-home/memory.db")
        );
        assert_eq!(
            config.config_path(),
            PathBuf::from("/tmp/parley-home/config.toml")
        );
    }

    #[test]
    fn config_file_values_are_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "model = \"deepseek\"\nmax_steps = 7\ndb_path = \"/data/p.db\"\n",
        )
        .unwrap();

        let settings = read_settings(&path).unwrap();
        assert_eq!(settings.model.as_deref(), Some("deepseek"));
        assert_eq!(settings.max_steps, Some(7));
        assert_eq!(settings.db_path, Some(PathBuf::from("/data/p.db")));
    }

    #[test]
    fn missing_config_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = read_settings(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings, FileSettings::default());
    }

    #[test]
    fn unknown_keys_in_config_file_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "modle = \"typo\"\n").unwrap();
        assert!(matches!(
            read_settings(&path),
            Err(crate::error::ParleyError::ConfigFile(_))
        ));
    }

    #[test]
    fn explicit_config_path_overrides_home() {
        let config = ParleyConfig::from_vars([
            ("PARLEY_HOME", "/tmp/h"),
            ("PARLEY_CONFIG", "/etc/parley.toml"),
        ]);
        assert_eq!(config.config_path(), PathBuf::from("/etc/parley.toml"));
    }
}
