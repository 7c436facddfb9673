use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const API_KEY_ENV: &str = "CLAUDE_API_KEY";


#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to read config {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("Failed to parse config {path}: {source}")]
    Parse { path: PathBuf, source: serde_yaml::Error },
}


#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub anthropic_version: String,
    pub database: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: "https://api.anthropic.com/v1/messages".to_string(),
            model: "claude-3-haiku-20240307".to_string(),
            max_tokens: 1024,
            anthropic_version: "2023-06-01".to_string(),
            database: PathBuf::from("mindtimer.db"),
        }
    }
}

impl Config {
    /// Reads a YAML config file. Keys left out keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| Error::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `path` if given, then applies the API key from the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(config.with_api_key(std::env::var(API_KEY_ENV).ok()))
    }

    /// Overrides the API key when `key` is present and non-blank.
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key);
        }
        self
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "model: claude-3-5-sonnet-latest").unwrap();
        writeln!(file, "database: /tmp/tasks.db").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.model, "claude-3-5-sonnet-latest");
        assert_eq!(config.database, PathBuf::from("/tmp/tasks.db"));
        assert_eq!(config.max_tokens, 1024);
        assert_eq!(config.api_key, None);
    }

    #[test]
    fn bad_yaml_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_tokens: [not a number").unwrap();
        assert!(matches!(Config::from_file(file.path()), Err(Error::Parse { .. })));
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        assert!(matches!(Config::from_file(&path), Err(Error::Read { .. })));
    }

    #[test]
    fn api_key_override() {
        let config = Config::default().with_api_key(Some("sk-test".into()));
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));

        let config = config.with_api_key(Some("  ".into()));
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
    }
}
