//! Configuration loading from TOML files

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Global configuration for corpstats
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub corpus: CorpusConfig,
    pub workdir: WorkdirConfig,
    pub export: ExportConfig,
    pub remote: RemoteConfig,
    pub annotations: AnnotationNames,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    pub id: String,
    /// ISO 639-3 code. Only Swedish corpora carry sense and compound analyses.
    pub language: String,
    /// Explicit source file list; empty means every work directory entry.
    pub source_files: Vec<String>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            language: "swe".into(),
            source_files: Vec::new(),
        }
    }
}

impl CorpusConfig {
    pub fn is_swedish(&self) -> bool {
        self.language.trim() == "swe"
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkdirConfig {
    pub root: PathBuf,
    /// Codec of stored annotation files, if they are compressed.
    pub compression: Option<String>,
}

impl Default for WorkdirConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("sparv-workdir"),
            compression: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub dir: PathBuf,
    pub delimiter: String,
    /// Minimum total count for a row to be written.
    pub cutoff: u64,
    /// Codec id for compressed variants.
    pub compression: String,
    pub workers: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            dir: PathBuf::from("export"),
            delimiter: "\t".to_string(),
            cutoff: 1,
            compression: "gz".to_string(),
            workers: cpus.min(8),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// `svn+<url>` for a repository, `[user@]host` for rsync, empty for local.
    #[serde(deserialize_with = "deserialize_env_var")]
    pub host: String,
    pub dir: String,
    pub marker_dir: PathBuf,
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            dir: String::new(),
            marker_dir: PathBuf::from(".corpstats/markers"),
            timeout_secs: 600,
        }
    }
}

/// Names of the stored annotations each column is read from.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnnotationNames {
    /// One value per token; its length is the token count of a file.
    pub token: String,
    pub word: String,
    pub msd: String,
    pub pos: String,
    pub baseform: String,
    pub lemgram: String,
    pub sense: String,
    pub complemgram: String,
    pub hist_sense: String,
    /// Span-level date, one value per text. Empty when the corpus has no dates.
    pub date: String,
    /// Per token, the index of its text in `date` (empty outside any text).
    pub text_parent: String,
}

impl Default for AnnotationNames {
    fn default() -> Self {
        Self {
            token: "token".into(),
            word: "token.word".into(),
            msd: "token.msd".into(),
            pos: "token.pos".into(),
            baseform: "token.baseform".into(),
            lemgram: "token.lemgram".into(),
            sense: "token.wsd.sense".into(),
            complemgram: "token.saldo.complemgram".into(),
            hist_sense: "token.hist.sense".into(),
            date: String::new(),
            text_parent: "token.text".into(),
        }
    }
}

/// Deserialize a string that may be an environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(expand_env_var(&s).unwrap_or_default())
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./corpstats.toml (current directory)
    /// 2. ~/.config/corpstats/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("corpstats.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "corpstats") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn corpus_id(&self) -> Result<&str> {
        let id = self.corpus.id.trim();
        if id.is_empty() {
            anyhow::bail!("corpus.id must be set in the configuration");
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.workdir.root, PathBuf::from("sparv-workdir"));
        assert_eq!(config.export.delimiter, "\t");
        assert_eq!(config.export.cutoff, 1);
        assert_eq!(config.export.compression, "gz");
        assert!(config.export.workers >= 1 && config.export.workers <= 8);
        assert_eq!(config.remote.timeout_secs, 600);
        assert!(config.remote.host.is_empty());
        assert!(config.corpus.is_swedish());
        assert!(config.annotations.date.is_empty());
    }

    #[test]
    fn expand_env_var_simple() {
        std::env::set_var("CORPSTATS_TEST_HOST", "svn+https://x/repo");
        assert_eq!(
            expand_env_var("${CORPSTATS_TEST_HOST}"),
            Some("svn+https://x/repo".to_string())
        );
        std::env::remove_var("CORPSTATS_TEST_HOST");
    }

    #[test]
    fn expand_env_var_literal() {
        assert_eq!(expand_env_var("literal"), Some("literal".to_string()));
    }

    #[test]
    fn expand_env_var_missing() {
        assert_eq!(expand_env_var("${NONEXISTENT_VAR_12345}"), None);
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
[corpus]
id = "attasidor"
language = "deu"

[export]
delimiter = ","
cutoff = 3
compression = "bz2"
workers = 2

[remote]
host = "user@example.org"
dir = "/srv/stats"

[annotations]
sense = "token.saldo.sense"
date = "text.datefrom"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.corpus_id().unwrap(), "attasidor");
        assert_eq!(config.export.delimiter, ",");
        assert_eq!(config.export.cutoff, 3);
        assert_eq!(config.export.compression, "bz2");
        assert_eq!(config.export.workers, 2);
        assert_eq!(config.remote.host, "user@example.org");
        assert_eq!(config.remote.marker_dir, PathBuf::from(".corpstats/markers"));
        assert_eq!(config.annotations.sense, "token.saldo.sense");
        assert_eq!(config.annotations.word, "token.word");
        assert_eq!(config.annotations.date, "text.datefrom");
        assert_eq!(config.annotations.text_parent, "token.text");
        assert!(!config.corpus.is_swedish());
    }

    #[test]
    fn missing_corpus_id_is_error() {
        assert!(Config::default().corpus_id().is_err());
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpstats.toml");
        std::fs::write(&path, "[corpus]\nid = \"x\"\n").unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.corpus.id, "x");
        assert!(Config::from_file(&dir.path().join("missing.toml")).is_err());
    }
}
