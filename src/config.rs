use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable holding the Gemini credential.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub tagging: TaggingConfig,
    #[serde(default)]
    pub records: RecordsConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: PathBuf,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_merged_file")]
    pub merged_file: PathBuf,
    /// Defaults to `<data_dir>/ai_filtered_results.json`.
    #[serde(default)]
    pub records_file: PathBuf,
    /// Defaults to `<data_dir>/verification_report.json`.
    #[serde(default)]
    pub report_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let mut paths = Self {
            downloads_dir: default_downloads_dir(),
            data_dir: default_data_dir(),
            merged_file: default_merged_file(),
            records_file: PathBuf::new(),
            report_file: PathBuf::new(),
        };
        paths.resolve();
        paths
    }
}

impl PathsConfig {
    /// Fill artifact paths left unset from `data_dir`.
    pub fn resolve(&mut self) {
        if self.records_file.as_os_str().is_empty() {
            self.records_file = self.data_dir.join(RECORDS_FILE_NAME);
        }
        if self.report_file.as_os_str().is_empty() {
            self.report_file = self.data_dir.join(REPORT_FILE_NAME);
        }
    }
}

const RECORDS_FILE_NAME: &str = "ai_filtered_results.json";
const REPORT_FILE_NAME: &str = "verification_report.json";

fn default_downloads_dir() -> PathBuf {
    PathBuf::from("downloads")
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_merged_file() -> PathBuf {
    PathBuf::from("downloads/merged_output.txt")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_target_size")]
    pub target_size: usize,
    #[serde(default = "default_max_size")]
    pub max_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_size: default_target_size(),
            max_size: default_max_size(),
        }
    }
}

fn default_target_size() -> usize {
    1000
}
fn default_max_size() -> usize {
    1500
}

#[derive(Debug, Deserialize, Clone)]
pub struct TaggingConfig {
    /// `auto`, `rules`, or `gemini`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

impl Default for TaggingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            max_input_chars: default_max_input_chars(),
        }
    }
}

fn default_provider() -> String {
    "auto".to_string()
}
fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    1
}
fn default_max_input_chars() -> usize {
    2000
}

impl TaggingConfig {
    /// Resolve `auto` against the environment: Gemini only when a credential is present.
    pub fn resolved_provider(&self) -> &str {
        match self.provider.as_str() {
            "auto" => {
                if gemini_api_key().is_some() {
                    "gemini"
                } else {
                    "rules"
                }
            }
            other => other,
        }
    }
}

/// Returns the Gemini credential if set and non-blank.
pub fn gemini_api_key() -> Option<String> {
    std::env::var(GEMINI_API_KEY_ENV)
        .ok()
        .filter(|k| !k.trim().is_empty())
}

#[derive(Debug, Deserialize, Clone)]
pub struct RecordsConfig {
    #[serde(default = "default_sample_chars")]
    pub sample_chars: usize,
    #[serde(default = "default_summary_chars")]
    pub summary_chars: usize,
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            sample_chars: default_sample_chars(),
            summary_chars: default_summary_chars(),
        }
    }
}

fn default_sample_chars() -> usize {
    500
}
fn default_summary_chars() -> usize {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec!["*.pdf".to_string()]
}

impl Config {
    /// Built-in defaults, used when no config file is present.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.paths.resolve();
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.target_size == 0 {
        anyhow::bail!("chunking.target_size must be > 0");
    }
    if config.chunking.max_size < config.chunking.target_size {
        anyhow::bail!(
            "chunking.max_size ({}) must be >= chunking.target_size ({})",
            config.chunking.max_size,
            config.chunking.target_size
        );
    }

    if config.tagging.timeout_secs == 0 {
        anyhow::bail!("tagging.timeout_secs must be > 0");
    }
    if config.tagging.max_retries > 1 {
        anyhow::bail!("tagging.max_retries must be 0 or 1");
    }
    if config.tagging.max_input_chars == 0 {
        anyhow::bail!("tagging.max_input_chars must be > 0");
    }

    // The Gemini credential is checked when the capability is built, so
    // rules-only runs work against a gemini config without a key.
    match config.tagging.provider.as_str() {
        "auto" | "rules" | "gemini" => {}
        other => anyhow::bail!(
            "Unknown tagging provider: '{}'. Must be auto, rules, or gemini.",
            other
        ),
    }

    if config.records.sample_chars == 0 {
        anyhow::bail!("records.sample_chars must be > 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = write_config("");
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.chunking.target_size, 1000);
        assert_eq!(cfg.chunking.max_size, 1500);
        assert_eq!(cfg.records.sample_chars, 500);
        assert_eq!(cfg.tagging.max_retries, 1);
        assert_eq!(cfg.paths.records_file, PathBuf::from("data/ai_filtered_results.json"));
    }

    #[test]
    fn test_max_below_target_rejected() {
        let file = write_config("[chunking]\ntarget_size = 800\nmax_size = 400\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("max_size"));
    }

    #[test]
    fn test_unbounded_retries_rejected() {
        let file = write_config("[tagging]\nprovider = \"rules\"\nmax_retries = 3\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let file = write_config("[tagging]\nprovider = \"openai\"\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("Unknown tagging provider"));
    }

    #[test]
    fn test_rules_provider_resolves_to_itself() {
        let file = write_config("[tagging]\nprovider = \"rules\"\n");
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.tagging.resolved_provider(), "rules");
    }

    #[test]
    fn test_artifact_paths_follow_data_dir() {
        let file = write_config("[paths]\ndata_dir = \"out\"\n");
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.paths.records_file, PathBuf::from("out/ai_filtered_results.json"));
        assert_eq!(cfg.paths.report_file, PathBuf::from("out/verification_report.json"));
    }

    #[test]
    fn test_explicit_artifact_path_wins_over_data_dir() {
        let file = write_config(
            "[paths]\ndata_dir = \"out\"\nrecords_file = \"elsewhere/records.json\"\n",
        );
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.paths.records_file, PathBuf::from("elsewhere/records.json"));
        assert_eq!(cfg.paths.report_file, PathBuf::from("out/verification_report.json"));
    }

    #[test]
    fn test_gemini_provider_loads_without_credential() {
        let file = write_config("[tagging]\nprovider = \"gemini\"\n");
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.tagging.provider, "gemini");
    }
}
