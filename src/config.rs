use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub backend: BackendConfig,
  /// Custom title for header (defaults to the backend host if not set)
  pub title: Option<String>,
  /// Rows requested per page in list views
  #[serde(default = "default_page_size")]
  pub page_size: u64,
  /// Log level used when RUST_LOG is not set
  #[serde(default = "default_log_level")]
  pub log_level: String,
  /// Extra parameter groups to load at startup
  #[serde(default)]
  pub reference_groups: Vec<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
  /// Base URL of the REST API, e.g. https://hr.example.com/api
  pub url: String,
  /// HTTP client timeout in seconds
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_page_size() -> u64 {
  20
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_timeout_secs() -> u64 {
  30
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./talentdesk.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/talentdesk/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/talentdesk/config.yaml\n\
                 See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("talentdesk.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("talentdesk").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    if config.backend.url.trim().is_empty() {
      return Err(eyre!("backend.url must not be empty"));
    }
    Ok(config)
  }

  /// Get the API token from the environment, if one is set.
  ///
  /// Checks TALENTDESK_TOKEN. Requests go out unauthenticated without it.
  pub fn get_api_token() -> Option<String> {
    std::env::var("TALENTDESK_TOKEN")
      .ok()
      .filter(|token| !token.trim().is_empty())
  }

  /// Title shown in the header
  pub fn display_title(&self) -> &str {
    self.title.as_deref().unwrap_or("talentdesk")
  }
}
