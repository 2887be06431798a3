use crate::backend::api_types::{ApiEnvelope, ApiPage, ApiParameter, ApiRequirement, ApiTalent};
use crate::backend::types::{ListQuery, Page, Requirement, Talent, TalentSummary};
use crate::config::Config;
use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Back-office REST API client
#[derive(Clone)]
pub struct BackendClient {
  http: reqwest::Client,
  base_url: Url,
  token: Option<String>,
}

impl BackendClient {
  pub fn new(config: &Config) -> Result<Self> {
    let base_url = parse_base_url(&config.backend.url)?;

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.backend.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url,
      token: Config::get_api_token(),
    })
  }

  /// Host shown in the header
  pub fn host(&self) -> &str {
    self.base_url.host_str().unwrap_or("")
  }

  /// GET an endpoint and decode its envelope without interpreting the code
  async fn get<R: DeserializeOwned>(
    &self,
    path: &str,
    query: &[(&str, String)],
  ) -> Result<ApiEnvelope<R>> {
    let url = self
      .base_url
      .join(path)
      .map_err(|e| eyre!("Invalid endpoint {}: {}", path, e))?;
    debug!(%url, "GET");

    let mut request = self.http.get(url.clone()).query(query);
    if let Some(token) = &self.token {
      request = request.bearer_auth(token);
    }

    let response = request
      .send()
      .await
      .map_err(|e| eyre!("Request to {} failed: {}", url, e))?;

    let status = response.status();
    if !status.is_success() {
      return Err(eyre!("{} returned HTTP {}", url, status));
    }

    response
      .json::<ApiEnvelope<R>>()
      .await
      .map_err(|e| eyre!("Failed to parse response from {}: {}", url, e))
  }

  /// List talents matching a keyword, one page at a time
  pub async fn list_talents(&self, query: &ListQuery) -> Result<Page<TalentSummary>> {
    let envelope: ApiEnvelope<ApiPage<ApiTalent>> = self.get("talents", &query.to_params()).await?;

    let page = envelope
      .into_result()
      .map_err(|e| eyre!("Failed to list talents: {}", e))?;

    Ok(page.map(ApiTalent::into_summary))
  }

  /// Get a single talent by id
  pub async fn get_talent(&self, id: u64) -> Result<Talent> {
    let envelope: ApiEnvelope<ApiTalent> = self.get(&format!("talents/{}", id), &[]).await?;

    let talent = envelope
      .into_result()
      .map_err(|e| eyre!("Failed to get talent {}: {}", id, e))?;

    Ok(talent.into_full())
  }

  /// List staffing requirements matching a keyword
  pub async fn list_requirements(&self, query: &ListQuery) -> Result<Page<Requirement>> {
    let envelope: ApiEnvelope<ApiPage<ApiRequirement>> =
      self.get("requirements", &query.to_params()).await?;

    let page = envelope
      .into_result()
      .map_err(|e| eyre!("Failed to list requirements: {}", e))?;

    Ok(page.map(Requirement::from))
  }

  /// Get the parameters of every group in `composite_key` ("2,3").
  ///
  /// The envelope is returned as-is; the reference cache decides what its
  /// code means.
  pub async fn get_parameters(&self, composite_key: &str) -> Result<ApiEnvelope<Vec<ApiParameter>>> {
    self
      .get("parameters", &[("groupIds", composite_key.to_string())])
      .await
  }
}

/// Parse the configured base URL, making sure relative joins keep its path
fn parse_base_url(raw: &str) -> Result<Url> {
  let raw = raw.trim();
  let normalized = if raw.ends_with('/') {
    raw.to_string()
  } else {
    format!("{}/", raw)
  };

  let url = Url::parse(&normalized).map_err(|e| eyre!("Invalid backend url {}: {}", raw, e))?;
  if !matches!(url.scheme(), "http" | "https") {
    return Err(eyre!("Backend url must be http or https: {}", raw));
  }
  Ok(url)
}
