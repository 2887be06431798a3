//! Parameter (lookup table) groups and the shared cache that holds them.

use crate::backend::api_types::{ApiEnvelope, ApiParameter};
use crate::backend::client::BackendClient;
use crate::backend::types::Parameter;
use crate::reference::{ReferenceBatch, ReferenceDataCache, ReferenceRecord};

/// Talent pipeline status (active, placed, on hold...)
pub const TALENT_STATUS: u32 = 1;
/// Seniority level, shared by talents and requirements
pub const SENIORITY: u32 = 2;
/// Requirement status (open, filled, cancelled...)
pub const REQUIREMENT_STATUS: u32 = 3;
/// Work city
pub const WORK_CITY: u32 = 4;

pub type ParameterCache = ReferenceDataCache<Parameter>;

impl ReferenceRecord for Parameter {
  type Group = u32;

  fn group(&self) -> u32 {
    self.group_id
  }
}

/// Build the application's parameter cache on top of the backend client.
pub fn parameter_cache(client: BackendClient) -> ParameterCache {
  ReferenceDataCache::new(move |key: String| {
    let client = client.clone();
    async move {
      let envelope = client.get_parameters(&key).await?;
      Ok(into_batch(envelope))
    }
  })
}

fn into_batch(envelope: ApiEnvelope<Vec<ApiParameter>>) -> ReferenceBatch<Parameter> {
  if !envelope.is_success() {
    return ReferenceBatch::Rejected(envelope.failure_message());
  }

  let mut parameters: Vec<Parameter> = envelope
    .result
    .unwrap_or_default()
    .into_iter()
    .map(Parameter::from)
    .collect();
  // Stable: equal sort values keep response order
  parameters.sort_by_key(|p| p.sort);
  ReferenceBatch::Loaded(parameters)
}

/// Display label for a parameter code, falling back to the raw code while
/// the group is not loaded yet.
pub fn parameter_label(cache: &ParameterCache, group: u32, code: Option<&str>) -> String {
  match code {
    None => "-".to_string(),
    Some(code) => cache
      .find(&group, |p| p.code == code)
      .map(|p| p.label)
      .unwrap_or_else(|| code.to_string()),
  }
}
