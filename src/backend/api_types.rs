//! Serde-deserializable types matching the back-office REST responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;

use super::types::{Page, Parameter, Requirement, Talent, TalentSummary};

/// Envelope `code` that marks an application-level success
pub const SUCCESS_CODE: i64 = 200;

// ============================================================================
// Response envelope
// ============================================================================

/// Every endpoint wraps its payload in `{ code, message, result }`.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
  pub code: i64,
  #[serde(default)]
  pub message: Option<String>,
  pub result: Option<T>,
}

impl<T> ApiEnvelope<T> {
  pub fn is_success(&self) -> bool {
    self.code == SUCCESS_CODE
  }

  pub fn failure_message(&self) -> String {
    match self.message.as_deref() {
      Some(message) if !message.is_empty() => format!("{} (code {})", message, self.code),
      _ => format!("Request failed (code {})", self.code),
    }
  }

  /// Unwrap the payload, turning a failure code into an error.
  pub fn into_result(self) -> Result<T> {
    if !self.is_success() {
      return Err(eyre!(self.failure_message()));
    }
    self
      .result
      .ok_or_else(|| eyre!("Response with code {} carried no result", self.code))
  }
}

// ============================================================================
// Paging
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiPage<T> {
  #[serde(default = "Vec::new")]
  pub records: Vec<T>,
  #[serde(default)]
  pub total: u64,
  #[serde(default = "first_page")]
  pub current: u64,
  #[serde(default)]
  pub size: u64,
}

fn first_page() -> u64 {
  1
}

impl<T> ApiPage<T> {
  pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
    Page {
      items: self.records.into_iter().map(f).collect(),
      total: self.total,
      page: self.current,
      size: self.size,
    }
  }
}

// ============================================================================
// Talent
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTalent {
  pub id: u64,
  #[serde(default)]
  pub name: String,
  pub title: Option<String>,
  pub status_code: Option<String>,
  pub level_code: Option<String>,
  pub city_code: Option<String>,
  pub phone: Option<String>,
  pub email: Option<String>,
  pub years_of_experience: Option<u32>,
  #[serde(default)]
  pub skills: Vec<String>,
  pub summary: Option<String>,
  pub created_at: Option<DateTime<Utc>>,
  pub updated_at: Option<DateTime<Utc>>,
}

impl ApiTalent {
  pub fn into_summary(self) -> TalentSummary {
    TalentSummary {
      id: self.id,
      name: self.name,
      title: self.title,
      status: self.status_code,
      level: self.level_code,
      city: self.city_code,
      updated_at: self.updated_at,
    }
  }

  pub fn into_full(self) -> Talent {
    Talent {
      id: self.id,
      name: self.name,
      title: self.title,
      status: self.status_code,
      level: self.level_code,
      city: self.city_code,
      phone: self.phone,
      email: self.email,
      years_of_experience: self.years_of_experience,
      skills: self.skills,
      summary: self.summary,
      created_at: self.created_at,
      updated_at: self.updated_at,
    }
  }
}

// ============================================================================
// Requirement
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequirement {
  pub id: u64,
  #[serde(default)]
  pub title: String,
  pub client_name: Option<String>,
  pub status_code: Option<String>,
  pub level_code: Option<String>,
  pub city_code: Option<String>,
  #[serde(default)]
  pub headcount: u32,
  pub created_at: Option<DateTime<Utc>>,
}

impl From<ApiRequirement> for Requirement {
  fn from(api: ApiRequirement) -> Self {
    Self {
      id: api.id,
      title: api.title,
      client: api.client_name,
      status: api.status_code,
      level: api.level_code,
      city: api.city_code,
      headcount: api.headcount,
      created_at: api.created_at,
    }
  }
}

// ============================================================================
// Parameters (lookup tables)
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiParameter {
  pub id: u64,
  pub group_id: u32,
  pub code: String,
  #[serde(alias = "name")]
  pub label: String,
  #[serde(default)]
  pub sort: i32,
}

impl From<ApiParameter> for Parameter {
  fn from(api: ApiParameter) -> Self {
    Self {
      id: api.id,
      group_id: api.group_id,
      code: api.code,
      label: api.label,
      sort: api.sort,
    }
  }
}
