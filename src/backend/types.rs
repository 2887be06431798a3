use chrono::{DateTime, Utc};

/// One page of a list endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
  pub items: Vec<T>,
  pub total: u64,
  /// 1-based page number
  pub page: u64,
  pub size: u64,
}

impl<T> Page<T> {
  pub fn page_count(&self) -> u64 {
    if self.size == 0 {
      0
    } else {
      self.total.div_ceil(self.size)
    }
  }

  pub fn has_next(&self) -> bool {
    self.page < self.page_count()
  }
}

/// Keyword search plus paging, shared by the list endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
  pub keyword: String,
  pub page: u64,
  pub size: u64,
}

impl ListQuery {
  pub fn new(size: u64) -> Self {
    Self {
      keyword: String::new(),
      page: 1,
      size: size.max(1),
    }
  }

  /// Same query with a new keyword, back on the first page
  pub fn with_keyword(&self, keyword: &str) -> Self {
    Self {
      keyword: keyword.trim().to_string(),
      page: 1,
      size: self.size,
    }
  }

  pub fn next_page(&self) -> Self {
    Self {
      page: self.page + 1,
      ..self.clone()
    }
  }

  pub fn previous_page(&self) -> Self {
    Self {
      page: self.page.saturating_sub(1).max(1),
      ..self.clone()
    }
  }

  pub fn to_params(&self) -> Vec<(&'static str, String)> {
    let mut params = vec![
      ("page", self.page.to_string()),
      ("size", self.size.to_string()),
    ];
    if !self.keyword.is_empty() {
      params.push(("keyword", self.keyword.clone()));
    }
    params
  }
}

/// Talent row for list views
#[derive(Debug, Clone, PartialEq)]
pub struct TalentSummary {
  pub id: u64,
  pub name: String,
  pub title: Option<String>,
  pub status: Option<String>, // parameter code, group TALENT_STATUS
  pub level: Option<String>,  // parameter code, group SENIORITY
  pub city: Option<String>,   // parameter code, group WORK_CITY
  pub updated_at: Option<DateTime<Utc>>,
}

/// Full talent record
#[derive(Debug, Clone, PartialEq)]
pub struct Talent {
  pub id: u64,
  pub name: String,
  pub title: Option<String>,
  pub status: Option<String>,
  pub level: Option<String>,
  pub city: Option<String>,
  pub phone: Option<String>,
  pub email: Option<String>,
  pub years_of_experience: Option<u32>,
  pub skills: Vec<String>,
  pub summary: Option<String>,
  pub created_at: Option<DateTime<Utc>>,
  pub updated_at: Option<DateTime<Utc>>,
}

/// Staffing requirement opened by a client
#[derive(Debug, Clone, PartialEq)]
pub struct Requirement {
  pub id: u64,
  pub title: String,
  pub client: Option<String>,
  pub status: Option<String>, // group REQUIREMENT_STATUS
  pub level: Option<String>,
  pub city: Option<String>,
  pub headcount: u32,
  pub created_at: Option<DateTime<Utc>>,
}

/// Lookup table entry ("parameter")
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
  pub id: u64,
  pub group_id: u32,
  pub code: String,
  pub label: String,
  pub sort: i32,
}
