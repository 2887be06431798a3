mod requirement_list;
mod talent_detail;
mod talent_list;

pub use requirement_list::RequirementListView;
pub use talent_detail::TalentDetailView;
pub use talent_list::TalentListView;

use crate::backend::types::{ListQuery, Page};
use crate::query::RequestState;

/// Block title for a paged list: " Talents [java] page 2/5, 93 total "
fn page_title<T>(label: &str, query: &ListQuery, state: &RequestState<Page<T>>) -> String {
  let mut title = format!(" {}", label);
  if !query.keyword.is_empty() {
    title.push_str(&format!(" [{}]", query.keyword));
  }
  if let Some(page) = &state.data {
    title.push_str(&format!(
      " page {}/{}, {} total",
      page.page,
      page.page_count().max(1),
      page.total
    ));
  }
  if state.is_loading() {
    title.push_str(" (loading...)");
  } else if state.is_error() {
    title.push_str(" (error)");
  }
  title.push(' ');
  title
}
