//! Core traits and types for the reference data cache.

use std::collections::HashMap;
use std::fmt::{self, Display};
use std::hash::Hash;

/// Trait for lookup records that can be grouped in the cache.
///
/// Only the group discriminant is interpreted; the rest of the record is
/// opaque to the cache.
pub trait ReferenceRecord: Clone + Send + Sync + 'static {
  /// Discriminant used to partition a flat record list (e.g. a group id)
  type Group: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static;

  fn group(&self) -> Self::Group;
}

/// Outcome of one loader call, after the caller has interpreted the
/// response envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceBatch<R> {
  /// Application-level success with the flat record list
  Loaded(Vec<R>),
  /// Application-level failure code, with a message for the user
  Rejected(String),
}

/// Build the composite key for a set of groups requested together.
///
/// Ids are joined with `,` in the order given, so `[3, 5]` and `[5, 3]`
/// are different keys and are fetched separately.
pub fn composite_key<I>(groups: I) -> String
where
  I: IntoIterator,
  I::Item: Display,
{
  groups
    .into_iter()
    .map(|group| group.to_string())
    .collect::<Vec<_>>()
    .join(",")
}

/// Partition records by group, keeping response order within each group.
pub fn group_records<R: ReferenceRecord>(records: Vec<R>) -> HashMap<R::Group, Vec<R>> {
  let mut grouped: HashMap<R::Group, Vec<R>> = HashMap::new();
  for record in records {
    grouped.entry(record.group()).or_default().push(record);
  }
  grouped
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug, Clone, PartialEq)]
  struct Code {
    group: u32,
    code: &'static str,
  }

  impl ReferenceRecord for Code {
    type Group = u32;

    fn group(&self) -> u32 {
      self.group
    }
  }

  #[test]
  fn test_composite_key_keeps_order() {
    assert_eq!(composite_key([3, 5]), "3,5");
    assert_eq!(composite_key([5, 3]), "5,3");
    assert_eq!(composite_key(["status"]), "status");
    assert_eq!(composite_key(Vec::<u32>::new()), "");
  }

  #[test]
  fn test_group_records() {
    let grouped = group_records(vec![
      Code { group: 2, code: "a" },
      Code { group: 3, code: "c" },
      Code { group: 2, code: "b" },
    ]);

    assert_eq!(grouped.len(), 2);
    let codes: Vec<_> = grouped[&2].iter().map(|c| c.code).collect();
    assert_eq!(codes, vec!["a", "b"]);
    assert_eq!(grouped[&3].len(), 1);
  }
}
