//! Shared cache for grouped reference (lookup) data.
//!
//! Many views need overlapping sets of lookup groups. The cache:
//! - Fetches each composite key at most once, unless the fetch failed
//! - Shares one in-flight load between concurrent callers of the same key
//! - Merges responses by group, replacing groups that were already cached
//! - Never touches the network on reads

mod cache;
mod traits;

pub use cache::ReferenceDataCache;
pub use traits::{composite_key, ReferenceBatch, ReferenceRecord};
