//! Async data fetching for views.
//!
//! `ResourceFetcher` owns one call and its loading/data/error state; each
//! new invocation cancels the previous one so only the latest result lands.

mod fetcher;
mod state;
mod token;

pub use fetcher::{FetcherOptions, ResourceFetcher};
pub use state::{FetchError, RequestState, RequestStatus};
