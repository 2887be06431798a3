pub mod api_types;
pub mod client;
pub mod reference;
pub mod types;

pub use client::BackendClient;
pub use reference::{parameter_cache, parameter_label, ParameterCache};
