mod footer;
mod header;
mod utils;

pub use footer::draw_footer;
pub use header::{draw_header, LookupStatus};
pub use utils::{format_date, status_color, truncate};
