mod columns;
mod header;
mod spreadsheet;

pub use columns::{is_metavariable, unique_column_names};
pub use spreadsheet::{parse_odv_file, Delimiter};

pub(crate) use header::parse_comment_block;
