pub mod errors;
pub mod formats;
pub mod model;

pub use errors::OdvError;
pub use formats::{parse_odv_file, unique_column_names, Delimiter};
pub use model::{OdvFile, Reference, SemanticParameter, SkippedRow};
