pub mod json_file;
pub mod provider;

pub use json_file::JsonFileSource;
pub use provider::{RecordSource, SourceSnapshot};
