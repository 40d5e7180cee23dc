pub mod filesystem;

pub use filesystem::{optimized_path_for, ResultBundle, ResultStorage};
pub(crate) use filesystem::{read_json, write_json_new};
