pub mod batch;
pub mod job;
pub mod scanner;

pub use batch::BatchRunner;
pub use job::{assign_unique_stems, Job};
pub use scanner::DirectoryScanner;
