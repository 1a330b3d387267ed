//! Labeled training corpus: CSV loading and synthetic generation

mod generator;
mod loader;
mod types;

pub use generator::DatasetGenerator;
pub use loader::{load_dataset, read_records, write_dataset};
pub use types::{EmailRecord, Language};
