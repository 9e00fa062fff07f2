//! IO utilities for loading river monitoring tables.

pub mod river_csv;

pub use river_csv::{read_river_csv, read_river_csv_with_config, RiverCsvConfig};
