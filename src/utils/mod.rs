//! Utility functions and types

pub mod data_loader;

pub use data_loader::{dataframe_to_records, numeric_column, DataLoader, DataSaver};
