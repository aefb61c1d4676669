pub mod aggregator;
pub mod gallery;
pub mod matcher;
