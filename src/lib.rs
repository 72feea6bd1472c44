//! BEV Registration Pipeline Library
//!
//! Acquires the daily vehicle registration files published by the national
//! traffic authority and consolidates the battery-electric registrations
//! into one CSV dataset per month.
//!
//! This library provides tools for:
//! - Downloading daily archives concurrently with bounded retries
//! - Extracting records from the fixed-width, Latin-1 encoded daily files
//! - Classifying records as battery-electric from their fuel descriptors
//! - Deduplicating registrations by VIN or composite identity
//! - Merging days into monthly datasets idempotently and atomically

pub mod acquisition;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod consolidation;
pub mod constants;
pub mod deduplication;
pub mod error;
pub mod extraction;
pub mod models;
pub mod progress;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use acquisition::{AcquisitionScheduler, Fetcher, RetryPolicy};
pub use classifier::{BevClassifier, Classification};
pub use config::PipelineConfig;
pub use consolidation::{
    ConsolidationEngine, ConsolidationReport, DayStatus, MonthReport, MonthlyDataset,
    MonthlySummary,
};
pub use error::{FetchError, LineError, PipelineError, Result};
pub use extraction::{FieldLayout, RecordExtractor, SourceFile};
pub use models::{
    AcquisitionReport, DateRange, FetchOutcome, IdentityKey, RegistrationRecord, SourceEncoding,
    YearMonth,
};
