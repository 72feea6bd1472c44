//! Acquisition of the authority's daily files.
//!
//! [`Fetcher`] retrieves a single date with retry and idempotent skip;
//! [`AcquisitionScheduler`] fans a date range out over a bounded number of
//! concurrent fetches and aggregates the outcomes.

pub mod fetcher;
pub mod retry;
pub mod scheduler;

pub use fetcher::{Fetcher, sweep_partial_downloads, unpack_archive};
pub use retry::RetryPolicy;
pub use scheduler::AcquisitionScheduler;

#[cfg(test)]
mod tests;
