//! Application constants for the registration pipeline
//!
//! Remote addressing, file naming, the fixed-width column layout and the
//! default tunables used when no explicit configuration is given.

// =============================================================================
// Remote Source
// =============================================================================

/// Base URL of the authority's microdata publication tree
pub const DEFAULT_BASE_URL: &str = "https://www.dgt.es/microdatos/salida";

/// Path segment between `{year}/{month}` and the archive name
pub const REMOTE_DAILY_SEGMENT: &str = "vehiculos/matriculaciones";

/// Prefix shared by daily archives and their extracted text files
pub const DAILY_FILE_PREFIX: &str = "export_mat_";

/// Extension of the remote archive
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Extension of the extracted fixed-width file
pub const RAW_FILE_EXTENSION: &str = "txt";

/// Regex for a valid raw filename; capture group 1 is the YYYYMMDD date
pub const RAW_FILENAME_PATTERN: &str = r"^export_mat_(\d{8})\.txt$";

/// chrono format of the filename date
pub const FILENAME_DATE_FORMAT: &str = "%Y%m%d";

/// Prefix and suffix of in-progress downloads in the data directory
pub const PARTIAL_DOWNLOAD_PREFIX: &str = ".export_mat_";
pub const PARTIAL_DOWNLOAD_SUFFIX: &str = ".part";

/// Partial downloads younger than this may belong to a concurrent run and
/// are left alone by the sweep
pub const PARTIAL_DOWNLOAD_MAX_AGE: std::time::Duration =
    std::time::Duration::from_secs(60 * 60);

/// User-Agent sent with every request
pub const USER_AGENT: &str = concat!("ev_registrations/", env!("CARGO_PKG_VERSION"));

// =============================================================================
// Fixed-Width Layout (character offsets, half-open)
// =============================================================================

pub mod layout {
    use std::ops::Range;

    pub const MAKE: Range<usize> = 9..39;
    pub const MODEL: Range<usize> = 39..69;
    pub const VIN: Range<usize> = 69..92;
    pub const FUEL: Range<usize> = 200..220;

    /// Lines narrower than this cannot carry the fuel descriptor
    pub const MIN_WIDTH: usize = 200;

    /// Character used by the authority to mask VIN digits
    pub const VIN_MASK_CHAR: char = '*';
}

// =============================================================================
// Monthly Dataset
// =============================================================================

pub mod dataset {
    /// Output filename prefix; full name is `ev_data_{YYYY}_{MM}.csv`
    pub const FILE_PREFIX: &str = "ev_data_";
    pub const FILE_EXTENSION: &str = "csv";

    pub const COL_MAKE: &str = "make";
    pub const COL_MODEL: &str = "model";
    pub const COL_VIN: &str = "vin";
    pub const COL_FUEL_CODE: &str = "fuel_code";
    pub const COL_REGISTRATION_DATE: &str = "registration_date";
    pub const COL_SOURCE_FILE: &str = "source_file";

    /// Extension of the sidecar listing every raw file merged into a month,
    /// `ev_data_{YYYY}_{MM}.sources.csv`
    pub const LEDGER_EXTENSION: &str = "sources.csv";

    /// Column order of the persisted file
    pub const COLUMNS: &[&str] = &[
        COL_MAKE,
        COL_MODEL,
        COL_VIN,
        COL_FUEL_CODE,
        COL_REGISTRATION_DATE,
        COL_SOURCE_FILE,
    ];

    /// Date format of the `registration_date` column
    pub const DATE_FORMAT: &str = "%Y-%m-%d";

    /// Number of entries in the top-N tables of the monthly summary
    pub const SUMMARY_TOP_N: usize = 5;
}

// =============================================================================
// Acquisition Defaults
// =============================================================================

/// Upper bound for the default worker budget
pub const MAX_DEFAULT_WORKERS: usize = 8;

/// Retries after the first attempt (3 attempts in total)
pub const DEFAULT_RETRY_COUNT: u32 = 2;

/// Per-attempt request timeout
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Delay before the first retry; doubles on each subsequent retry
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 2_000;

/// Ceiling for a single backoff delay
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;

/// Directory name under the platform data dir
pub const APP_DIR_NAME: &str = "ev-registrations";
