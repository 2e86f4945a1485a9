// SWIFT Registry - Core Library
// Exposes all modules for use in the CLI, the API server, and tests

pub mod api;
pub mod db;
pub mod logging;
pub mod reconciler;
pub mod source;
pub mod swift;

// Re-export commonly used types
pub use api::{
    add_entry, lookup_country, lookup_swift_code, ApiError, BankEntry, CountrySummary, NewEntry,
    SwiftCodeSummary,
};
pub use db::{
    bank_exists, get_bank, get_banks_by_country, get_branch, get_branches_by_country,
    get_branches_of_headquarters, get_country, insert_bank_if_absent, insert_branch_if_absent,
    insert_country_if_absent, setup_database, table_counts, Bank, Branch, Country, TableCounts,
};
pub use reconciler::{reconcile, Diagnostic, RunReport};
pub use source::{detect_format, load_records, read_csv, read_xlsx, SourceFormat, SwiftRecord};
pub use swift::{
    has_valid_length, headquarters_key, is_headquarters, HEADQUARTERS_SUFFIX, SWIFT_CODE_LENGTH,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
