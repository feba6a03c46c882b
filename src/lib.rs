//! calfix: InfluxQL patcher for calendar GROUP BY time buckets.
//!
//! InfluxDB 1.x cannot bucket by months or years. `fix` rewrites such a query
//! to day buckets and returns the post-processing that regroups the day-level
//! result into timezone-correct calendar buckets, re-applying each selected
//! aggregate, and fills empty results across the WHERE time range.

pub mod calendar;
pub mod client;
pub mod config;
pub mod error;
pub mod fix;
pub mod postprocess;
pub mod query;
pub mod result;

pub use config::FixConfig;
pub use error::{AppError, AppResult};
pub use fix::{fix, fix_with, Fix, PostProcess};
pub use query::{analyze, analyze_with, ParsedQuery};
pub use result::{QueryResponse, Series, StatementResult};

// Test-only printing helper: expands to eprintln! in debug and test builds.
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        if false { let _ = format!($($arg)*); }
    });
}
