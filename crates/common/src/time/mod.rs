//! Time utilities
//!
//! - **[`unit`]**: configuration time units and their conversion to
//!   [`std::time::Duration`]

pub mod unit;

pub use unit::TimeUnit;
