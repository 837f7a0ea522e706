//! Output artifacts.
//!
//! - [`json`]: the atomic JSON sink for the record set, also used for the
//!   optional diagnostics document
//!
//! # Output Structure
//!
//! ```text
//! news_data.json        # sorted array of records
//! diagnostics.json      # optional: run status and per-source counters
//! ```

pub mod json;
