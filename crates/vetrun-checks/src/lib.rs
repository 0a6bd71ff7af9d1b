//! vetrun Checks
//!
//! Validation of the display items created by generated analysis code.
//!
//! # Core Concepts
//!
//! - [`Rule`] / [`Checker`]: ordered rule tables over a mutable checker state
//! - [`DfChecker`]: one display item checked with the rules of a [`DfCheckerKind`]
//! - [`ChainChecker`]: checkers run in sequence, forwarding intermediate results
//! - [`CheckServices`]: shared channel, override registry and compile cache
//!
//! # Example
//!
//! ```rust,ignore
//! use vetrun_checks::{check_display_items, CheckServices, Stage};
//!
//! let services = CheckServices::new();
//! let issues = check_display_items(&with_content, Stage::DisplayItems, &services)?;
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]
// every rule function must be registered in a rule table
#![deny(dead_code)]

mod abbreviations;
mod chains;
mod checker;
mod error;
mod framework;
mod limits;
mod rules;
mod services;

pub use abbreviations::{is_unknown_abbreviation, COMMON_ABBREVIATIONS};
pub use chains::{chain_kinds, check_display_item, check_display_items, Stage};
pub use checker::{DfChecker, DfCheckerKind, WIDTH_KEY};
pub use error::{CheckerError, CheckerResult};
pub use framework::{run_rules, ChainChecker, Checker, CheckerState, IntermediateResults, Rule, RuleOutcome};
pub use limits::{
    max_rows_and_columns, SizeLimit, ALLOWED_PLOT_KINDS, MAX_BARS, MAX_TABLE_WIDTH, MAX_TRANSPOSED_WIDTH,
    NARROW_TABLE_WIDTH,
};
pub use services::{CheckServices, DEFAULT_COMPILE_CACHE_CAPACITY};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
pub mod prelude {
    pub use crate::{
        check_display_item, check_display_items, CheckServices, Checker, CheckerError, DfChecker, DfCheckerKind,
        Stage,
    };
}
