//! vetrun Provenance Layer
//!
//! Interception boundary for statistics calls and the process-wide service
//! channel.
//!
//! - [`OverrideRegistry`]: scoped activation of [`OverrideContext`]s
//! - [`RunContexts`]: the contexts frozen for one execution, sealed with a
//!   [`ProvenanceSeal`] so only genuine tags survive decoding
//! - [`SharedDataChannel`]: injected services such as the compile callable

#![warn(unreachable_pub)]
#![warn(missing_docs)]

mod context;
mod seal;
mod shared;

pub use context::{DisableAllGuard, InterceptTarget, OverrideContext, OverrideGuard, OverrideRegistry};
pub use seal::{ProvenanceSeal, RunContexts};
pub use shared::{CompileFn, CompileOutcome, SharedDataChannel, SharedItem, COMPILE_TO_PDF_KEY};

/// Prelude for common imports
pub mod prelude {
    pub use crate::{CompileOutcome, OverrideContext, OverrideRegistry, RunContexts, SharedDataChannel};
}
