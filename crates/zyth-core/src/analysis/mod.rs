//! Whole-unit analyses that need no type information: closure captures and
//! mutation events.

pub mod closure;
pub mod mutations;

pub use closure::{free_vars, local_vars, used_vars, CaptureAnalysis, ClosureAnalyzer};
pub use mutations::{MutationAnalyzer, MutationHandler, MutationKind, MutationRegistry};
