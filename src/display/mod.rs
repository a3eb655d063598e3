//! Human-readable renderings of analysis results.
pub mod trace;

pub use trace::format_scope_trace;
