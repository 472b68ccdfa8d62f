//! Built-in batch filters

mod predicate;
mod tracing_filter;

pub use predicate::{FilterDecision, PredicateFilter};
pub use tracing_filter::TracingFilter;
