//! Metric name constants for the composition pipeline.

/// Compositions rendered, labeled by complexity tier (counter).
pub const COMPOSITIONS_TOTAL: &str = "compositions_total";

/// Cache lookups served without recomputation (counter).
pub const CACHE_HITS_TOTAL: &str = "composition_cache_hits_total";

/// Cache lookups that computed a fresh result (counter).
pub const CACHE_MISSES_TOTAL: &str = "composition_cache_misses_total";

/// Module files skipped during repository loads (counter).
pub const MODULE_PARSE_FAILURES_TOTAL: &str = "module_parse_failures_total";
