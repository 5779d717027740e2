// ============================================================================
// Statistics Domain - Derived aggregates under optimistic concurrency
// ============================================================================
//
// - Value objects (AggregateKey, OrderTotals, TotalsDelta, AggregateSnapshot)
// - Errors (StatsError)
// - Guard (StatisticsGuard, the only writer of aggregate records)
//
// ============================================================================

pub mod value_objects;
pub mod errors;
pub mod guard;

pub use value_objects::*;
pub use errors::*;
pub use guard::*;
