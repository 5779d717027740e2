// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Each area has its own subdirectory:
// - order: status state machine, transitions, audit trail, batch execution
// - statistics: derived aggregate totals guarded by optimistic versioning
//
// Persistence lives behind `crate::store`.
//
// ============================================================================

pub mod order;
pub mod statistics;
