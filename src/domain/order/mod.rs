// ============================================================================
// Order Domain - Status lifecycle of an order
// ============================================================================
//
// This module contains ALL order lifecycle code:
// - Value objects (Order, OrderStatus, OrderType, PaymentStatus)
// - Transition table and validator
// - Commands (TransitionOrderStatus)
// - Audit entries and the audit log writer
// - Errors (OrderError enum)
// - Transition service and batch executor
//
// Storage is reached only through `crate::store::OrderStore`.
//
// ============================================================================

pub mod value_objects;
pub mod transitions;
pub mod events;
pub mod commands;
pub mod errors;
pub mod audit;
pub mod command_handler;
pub mod batch;

// Re-export for convenience
pub use value_objects::*;
pub use transitions::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use audit::*;
pub use command_handler::*;
pub use batch::*;
