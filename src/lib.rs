//! Order lifecycle engine: a forward-only order status state machine with
//! per-transition audit trail, batch transitions with per-item failure
//! accounting, and optimistically versioned aggregate statistics.

pub mod config;
pub mod domain;
pub mod engine;
pub mod metrics;
pub mod store;
pub mod utils;

pub use config::EngineConfig;
pub use engine::OrderLifecycle;
