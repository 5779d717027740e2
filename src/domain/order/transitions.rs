use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::errors::OrderError;
use super::value_objects::OrderStatus;

// ============================================================================
// Status Transition Table
// ============================================================================
//
// Each state maps to the set of states it may move to. A state with an
// empty set is terminal. The table is a value handed to the validator so
// tests can substitute their own rules.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionTable {
    allowed: HashMap<OrderStatus, HashSet<OrderStatus>>,
}

impl TransitionTable {
    /// Table with no allowed moves; every state is terminal.
    pub fn empty() -> Self {
        Self {
            allowed: OrderStatus::ALL.iter().map(|s| (*s, HashSet::new())).collect(),
        }
    }

    /// The production lifecycle: forward-only along
    /// `pending → confirmed → processing → shipped → delivered → completed`,
    /// with `cancelled` reachable from every non-terminal state.
    pub fn standard() -> Self {
        let mut table = Self::empty();
        for from in OrderStatus::ALL {
            if matches!(from, OrderStatus::Completed | OrderStatus::Cancelled) {
                continue;
            }
            let Some(rank) = from.forward_rank() else { continue };
            for to in OrderStatus::ALL {
                if to.forward_rank().is_some_and(|r| r > rank) {
                    table = table.allow(from, to);
                }
            }
            table = table.allow(from, OrderStatus::Cancelled);
        }
        table
    }

    /// Add one allowed move. Same-state moves are never recorded.
    pub fn allow(mut self, from: OrderStatus, to: OrderStatus) -> Self {
        if from != to {
            self.allowed.entry(from).or_default().insert(to);
        }
        self
    }

    pub fn allows(&self, from: OrderStatus, to: OrderStatus) -> bool {
        self.allowed.get(&from).is_some_and(|next| next.contains(&to))
    }

    pub fn is_terminal(&self, status: OrderStatus) -> bool {
        self.allowed.get(&status).map_or(true, |next| next.is_empty())
    }

    /// Allowed targets in canonical declaration order.
    pub fn next_states(&self, from: OrderStatus) -> Vec<OrderStatus> {
        OrderStatus::ALL
            .iter()
            .copied()
            .filter(|to| self.allows(from, *to))
            .collect()
    }
}

impl Default for TransitionTable {
    fn default() -> Self {
        Self::standard()
    }
}

// ============================================================================
// Transition Validator
// ============================================================================

#[derive(Debug, Clone)]
pub struct TransitionValidator {
    table: Arc<TransitionTable>,
}

impl TransitionValidator {
    pub fn new(table: Arc<TransitionTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    pub fn is_valid_transition(&self, current: OrderStatus, requested: OrderStatus) -> bool {
        current != requested && self.table.allows(current, requested)
    }

    pub fn validate(&self, current: OrderStatus, requested: OrderStatus) -> Result<(), OrderError> {
        if self.is_valid_transition(current, requested) {
            Ok(())
        } else {
            Err(OrderError::InvalidTransition {
                from: current,
                to: requested,
            })
        }
    }

    pub fn next_states(&self, current: OrderStatus) -> Vec<OrderStatus> {
        self.table.next_states(current)
    }
}

impl Default for TransitionValidator {
    fn default() -> Self {
        Self::new(Arc::new(TransitionTable::standard()))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
