use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::OrderError;

// ============================================================================
// Order Value Objects
// ============================================================================

/// Lifecycle status of an order.
///
/// Declaration order is the canonical forward path; `Cancelled` sits outside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    /// Storage / wire code.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Human-facing label used in audit notes.
    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending confirmation",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    /// Position on the forward path, `None` for `Cancelled`.
    pub fn forward_rank(&self) -> Option<usize> {
        match self {
            OrderStatus::Cancelled => None,
            other => OrderStatus::ALL.iter().position(|s| s == other),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .iter()
            .copied()
            .find(|s| s.as_str() == code.trim())
            .ok_or_else(|| OrderError::Validation(format!("unknown order status: {code:?}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Sales,
    Rental,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Sales => "sales",
            OrderType::Rental => "rental",
        }
    }
}

impl FromStr for OrderType {
    type Err = OrderError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        match code.trim() {
            "sales" => Ok(OrderType::Sales),
            "rental" => Ok(OrderType::Rental),
            other => Err(OrderError::Validation(format!("unknown order type: {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = OrderError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        match code.trim() {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(OrderError::Validation(format!("unknown payment status: {other:?}"))),
        }
    }
}

// ============================================================================
// Order Record
// ============================================================================

/// Persisted order as seen by the lifecycle engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

impl Order {
    /// Build a fresh order in `pending`.
    pub fn new(new_order: NewOrder) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_number: new_order.order_number,
            order_type: new_order.order_type,
            status: OrderStatus::Pending,
            total_amount: new_order.total_amount,
            payment_status: new_order.payment_status,
            created_at: now,
            updated_at: now,
            is_deleted: false,
        }
    }

    pub fn view(&self) -> OrderView {
        OrderView {
            id: self.id,
            order_number: self.order_number.clone(),
            order_type: self.order_type,
            status: self.status,
            total_amount: self.total_amount,
            payment_status: self.payment_status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Input for registering an order with the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_number: String,
    pub order_type: OrderType,
    pub total_amount: Decimal,
    pub payment_status: PaymentStatus,
}

impl NewOrder {
    /// Longest accepted order number, in characters.
    pub const MAX_ORDER_NUMBER_LEN: usize = 50;

    pub fn validate(&self) -> Result<(), OrderError> {
        if self.order_number.trim().is_empty() {
            return Err(OrderError::Validation("order number must not be empty".into()));
        }
        let length = self.order_number.chars().count();
        if length > Self::MAX_ORDER_NUMBER_LEN {
            return Err(OrderError::Validation(format!(
                "order number is {length} characters, at most {} allowed",
                Self::MAX_ORDER_NUMBER_LEN
            )));
        }
        if self.total_amount <= Decimal::ZERO {
            return Err(OrderError::Validation(format!(
                "order total must be positive, got {}",
                self.total_amount
            )));
        }
        // numeric(14, 2)
        if self.total_amount >= Decimal::new(1_000_000_000_000, 0) {
            return Err(OrderError::Validation(format!(
                "order total {} is out of range",
                self.total_amount
            )));
        }
        Ok(())
    }
}

/// Read model returned to the (external) controller layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderView {
    pub id: Uuid,
    pub order_number: String,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Unit Tests
// ============================================================================
