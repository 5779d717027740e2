use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::errors::StatsError;
use crate::domain::order::{Order, OrderStatus, OrderType};

// ============================================================================
// Aggregate Statistics Value Objects
// ============================================================================

/// Identifies one aggregate statistics record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AggregateKey(String);

impl AggregateKey {
    pub const ORDER_TOTALS: &'static str = "order_totals";

    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The all-time order totals record maintained by the transition service.
    pub fn order_totals() -> Self {
        Self::new(Self::ORDER_TOTALS)
    }

    /// Totals of the orders created on `day` (UTC), e.g. `order_totals:2026-10-18`.
    pub fn daily(day: NaiveDate) -> Self {
        Self(format!("{}:{}", Self::ORDER_TOTALS, day.format("%Y-%m-%d")))
    }

    /// Daily record an order is counted in, by creation date.
    pub fn daily_for(created_at: DateTime<Utc>) -> Self {
        Self::daily(created_at.date_naive())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derived order totals. Revenue counts completed orders only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub total_orders: u64,
    pub by_status: BTreeMap<OrderStatus, u64>,
    pub sales_orders: u64,
    pub rental_orders: u64,
    pub total_revenue: Decimal,
}

impl Default for OrderTotals {
    fn default() -> Self {
        Self {
            total_orders: 0,
            by_status: OrderStatus::ALL.iter().map(|s| (*s, 0)).collect(),
            sales_orders: 0,
            rental_orders: 0,
            total_revenue: Decimal::ZERO,
        }
    }
}

impl OrderTotals {
    pub fn count(&self, status: OrderStatus) -> u64 {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    /// Completed orders as a percentage of all orders, two decimal places.
    pub fn completion_rate(&self) -> Decimal {
        self.percentage_in(OrderStatus::Completed)
    }

    /// Cancelled orders as a percentage of all orders, two decimal places.
    pub fn cancellation_rate(&self) -> Decimal {
        self.percentage_in(OrderStatus::Cancelled)
    }

    /// Orders still waiting on the back office: pending, confirmed or processing.
    pub fn attention_count(&self) -> u64 {
        [OrderStatus::Pending, OrderStatus::Confirmed, OrderStatus::Processing]
            .iter()
            .map(|s| self.count(*s))
            .sum()
    }

    fn percentage_in(&self, status: OrderStatus) -> Decimal {
        if self.total_orders == 0 {
            return Decimal::ZERO;
        }
        (Decimal::from(self.count(status)) * Decimal::ONE_HUNDRED / Decimal::from(self.total_orders))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Add another record's counts into this one.
    pub fn merge(&mut self, other: &OrderTotals) {
        self.total_orders += other.total_orders;
        self.sales_orders += other.sales_orders;
        self.rental_orders += other.rental_orders;
        self.total_revenue += other.total_revenue;
        for (status, count) in &other.by_status {
            *self.by_status.entry(*status).or_insert(0) += count;
        }
    }

    /// Mean revenue per completed order, two decimal places.
    pub fn average_order_value(&self) -> Decimal {
        let completed = self.count(OrderStatus::Completed);
        if completed == 0 {
            return Decimal::ZERO;
        }
        (self.total_revenue / Decimal::from(completed))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }
}

/// Signed adjustment applied to an [`OrderTotals`] record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TotalsDelta {
    pub orders: i64,
    pub by_status: BTreeMap<OrderStatus, i64>,
    pub sales_orders: i64,
    pub rental_orders: i64,
    pub revenue: Decimal,
}

impl TotalsDelta {
    /// A new order entering the books in its current status.
    pub fn registered(order: &Order) -> Self {
        let mut delta = Self {
            orders: 1,
            ..Self::default()
        };
        delta.by_status.insert(order.status, 1);
        delta.count_type(order.order_type, 1);
        if order.status == OrderStatus::Completed {
            delta.revenue = order.total_amount;
        }
        delta
    }

    /// An order leaving the books (soft delete).
    pub fn removed(order: &Order) -> Self {
        let mut delta = Self::registered(order);
        delta.orders = -1;
        for count in delta.by_status.values_mut() {
            *count = -*count;
        }
        delta.sales_orders = -delta.sales_orders;
        delta.rental_orders = -delta.rental_orders;
        delta.revenue = -delta.revenue;
        delta
    }

    /// An order moving from its current status to `to`.
    pub fn transitioned(order: &Order, to: OrderStatus) -> Self {
        let mut delta = Self::default();
        if order.status == to {
            return delta;
        }
        delta.by_status.insert(order.status, -1);
        delta.by_status.insert(to, 1);
        if to == OrderStatus::Completed {
            delta.revenue = order.total_amount;
        } else if order.status == OrderStatus::Completed {
            delta.revenue = -order.total_amount;
        }
        delta
    }

    pub fn is_empty(&self) -> bool {
        self.orders == 0
            && self.by_status.values().all(|c| *c == 0)
            && self.sales_orders == 0
            && self.rental_orders == 0
            && self.revenue.is_zero()
    }

    fn count_type(&mut self, order_type: OrderType, by: i64) {
        match order_type {
            OrderType::Sales => self.sales_orders += by,
            OrderType::Rental => self.rental_orders += by,
        }
    }

    /// Produce the adjusted totals. Counts never go below zero; a delta that
    /// would drive one negative is rejected.
    pub fn apply(&self, base: &OrderTotals) -> Result<OrderTotals, StatsError> {
        let mut next = base.clone();
        next.total_orders = adjust("total_orders", base.total_orders, self.orders)?;
        next.sales_orders = adjust("sales_orders", base.sales_orders, self.sales_orders)?;
        next.rental_orders = adjust("rental_orders", base.rental_orders, self.rental_orders)?;
        for (status, by) in &self.by_status {
            let current = base.count(*status);
            next.by_status.insert(*status, adjust(status.as_str(), current, *by)?);
        }
        next.total_revenue = base.total_revenue + self.revenue;
        if next.total_revenue < Decimal::ZERO {
            return Err(StatsError::Validation(format!(
                "total_revenue would become negative ({})",
                next.total_revenue
            )));
        }
        Ok(next)
    }
}

fn adjust(field: &str, current: u64, by: i64) -> Result<u64, StatsError> {
    let result = i128::from(current) + i128::from(by);
    u64::try_from(result).map_err(|_| {
        StatsError::Validation(format!("{field} would become negative ({current} {by:+})"))
    })
}

/// A stored aggregate together with its optimistic-concurrency version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    pub key: AggregateKey,
    pub value: OrderTotals,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Unit Tests
// ============================================================================
