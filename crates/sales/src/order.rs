use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crmjobs_core::{DomainError, Money, OrderId};

/// Orders placed within this many trailing days get a reminder.
pub const REMINDER_WINDOW_DAYS: i64 = 7;

/// Customer contact details attached to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub email: String,
}

/// One order that should receive a reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReminder {
    pub order_id: OrderId,
    pub customer: Customer,
    pub order_date: DateTime<Utc>,
    pub total_amount: Money,
}

impl core::fmt::Display for OrderReminder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "Reminder: Order ID {}, Customer: {} ({}), Date: {}, Amount: ${}",
            self.order_id,
            self.customer.name,
            self.customer.email,
            self.order_date.to_rfc3339(),
            self.total_amount
        )
    }
}

/// Trailing time window used to select orders for reminders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderWindow {
    days: i64,
}

impl Default for ReminderWindow {
    fn default() -> Self {
        Self {
            days: REMINDER_WINDOW_DAYS,
        }
    }
}

impl ReminderWindow {
    pub fn new(days: i64) -> Result<Self, DomainError> {
        if days <= 0 {
            return Err(DomainError::validation("reminder window must be at least one day"));
        }
        Ok(Self { days })
    }

    pub fn days(&self) -> i64 {
        self.days
    }

    /// Inclusive lower bound of the window ending at `now`.
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.days)
    }

    pub fn contains(&self, now: DateTime<Utc>, order_date: DateTime<Utc>) -> bool {
        order_date >= self.since(now) && order_date <= now
    }
}
