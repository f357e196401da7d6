//! Sales/CRM read-side types.
//!
//! Orders and customers are owned by the CRM; the jobs only read them to send
//! reminders and to build the periodic summary report.

pub mod order;
pub mod summary;

pub use order::{Customer, OrderReminder, REMINDER_WINDOW_DAYS, ReminderWindow};
pub use summary::CrmSummary;
