use serde::{Deserialize, Serialize};

use crmjobs_core::{Money, ValueObject};

/// Aggregate CRM figures for the periodic report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrmSummary {
    pub customers: u64,
    pub orders: u64,
    pub revenue: Money,
}

impl ValueObject for CrmSummary {}

impl core::fmt::Display for CrmSummary {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} customers, {} orders, {} revenue",
            self.customers, self.orders, self.revenue
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_summary_reports_zero_revenue() {
        assert_eq!(CrmSummary::default().to_string(), "0 customers, 0 orders, 0.00 revenue");
    }
}
