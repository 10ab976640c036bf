//! Per-iteration budget enforcement: an explicit counter, not a hope that
//! the HTTP layer pushes back fast enough.

use hedge_core::Usd;

#[derive(Debug, Clone, Copy)]
pub struct BudgetLimits {
    pub max_policies_per_iteration: usize,
    pub max_aggregate_notional_usd: Usd,
}

impl Default for BudgetLimits {
    fn default() -> Self {
        Self {
            max_policies_per_iteration: 50,
            max_aggregate_notional_usd: Usd::new(rust_decimal::Decimal::from(1_000_000)),
        }
    }
}

/// Running tally for a single iteration. Consulted before a new policy is
/// dispatched, never mid-policy — an order already placed at a venue
/// cannot be un-placed because a counter tipped over mid-flight.
pub struct IterationBudget {
    limits: BudgetLimits,
    policies_hedged: usize,
    notional_opened: Usd,
}

impl IterationBudget {
    pub fn new(limits: BudgetLimits) -> Self {
        Self {
            limits,
            policies_hedged: 0,
            notional_opened: Usd::ZERO,
        }
    }

    /// Whether a new policy may still be picked up this iteration.
    pub fn has_capacity(&self) -> bool {
        self.policies_hedged < self.limits.max_policies_per_iteration
            && self.notional_opened.inner() < self.limits.max_aggregate_notional_usd.inner()
    }

    /// Record a policy that produced at least one opened position this
    /// iteration, along with the aggregate notional of everything it opened.
    pub fn record_hedge(&mut self, notional_opened: Usd) {
        self.policies_hedged += 1;
        self.notional_opened = self.notional_opened + notional_opened;
    }

    pub fn policies_hedged(&self) -> usize {
        self.policies_hedged
    }

    pub fn notional_opened(&self) -> Usd {
        self.notional_opened
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn capacity_closes_once_policy_count_reached() {
        let mut budget = IterationBudget::new(BudgetLimits {
            max_policies_per_iteration: 1,
            max_aggregate_notional_usd: Usd::new(dec!(1_000_000)),
        });
        assert!(budget.has_capacity());
        budget.record_hedge(Usd::new(dec!(1000)));
        assert!(!budget.has_capacity());
    }

    #[test]
    fn capacity_closes_once_notional_reached() {
        let mut budget = IterationBudget::new(BudgetLimits {
            max_policies_per_iteration: 100,
            max_aggregate_notional_usd: Usd::new(dec!(10_000)),
        });
        budget.record_hedge(Usd::new(dec!(9_999)));
        assert!(budget.has_capacity());
        budget.record_hedge(Usd::new(dec!(2))); // tips over mid-iteration, accepted
        assert!(!budget.has_capacity());
        assert_eq!(budget.notional_opened(), Usd::new(dec!(10_001)));
    }
}
