//! Policy: the external, read-only input the orchestrator hedges against.

use crate::Usd;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique policy identifier, assigned upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyId(pub u64);

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "policy-{}", self.0)
    }
}

/// Kind of risk the policy covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageKind {
    Depeg,
    SmartContract,
    Oracle,
    Bridge,
    CexLiquidation,
}

impl fmt::Display for CoverageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Depeg => "Depeg",
            Self::SmartContract => "SmartContract",
            Self::Oracle => "Oracle",
            Self::Bridge => "Bridge",
            Self::CexLiquidation => "CexLiquidation",
        };
        write!(f, "{s}")
    }
}

/// Policy status; the core only hedges `Active` policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyStatus {
    Active,
    Expired,
    Claimed,
    Cancelled,
}

impl PolicyStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Statuses that trigger a close of any linked open hedge.
    pub fn demands_close(&self) -> bool {
        matches!(self, Self::Expired | Self::Claimed)
    }
}

/// An insurance policy, produced upstream and consumed read-only by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: PolicyId,
    pub owner_address: String,
    pub coverage_kind: CoverageKind,
    pub protected_asset: String,
    pub protected_chain: String,
    /// Coverage amount in USD (the source reports cents; the core normalizes
    /// to a `Usd` decimal at the repository boundary).
    pub coverage_amount: Usd,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: PolicyStatus,
}

impl Policy {
    /// A policy is hedgeable only while active, with positive coverage, and
    /// not already past its end timestamp (property 12: boundary behavior).
    pub fn is_hedgeable(&self, now: DateTime<Utc>) -> bool {
        self.status.is_active() && self.coverage_amount.is_positive() && self.end_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn sample(status: PolicyStatus, coverage: rust_decimal::Decimal, end_offset_days: i64) -> Policy {
        let now = Utc::now();
        Policy {
            id: PolicyId(42),
            owner_address: "0xabc".to_string(),
            coverage_kind: CoverageKind::Depeg,
            protected_asset: "USDC".to_string(),
            protected_chain: "Ethereum".to_string(),
            coverage_amount: Usd::new(coverage),
            start_at: now - Duration::days(30),
            end_at: now + Duration::days(end_offset_days),
            status,
        }
    }

    #[test]
    fn active_policy_with_positive_coverage_is_hedgeable() {
        let policy = sample(PolicyStatus::Active, dec!(100_000), 30);
        assert!(policy.is_hedgeable(Utc::now()));
    }

    #[test]
    fn zero_coverage_policy_is_not_hedgeable() {
        let policy = sample(PolicyStatus::Active, dec!(0), 30);
        assert!(!policy.is_hedgeable(Utc::now()));
    }

    #[test]
    fn expired_policy_is_not_hedgeable() {
        let policy = sample(PolicyStatus::Expired, dec!(100_000), 30);
        assert!(!policy.is_hedgeable(Utc::now()));
    }

    #[test]
    fn past_end_timestamp_is_not_hedgeable_even_if_marked_active() {
        let policy = sample(PolicyStatus::Active, dec!(100_000), -1);
        assert!(!policy.is_hedgeable(Utc::now()));
    }

    #[test]
    fn claimed_and_expired_demand_close() {
        assert!(PolicyStatus::Claimed.demands_close());
        assert!(PolicyStatus::Expired.demands_close());
        assert!(!PolicyStatus::Active.demands_close());
        assert!(!PolicyStatus::Cancelled.demands_close());
    }
}
