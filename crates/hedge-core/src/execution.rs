//! ExecutionAttempt: the immutable audit record written for every hedge
//! decision, successful or not.

use crate::policy::PolicyId;
use crate::position::{PositionId, StrategyKind, Venue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reason a strategy executor declined to hedge, or a terminal failure
/// surfaced past it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "detail")]
pub enum AttemptFailureReason {
    NoHedgeApplicable,
    AllVenuesExhausted,
    AllEndpointsFailed,
    CircuitOpen,
    MarketNotFound,
    InsufficientLiquidity,
    InsufficientMargin,
    InvalidOrder(String),
    AuthenticationError,
    BudgetExceeded,
    RepositoryError(String),
}

impl std::fmt::Display for AttemptFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoHedgeApplicable => write!(f, "no hedge applicable"),
            Self::AllVenuesExhausted => write!(f, "all venues exhausted"),
            Self::AllEndpointsFailed => write!(f, "all endpoints failed"),
            Self::CircuitOpen => write!(f, "circuit open"),
            Self::MarketNotFound => write!(f, "market not found"),
            Self::InsufficientLiquidity => write!(f, "insufficient liquidity"),
            Self::InsufficientMargin => write!(f, "insufficient margin"),
            Self::InvalidOrder(reason) => write!(f, "invalid order: {reason}"),
            Self::AuthenticationError => write!(f, "authentication error"),
            Self::BudgetExceeded => write!(f, "budget exceeded"),
            Self::RepositoryError(reason) => write!(f, "repository error: {reason}"),
        }
    }
}

/// Outcome of a single execution attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum AttemptResult {
    Success { position_id: PositionId },
    Failure { reason: AttemptFailureReason },
}

impl AttemptResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Who or what triggered the attempt; every attempt today is automated, but
/// the field exists so an operator-triggered retry is distinguishable later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOrigin {
    Automation,
    Operator,
}

/// Immutable audit record. Once constructed, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionAttempt {
    pub policy_id: PolicyId,
    pub strategy: StrategyKind,
    pub venue: Option<Venue>,
    /// Fingerprint of the request payload (e.g. a hash), for audit
    /// correlation without re-storing secrets or full request bodies.
    pub request_fingerprint: String,
    pub result: AttemptResult,
    pub attempted_at: DateTime<Utc>,
    pub origin: AttemptOrigin,
}

impl ExecutionAttempt {
    pub fn success(
        policy_id: PolicyId,
        strategy: StrategyKind,
        venue: Venue,
        request_fingerprint: String,
        position_id: PositionId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            policy_id,
            strategy,
            venue: Some(venue),
            request_fingerprint,
            result: AttemptResult::Success { position_id },
            attempted_at: now,
            origin: AttemptOrigin::Automation,
        }
    }

    pub fn failure(
        policy_id: PolicyId,
        strategy: StrategyKind,
        venue: Option<Venue>,
        request_fingerprint: String,
        reason: AttemptFailureReason,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            policy_id,
            strategy,
            venue,
            request_fingerprint,
            result: AttemptResult::Failure { reason },
            attempted_at: now,
            origin: AttemptOrigin::Automation,
        }
    }
}
