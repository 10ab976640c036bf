//! Shared executor result type and the request-fingerprint helper used to
//! populate `ExecutionAttempt::request_fingerprint` without persisting raw
//! request bodies.

use hedge_core::{AttemptFailureReason, HedgePosition, Venue};
use std::hash::{Hash, Hasher};

/// Translate a venue-layer error into the audit-record failure reason
/// shared across every executor's venue fallback loop.
pub fn map_venue_failure(err: &hedge_venues::VenueError) -> AttemptFailureReason {
    use hedge_venues::VenueError as V;
    match err {
        V::MarketNotFound => AttemptFailureReason::MarketNotFound,
        V::InsufficientLiquidity => AttemptFailureReason::InsufficientLiquidity,
        V::InsufficientMargin => AttemptFailureReason::InsufficientMargin,
        V::InvalidOrder(reason) => AttemptFailureReason::InvalidOrder(reason.clone()),
        V::PositionNotFound => AttemptFailureReason::InvalidOrder("position not found".to_string()),
        V::AuthenticationError(_) => AttemptFailureReason::AuthenticationError,
        V::Unsupported(reason) => AttemptFailureReason::InvalidOrder(reason.clone()),
        V::Http(hedge_http::HttpCoreError::CircuitOpen) => AttemptFailureReason::CircuitOpen,
        V::Http(_) => AttemptFailureReason::AllEndpointsFailed,
    }
}

/// What a strategy executor decided for one policy, carrying everything the
/// orchestrator needs to write the corresponding `ExecutionAttempt` without
/// re-deriving it. `Declined` covers both "no hedge applicable" and
/// terminal venue failures surfaced after exhausting the fallback chain.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    Opened {
        position: HedgePosition,
        fingerprint: String,
    },
    Declined {
        reason: AttemptFailureReason,
        venue: Option<Venue>,
        fingerprint: String,
    },
}

impl ExecutionOutcome {
    pub fn is_opened(&self) -> bool {
        matches!(self, Self::Opened { .. })
    }
}

/// A short, stable fingerprint of the inputs that drove a sizing decision,
/// for audit correlation without re-storing secrets or full request bodies.
pub fn fingerprint(parts: &[&str]) -> String {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    for part in parts {
        part.hash(&mut hasher);
    }
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_deterministic_for_the_same_parts() {
        let a = fingerprint(&["policy-42", "Depeg", "Polymarket"]);
        let b = fingerprint(&["policy-42", "Depeg", "Polymarket"]);
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_differs_for_different_parts() {
        let a = fingerprint(&["policy-42", "Depeg"]);
        let b = fingerprint(&["policy-43", "Depeg"]);
        assert_ne!(a, b);
    }
}
