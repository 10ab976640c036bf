//! Connection-slot admission. Adapted from the executor's atomic action
//! budget — a construction-time resource gate callers must acquire before
//! doing work — rebuilt on `tokio::sync::Semaphore` since bounding
//! concurrent in-flight requests (rather than a rate-of-actions-per-interval
//! counter) is exactly what a semaphore is for.

use crate::error::{HttpCoreError, Result};
use std::time::Duration;
use tokio::sync::{Semaphore, SemaphorePermit};

pub struct ConnectionPool {
    semaphore: Semaphore,
    connection_timeout: Duration,
}

impl ConnectionPool {
    pub fn new(max_connections: usize, connection_timeout: Duration) -> Self {
        Self {
            semaphore: Semaphore::new(max_connections),
            connection_timeout,
        }
    }

    /// Wait for a slot, bounded by `connection_timeout`. On expiry, the
    /// caller's request fails with `PoolExhausted`.
    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>> {
        match tokio::time::timeout(self.connection_timeout, self.semaphore.acquire()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(HttpCoreError::PoolExhausted),
            Err(_) => Err(HttpCoreError::PoolExhausted),
        }
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquires_slot_when_capacity_available() {
        let pool = ConnectionPool::new(2, Duration::from_millis(50));
        let permit = pool.acquire().await;
        assert!(permit.is_ok());
        assert_eq!(pool.available_permits(), 1);
    }

    #[tokio::test]
    async fn times_out_with_pool_exhausted_when_at_capacity() {
        let pool = ConnectionPool::new(1, Duration::from_millis(20));
        let _held = pool.acquire().await.unwrap();
        let second = pool.acquire().await;
        assert!(matches!(second, Err(HttpCoreError::PoolExhausted)));
    }

    #[tokio::test]
    async fn releases_slot_when_permit_dropped() {
        let pool = ConnectionPool::new(1, Duration::from_millis(50));
        {
            let _permit = pool.acquire().await.unwrap();
            assert_eq!(pool.available_permits(), 0);
        }
        assert_eq!(pool.available_permits(), 1);
    }
}
