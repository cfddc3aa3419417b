//! Load-shedding semaphores for the RPC plane.
//!
//! Two counting semaphores cap concurrent unary RPCs and active
//! subscriptions. Acquisition is non-blocking: a denied acquire maps to a
//! `ResourceExhausted` status at the service boundary. Permits are RAII, so
//! every exit path releases.

use std::sync::Arc;

use tokio::sync::OwnedSemaphorePermit;
use tokio::sync::Semaphore;

pub(crate) struct AdmissionLimiter {
    unary: Arc<Semaphore>,
    subscribe: Arc<Semaphore>,
}

impl AdmissionLimiter {
    pub(crate) fn new(max_unary: usize, max_subscriptions: usize) -> Self {
        Self {
            unary: Arc::new(Semaphore::new(max_unary)),
            subscribe: Arc::new(Semaphore::new(max_subscriptions)),
        }
    }

    pub(crate) fn try_unary(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.unary).try_acquire_owned().ok()
    }

    pub(crate) fn try_subscribe(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.subscribe).try_acquire_owned().ok()
    }

    #[cfg(test)]
    pub(crate) fn available_unary(&self) -> usize {
        self.unary.available_permits()
    }

    #[cfg(test)]
    pub(crate) fn available_subscribe(&self) -> usize {
        self.subscribe.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_should_always_deny() {
        let limiter = AdmissionLimiter::new(0, 0);
        assert!(limiter.try_unary().is_none());
        assert!(limiter.try_subscribe().is_none());
    }

    #[test]
    fn dropping_the_permit_should_restore_capacity() {
        let limiter = AdmissionLimiter::new(1, 1);

        let permit = limiter.try_unary().expect("first acquire succeeds");
        assert!(limiter.try_unary().is_none());

        drop(permit);
        assert_eq!(limiter.available_unary(), 1);
        assert!(limiter.try_unary().is_some());
    }

    #[test]
    fn unary_and_subscribe_pools_should_be_independent() {
        let limiter = AdmissionLimiter::new(1, 0);
        assert!(limiter.try_unary().is_some());
        assert!(limiter.try_subscribe().is_none());
        assert_eq!(limiter.available_subscribe(), 0);
    }
}
