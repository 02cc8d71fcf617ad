use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::domain::UserId;

/// Per-call context: who is acting, plus a cancellation handle and optional deadline.
///
/// Clones share the cancellation flag, so a caller can keep one clone and cancel the
/// operation running with the other.
#[derive(Debug, Clone)]
pub struct RequestContext {
    actor: UserId,
    cancelled: Arc<AtomicBool>,
    deadline: Option<DateTime<Utc>>,
}

/// Raised by [`RequestContext::checkpoint`] once the call must stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Interrupted {
    #[error("operation cancelled by caller")]
    Cancelled,
    #[error("operation deadline exceeded")]
    DeadlineExceeded,
}

impl RequestContext {
    pub fn new(actor: UserId) -> Self {
        Self {
            actor,
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let budget =
            chrono::Duration::from_std(timeout).unwrap_or_else(|_| chrono::Duration::days(36_500));
        self.deadline = Utc::now().checked_add_signed(budget);
        self
    }

    pub fn actor(&self) -> UserId {
        self.actor
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.checkpoint().is_err()
    }

    /// Call before every store mutation.
    pub fn checkpoint(&self) -> Result<(), Interrupted> {
        if self.cancelled.load(Ordering::Acquire) {
            return Err(Interrupted::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Utc::now() >= deadline {
                return Err(Interrupted::DeadlineExceeded);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_visible_through_clones() {
        let ctx = RequestContext::new(UserId::new());
        let handle = ctx.clone();
        assert!(ctx.checkpoint().is_ok());

        handle.cancel();

        assert_eq!(ctx.checkpoint(), Err(Interrupted::Cancelled));
    }

    #[test]
    fn elapsed_deadline_interrupts() {
        let ctx = RequestContext::new(UserId::new()).with_timeout(Duration::ZERO);
        assert_eq!(ctx.checkpoint(), Err(Interrupted::DeadlineExceeded));
    }

    #[test]
    fn generous_deadline_allows_work() {
        let ctx = RequestContext::new(UserId::new()).with_timeout(Duration::from_secs(60));
        assert!(!ctx.is_cancelled());
    }
}
