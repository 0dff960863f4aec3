use chrono::Duration;

use crate::orders::OrderStatus;

/// Elapsed time after which the scheduler moves an order to its next status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleDurations {
    pub pending_to_shipped: Duration,
    pub shipped_to_delivered: Duration,
}

impl LifecycleDurations {
    pub fn from_secs(pending_to_shipped: u32, shipped_to_delivered: u32) -> Self {
        Self {
            pending_to_shipped: Duration::seconds(i64::from(pending_to_shipped)),
            shipped_to_delivered: Duration::seconds(i64::from(shipped_to_delivered)),
        }
    }
}

impl Default for LifecycleDurations {
    fn default() -> Self {
        Self::from_secs(10, 20)
    }
}

/// Rules of the order lifecycle
pub struct StatusMachine;

impl StatusMachine {
    /// Next status in the lifecycle
    ///
    /// # Returns
    /// `None` for Delivered, which is terminal
    ///
    /// # Lifecycle
    /// - Pending → Shipped
    /// - Shipped → Delivered
    pub fn next(status: OrderStatus) -> Option<OrderStatus> {
        match status {
            OrderStatus::Pending => Some(OrderStatus::Shipped),
            OrderStatus::Shipped => Some(OrderStatus::Delivered),
            OrderStatus::Delivered => None,
        }
    }

    /// Check whether `to` is exactly one step forward from `from`
    ///
    /// Administrator overrides may set any status; this only describes the
    /// automatic lifecycle.
    pub fn is_forward_step(from: OrderStatus, to: OrderStatus) -> bool {
        Self::next(from) == Some(to)
    }

    pub fn is_terminal(status: OrderStatus) -> bool {
        Self::next(status).is_none()
    }

    /// Transition due for an order that has been in `status` for `elapsed`
    ///
    /// # Arguments
    /// * `status` - Current order status
    /// * `elapsed` - Time since the last status change
    /// * `durations` - Configured lifecycle thresholds
    ///
    /// # Returns
    /// The status to move to, or `None` if the order stays put. At most one step is
    /// taken per call.
    pub fn due_transition(
        status: OrderStatus,
        elapsed: Duration,
        durations: &LifecycleDurations,
    ) -> Option<OrderStatus> {
        match status {
            OrderStatus::Pending if elapsed >= durations.pending_to_shipped => Some(OrderStatus::Shipped),
            OrderStatus::Shipped if elapsed >= durations.shipped_to_delivered => {
                Some(OrderStatus::Delivered)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_to_shipped() {
        assert!(StatusMachine::is_forward_step(OrderStatus::Pending, OrderStatus::Shipped));
    }

    #[test]
    fn test_shipped_to_delivered() {
        assert!(StatusMachine::is_forward_step(OrderStatus::Shipped, OrderStatus::Delivered));
    }

    #[test]
    fn test_no_skipping() {
        assert!(!StatusMachine::is_forward_step(OrderStatus::Pending, OrderStatus::Delivered));
    }

    #[test]
    fn test_no_backward_steps() {
        assert!(!StatusMachine::is_forward_step(OrderStatus::Shipped, OrderStatus::Pending));
        assert!(!StatusMachine::is_forward_step(OrderStatus::Delivered, OrderStatus::Shipped));
        assert!(!StatusMachine::is_forward_step(OrderStatus::Delivered, OrderStatus::Pending));
    }

    #[test]
    fn test_same_status_is_not_a_step() {
        assert!(!StatusMachine::is_forward_step(OrderStatus::Pending, OrderStatus::Pending));
    }

    #[test]
    fn test_delivered_is_terminal() {
        assert!(StatusMachine::is_terminal(OrderStatus::Delivered));
        assert_eq!(StatusMachine::next(OrderStatus::Delivered), None);
        assert!(!StatusMachine::is_terminal(OrderStatus::Pending));
    }

    #[test]
    fn test_pending_not_due_before_threshold() {
        let durations = LifecycleDurations::from_secs(10, 20);
        assert_eq!(
            StatusMachine::due_transition(OrderStatus::Pending, Duration::seconds(9), &durations),
            None
        );
    }

    #[test]
    fn test_pending_due_at_threshold() {
        let durations = LifecycleDurations::from_secs(10, 20);
        assert_eq!(
            StatusMachine::due_transition(OrderStatus::Pending, Duration::seconds(10), &durations),
            Some(OrderStatus::Shipped)
        );
    }

    #[test]
    fn test_pending_takes_one_step_even_when_long_overdue() {
        let durations = LifecycleDurations::from_secs(10, 20);
        assert_eq!(
            StatusMachine::due_transition(OrderStatus::Pending, Duration::hours(5), &durations),
            Some(OrderStatus::Shipped)
        );
    }

    #[test]
    fn test_shipped_uses_its_own_threshold() {
        let durations = LifecycleDurations::from_secs(10, 20);
        assert_eq!(
            StatusMachine::due_transition(OrderStatus::Shipped, Duration::seconds(15), &durations),
            None
        );
        assert_eq!(
            StatusMachine::due_transition(OrderStatus::Shipped, Duration::seconds(20), &durations),
            Some(OrderStatus::Delivered)
        );
    }

    #[test]
    fn test_delivered_never_due() {
        let durations = LifecycleDurations::from_secs(0, 0);
        assert_eq!(
            StatusMachine::due_transition(OrderStatus::Delivered, Duration::days(365), &durations),
            None
        );
    }

    #[test]
    fn test_default_durations() {
        let durations = LifecycleDurations::default();
        assert_eq!(durations.pending_to_shipped, Duration::seconds(10));
        assert_eq!(durations.shipped_to_delivered, Duration::seconds(20));
    }
}
