//! # Event Publisher
//!
//! Live fan-out of [`RunEvent`]s to in-process subscribers (dashboards,
//! tests, log forwarders). Delivery is best-effort over a broadcast channel;
//! the durable record is the sink, not this.

use tokio::sync::broadcast;

use crate::events::sink::RunEvent;

/// Broadcast publisher for run lifecycle events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<RunEvent>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// A broadcast send fails only when there are no subscribers, which is
    /// normal here - events are published whether or not anyone listens.
    pub fn publish(&self, event: RunEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to events published from this point on
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::sink::EventKind;

    #[tokio::test]
    async fn test_publish_without_subscribers_is_fine() {
        let publisher = EventPublisher::new(16);
        assert_eq!(publisher.subscriber_count(), 0);
        publisher.publish(RunEvent::dag_done("run-1"));
    }

    #[tokio::test]
    async fn test_subscribers_receive_published_events() {
        let publisher = EventPublisher::new(16);
        let mut rx = publisher.subscribe();

        publisher.publish(RunEvent::task_start("run-1", "a"));
        publisher.publish(RunEvent::task_ok("run-1", "a", 1));

        assert_eq!(rx.recv().await.unwrap().event, EventKind::TaskStart);
        assert_eq!(rx.recv().await.unwrap().event, EventKind::TaskOk);
    }

    #[tokio::test]
    async fn test_each_subscriber_sees_every_event() {
        let publisher = EventPublisher::new(16);
        let mut first = publisher.subscribe();
        let mut second = publisher.subscribe();
        assert_eq!(publisher.subscriber_count(), 2);

        publisher.publish(RunEvent::dag_done("run-7"));

        assert_eq!(first.recv().await.unwrap().dag_run_id, "run-7");
        assert_eq!(second.recv().await.unwrap().dag_run_id, "run-7");
    }
}
