use heapless::Deque;

use crate::config::ALERT_QUEUE_CAPACITY;
use crate::types::MedalAlertEvent;

/// Pending alerts waiting for the overlay, oldest first.
///
/// Never blocks and never grows: when full, the oldest pending alert is
/// dropped to make room, so the queue always holds the most recent
/// `ALERT_QUEUE_CAPACITY` arrivals in order.
#[derive(Debug, Default)]
pub struct AlertQueue {
    events: Deque<MedalAlertEvent, ALERT_QUEUE_CAPACITY>,
}

impl AlertQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `event`, returning the alert displaced to make room, if any.
    pub fn enqueue(&mut self, event: MedalAlertEvent) -> Option<MedalAlertEvent> {
        let dropped = if self.events.is_full() {
            self.events.pop_front()
        } else {
            None
        };
        // Cannot fail: a slot was freed above if the deque was full.
        let _ = self.events.push_back(event);
        dropped
    }

    pub fn dequeue(&mut self) -> Option<MedalAlertEvent> {
        self.events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MedalType;
    use proptest::prelude::*;

    fn event(delta: u16) -> MedalAlertEvent {
        MedalAlertEvent::unattributed(MedalType::Gold, delta)
    }

    #[test]
    fn fifo_order() {
        let mut q = AlertQueue::new();
        assert!(q.dequeue().is_none());
        q.enqueue(event(1));
        q.enqueue(event(2));
        assert_eq!(q.len(), 2);
        assert_eq!(q.dequeue().unwrap().delta, 1);
        assert_eq!(q.dequeue().unwrap().delta, 2);
        assert!(q.is_empty());
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut q = AlertQueue::new();
        for d in 1..=4 {
            assert!(q.enqueue(event(d)).is_none());
        }
        let dropped = q.enqueue(event(5)).unwrap();
        assert_eq!(dropped.delta, 1);

        let drained: Vec<u16> = std::iter::from_fn(|| q.dequeue()).map(|e| e.delta).collect();
        assert_eq!(drained, vec![2, 3, 4, 5]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_keeps_most_recent_arrivals(
            ops in proptest::collection::vec(any::<Option<u16>>(), 0..64),
        ) {
            let mut q = AlertQueue::new();
            let mut model: std::collections::VecDeque<u16> = Default::default();

            for op in ops {
                match op {
                    Some(d) => {
                        q.enqueue(event(d));
                        model.push_back(d);
                        if model.len() > ALERT_QUEUE_CAPACITY {
                            model.pop_front();
                        }
                    }
                    None => {
                        prop_assert_eq!(q.dequeue().map(|e| e.delta), model.pop_front());
                    }
                }
                prop_assert!(q.len() <= ALERT_QUEUE_CAPACITY);
                prop_assert_eq!(q.len(), model.len());
            }
        }
    }
}
