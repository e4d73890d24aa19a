//! Change notification.
//!
//! Renderers and the sync adapter each hold their own receiver; the
//! engine emits one event per mutating call.

use crossbeam::channel::{unbounded, Receiver, Sender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FogEvent {
    /// Fog state changed; re-render or re-query.
    Changed,
}

#[derive(Debug, Default)]
pub struct EventHub {
    subscribers: Vec<Sender<FogEvent>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<FogEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Send to every live subscriber; subscribers whose receiver was
    /// dropped are removed.
    pub fn emit(&mut self, event: FogEvent) {
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_gets_each_event() {
        let mut hub = EventHub::new();
        let a = hub.subscribe();
        let b = hub.subscribe();
        hub.emit(FogEvent::Changed);
        hub.emit(FogEvent::Changed);
        assert_eq!(a.try_iter().count(), 2);
        assert_eq!(b.try_iter().count(), 2);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut hub = EventHub::new();
        let keep = hub.subscribe();
        drop(hub.subscribe());
        assert_eq!(hub.subscriber_count(), 2);
        hub.emit(FogEvent::Changed);
        assert_eq!(hub.subscriber_count(), 1);
        assert_eq!(keep.try_recv(), Ok(FogEvent::Changed));
    }
}
