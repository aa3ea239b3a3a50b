//! Lap notification handoff
//!
//! Host notifications arrive on the host's own execution context. They are
//! parked in a single latest-value slot; the controller picks the slot up at
//! the start of its next tick. Sending never blocks and never waits for the
//! tick loop.

use rsd_core::model::LapEvent;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;

/// A lap event stamped with the moment it was handed over
#[derive(Debug, Clone, PartialEq)]
pub struct PendingLap {
    pub event: LapEvent,
    pub received_at: Instant,
}

/// Create a connected sender/inbox pair
pub fn lap_channel() -> (LapSender, LapInbox) {
    let (tx, rx) = watch::channel(None);
    (LapSender { tx: Arc::new(tx) }, LapInbox { rx })
}

/// Host-side end of the handoff
#[derive(Debug, Clone)]
pub struct LapSender {
    tx: Arc<watch::Sender<Option<PendingLap>>>,
}

impl LapSender {
    /// Hand a lap event to the controller, replacing any not yet picked up
    pub fn notify(&self, event: LapEvent) {
        self.notify_at(event, Instant::now());
    }

    pub fn notify_at(&self, event: LapEvent, received_at: Instant) {
        self.tx.send_replace(Some(PendingLap { event, received_at }));
    }
}

/// Controller-side end of the handoff
#[derive(Debug)]
pub struct LapInbox {
    rx: watch::Receiver<Option<PendingLap>>,
}

impl LapInbox {
    /// Take the newest lap event if one arrived since the last call
    pub fn take(&mut self) -> Option<PendingLap> {
        match self.rx.has_changed() {
            Ok(true) => self.rx.borrow_and_update().clone(),
            Ok(false) | Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lap(pilot: &str) -> LapEvent {
        LapEvent {
            pilot_display_name: pilot.to_string(),
            lap_number: 1,
            lap_time_display: "0:30.000".to_string(),
            position: None,
        }
    }

    #[test]
    fn test_inbox_empty_until_notified() {
        let (_tx, mut inbox) = lap_channel();
        assert!(inbox.take().is_none());
    }

    #[test]
    fn test_each_event_taken_once() {
        let (tx, mut inbox) = lap_channel();
        tx.notify(lap("Red5"));
        assert_eq!(inbox.take().map(|p| p.event.pilot_display_name), Some("Red5".to_string()));
        assert!(inbox.take().is_none());
    }

    #[test]
    fn test_latest_event_wins() {
        let (tx, mut inbox) = lap_channel();
        let sender = tx.clone();
        tx.notify(lap("Red5"));
        sender.notify(lap("Gold2"));
        assert_eq!(inbox.take().map(|p| p.event.pilot_display_name), Some("Gold2".to_string()));
    }
}
