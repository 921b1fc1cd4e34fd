//! Typed change events emitted by every state mutation
//!
//! Mutations push events into an [`EventBus`] outbox. The manager drains the
//! outbox synchronously after each input (persistence, overlay) and forwards
//! every event to the broadcast stream read by external collaborators.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::section::SectionName;
use crate::types::Point;

/// Capacity of the external broadcast stream; slow readers lag, they never block
const BROADCAST_CAPACITY: usize = 256;

/// Entries offered by the empty-region context menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ContextMenuItem {
    EditAppearance,
    OpenSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SectionEvent {
    SectionShown { section: SectionName },
    SectionHidden { section: SectionName },
    SectionEnabledChanged { section: SectionName, enabled: bool },
    /// Control items were re-assigned to sections after a position change
    SectionsReordered,
    ControlItemMoved { section: SectionName },
    DraggingChanged { dragging: bool },
    ContextMenuRequested { location: Point, items: Vec<ContextMenuItem> },
    /// The overlay path or backdrop changed and must be repainted
    OverlayInvalidated,
    /// The query collaborator has no access; an outer UI should prompt
    PermissionRequired,
}

impl SectionEvent {
    /// Events that change what should be saved to disk
    pub fn affects_persisted_state(&self) -> bool {
        matches!(
            self,
            SectionEvent::SectionShown { .. }
                | SectionEvent::SectionHidden { .. }
                | SectionEvent::SectionEnabledChanged { .. }
                | SectionEvent::SectionsReordered
                | SectionEvent::ControlItemMoved { .. }
        )
    }

    /// Events after which the overlay geometry must be recomputed
    pub fn affects_overlay(&self) -> bool {
        !matches!(
            self,
            SectionEvent::ContextMenuRequested { .. }
                | SectionEvent::PermissionRequired
                | SectionEvent::OverlayInvalidated
        )
    }
}

/// Outbox plus external stream
#[derive(Debug)]
pub struct EventBus {
    pending: Vec<SectionEvent>,
    sender: broadcast::Sender<SectionEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            pending: Vec::new(),
            sender,
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event: SectionEvent) {
        trace!(event = ?event, "Emitting section event");
        self.pending.push(event);
    }

    /// Subscribe to the read-only stream of changes
    pub fn subscribe(&self) -> broadcast::Receiver<SectionEvent> {
        self.sender.subscribe()
    }

    /// Take pending events in emission order and publish them to subscribers
    pub fn drain(&mut self) -> Vec<SectionEvent> {
        let events = std::mem::take(&mut self.pending);
        for event in &events {
            // No subscribers is fine
            let _ = self.sender.send(event.clone());
        }
        events
    }

    #[cfg(test)]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_preserves_order_and_publishes() {
        let mut bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit(SectionEvent::SectionShown { section: SectionName::Visible });
        bus.emit(SectionEvent::SectionShown { section: SectionName::Hidden });

        let drained = bus.drain();
        assert_eq!(drained.len(), 2);
        assert!(!bus.has_pending());
        assert_eq!(rx.try_recv().unwrap(), drained[0]);
        assert_eq!(rx.try_recv().unwrap(), drained[1]);
    }

    #[test]
    fn test_drain_without_subscribers() {
        let mut bus = EventBus::new();
        bus.emit(SectionEvent::SectionsReordered);
        assert_eq!(bus.drain(), vec![SectionEvent::SectionsReordered]);
    }

    #[test]
    fn test_event_classification() {
        assert!(SectionEvent::SectionsReordered.affects_persisted_state());
        assert!(!SectionEvent::DraggingChanged { dragging: true }.affects_persisted_state());
        assert!(SectionEvent::DraggingChanged { dragging: true }.affects_overlay());
        assert!(!SectionEvent::PermissionRequired.affects_overlay());
    }
}
