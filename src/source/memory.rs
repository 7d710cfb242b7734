//! Vector-backed event source

use crate::error::SourceResult;
use crate::types::RawEvent;

use super::{EventSource, EventStream};

/// Event source over events held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventSource {
    events: Vec<RawEvent>,
}

impl InMemoryEventSource {
    /// Create a source; each event's position is set to its index
    pub fn new(events: Vec<RawEvent>) -> Self {
        let events = events
            .into_iter()
            .enumerate()
            .map(|(i, event)| event.at_position(i as u64))
            .collect();
        Self { events }
    }

    /// Append an event at the end of the log
    pub fn push(&mut self, event: RawEvent) {
        let position = self.events.len() as u64;
        self.events.push(event.at_position(position));
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSource for InMemoryEventSource {
    fn read_from(&self, position: u64) -> SourceResult<EventStream<'_>> {
        let skip = usize::try_from(position).unwrap_or(usize::MAX);
        Ok(Box::new(self.events.iter().skip(skip).cloned().map(Ok)))
    }

    fn describe(&self) -> String {
        format!("in-memory log ({} events)", self.events.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> InMemoryEventSource {
        InMemoryEventSource::new(vec![
            RawEvent::new("e1", "OrderPlaced", "order-1", 100),
            RawEvent::new("e2", "OrderPaid", "order-1", 101),
            RawEvent::new("e3", "OrderShipped", "order-1", 102),
        ])
    }

    #[test]
    fn test_positions_follow_insertion_order() {
        let mut source = source();
        source.push(RawEvent::new("e4", "OrderClosed", "order-1", 103));

        let positions: Vec<u64> = source
            .read_from(0)
            .unwrap()
            .map(|e| e.unwrap().position)
            .collect();
        assert_eq!(positions, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_read_from_position() {
        let ids: Vec<String> = source()
            .read_from(1)
            .unwrap()
            .map(|e| e.unwrap().id.unwrap())
            .collect();
        assert_eq!(ids, vec!["e2", "e3"]);

        assert_eq!(source().read_from(10).unwrap().count(), 0);
    }
}
