//! Batch accumulator
//!
//! A batch covers a contiguous range of source positions. Undecodable
//! events still occupy a slot so that the range stays contiguous and the
//! checkpoint can move past them.

use crate::types::RawEvent;

#[derive(Debug)]
pub(crate) struct PendingBatch {
    events: Vec<RawEvent>,
    first_position: Option<u64>,
    end_position: u64,
    slots: usize,
}

impl PendingBatch {
    /// Empty batch whose range would begin at `start`
    pub(crate) fn new(start: u64, capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
            first_position: None,
            end_position: start,
            slots: 0,
        }
    }

    pub(crate) fn push(&mut self, event: RawEvent) {
        self.occupy(event.position);
        self.events.push(event);
    }

    /// Take up the slot of an event that was rejected while decoding
    pub(crate) fn skip(&mut self, position: u64) {
        self.occupy(position);
    }

    fn occupy(&mut self, position: u64) {
        self.first_position.get_or_insert(position);
        self.end_position = position + 1;
        self.slots += 1;
    }

    /// Source positions consumed, decoded or not
    pub(crate) fn len(&self) -> usize {
        self.slots
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.slots == 0
    }

    /// First position in the batch, or where it would start if empty
    pub(crate) fn first_position(&self) -> u64 {
        self.first_position.unwrap_or(self.end_position)
    }

    /// Position following the last consumed event
    pub(crate) fn end_position(&self) -> u64 {
        self.end_position
    }

    /// Hand out the events and start a new batch after this one
    pub(crate) fn take_events(&mut self) -> Vec<RawEvent> {
        let capacity = self.events.capacity();
        let events = std::mem::replace(&mut self.events, Vec::with_capacity(capacity));
        self.first_position = None;
        self.slots = 0;
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_tracks_pushed_and_skipped_positions() {
        let mut batch = PendingBatch::new(5, 4);
        assert!(batch.is_empty());
        assert_eq!(batch.first_position(), 5);

        batch.push(RawEvent::new("e1", "T", "s", 1).at_position(5));
        batch.skip(6);
        batch.push(RawEvent::new("e3", "T", "s", 1).at_position(7));

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.first_position(), 5);
        assert_eq!(batch.end_position(), 8);

        let events = batch.take_events();
        assert_eq!(events.len(), 2);
        assert!(batch.is_empty());
        assert_eq!(batch.first_position(), 8);
        assert_eq!(batch.end_position(), 8);
    }
}
