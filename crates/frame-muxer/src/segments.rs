//! Segmented stream buffers
//!
//! Each input stream is a queue of segments; a segment is the run of units
//! between two flushes. There is always at least one segment, new ones are
//! opened at the back, and the front one is only dropped once it has been
//! consumed or truncated.

use std::collections::VecDeque;

/// Maximum video frames in the segment being filled
pub const MAX_SEGMENT_FRAMES: usize = 32;

/// Maximum audio in the segment being filled, in multiples of the cadence head
pub const MAX_SEGMENT_CADENCE_MULTIPLE: usize = 32;

/// Ordered queue of segments
#[derive(Debug, Clone)]
pub struct SegmentQueue<T> {
    segments: VecDeque<VecDeque<T>>,
}

impl<T> SegmentQueue<T> {
    pub fn new() -> Self {
        let mut segments = VecDeque::new();
        segments.push_back(VecDeque::new());
        Self { segments }
    }

    /// Close the current segment and open a new, empty one
    pub fn flush(&mut self) {
        self.segments.push_back(VecDeque::new());
    }

    /// Append a unit to the segment being filled
    pub fn push(&mut self, item: T) {
        self.back_mut().push_back(item);
    }

    /// Append units to the segment being filled
    pub fn extend<I: IntoIterator<Item = T>>(&mut self, items: I) {
        self.back_mut().extend(items);
    }

    /// Number of segments, including the one being filled
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Units in the oldest segment
    pub fn front_len(&self) -> usize {
        self.segments.front().map_or(0, VecDeque::len)
    }

    /// Units in the segment being filled
    pub fn back_len(&self) -> usize {
        self.segments.back().map_or(0, VecDeque::len)
    }

    /// Units across all segments
    pub fn total_len(&self) -> usize {
        self.segments.iter().map(VecDeque::len).sum()
    }

    /// Remove the next unit of the oldest segment
    pub fn pop_front(&mut self) -> Option<T> {
        self.segments.front_mut().and_then(VecDeque::pop_front)
    }

    /// Oldest segment, for consumers that take several units at once
    pub fn front_mut(&mut self) -> &mut VecDeque<T> {
        if self.segments.is_empty() {
            self.segments.push_back(VecDeque::new());
        }
        &mut self.segments[0]
    }

    /// Drop the oldest segment, returning how many units it still held
    ///
    /// The last remaining segment is emptied rather than removed.
    pub fn drop_front(&mut self) -> usize {
        if self.segments.len() > 1 {
            self.segments.pop_front().map_or(0, |segment| segment.len())
        } else {
            let segment = self.back_mut();
            let dropped = segment.len();
            segment.clear();
            dropped
        }
    }

    fn back_mut(&mut self) -> &mut VecDeque<T> {
        if self.segments.is_empty() {
            self.segments.push_back(VecDeque::new());
        }
        let last = self.segments.len() - 1;
        &mut self.segments[last]
    }
}

impl<T> Default for SegmentQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_has_one_empty_segment() {
        let queue: SegmentQueue<u32> = SegmentQueue::new();
        assert_eq!(queue.segment_count(), 1);
        assert_eq!(queue.front_len(), 0);
        assert_eq!(queue.back_len(), 0);
    }

    #[test]
    fn test_flush_adds_exactly_one_segment_and_keeps_data() {
        let mut queue = SegmentQueue::new();
        queue.extend([1, 2, 3]);

        for expected in 2..6 {
            queue.flush();
            assert_eq!(queue.segment_count(), expected);
            assert_eq!(queue.total_len(), 3);
        }
        assert_eq!(queue.front_len(), 3);
        assert_eq!(queue.back_len(), 0);
    }

    #[test]
    fn test_push_goes_to_back_segment() {
        let mut queue = SegmentQueue::new();
        queue.push(1);
        queue.flush();
        queue.push(2);
        queue.push(3);

        assert_eq!(queue.front_len(), 1);
        assert_eq!(queue.back_len(), 2);
        assert_eq!(queue.pop_front(), Some(1));
        assert_eq!(queue.pop_front(), None);
    }

    #[test]
    fn test_drop_front() {
        let mut queue = SegmentQueue::new();
        queue.extend([1, 2]);
        queue.flush();
        queue.push(3);

        assert_eq!(queue.drop_front(), 2);
        assert_eq!(queue.segment_count(), 1);
        assert_eq!(queue.pop_front(), Some(3));
    }

    #[test]
    fn test_drop_last_segment_keeps_invariant() {
        let mut queue = SegmentQueue::new();
        queue.extend([1, 2]);

        assert_eq!(queue.drop_front(), 2);
        assert_eq!(queue.segment_count(), 1);
        assert_eq!(queue.total_len(), 0);
    }

    #[test]
    fn test_front_mut_drains_oldest() {
        let mut queue: SegmentQueue<i32> = SegmentQueue::new();
        queue.extend(0..8);
        queue.flush();
        queue.extend(100..104);

        let taken: Vec<i32> = queue.front_mut().drain(..5).collect();
        assert_eq!(taken, vec![0, 1, 2, 3, 4]);
        assert_eq!(queue.front_len(), 3);
        assert_eq!(queue.back_len(), 4);
    }
}
