use std::sync::Mutex;

use super::replacer::Replacer;
use crate::typedef::FrameId;

/// Intrusive doubly-linked ordering over frame indices: `next` points toward
/// the tail (less recently unpinned), `prev` toward the head. Keeping the
/// links in index vectors sized to the pool makes every operation O(1)
/// without per-node allocation.
#[derive(Debug)]
struct LruList {
    next: Vec<Option<FrameId>>,
    prev: Vec<Option<FrameId>>,
    tracked: Vec<bool>,
    head: Option<FrameId>, // most recently unpinned
    tail: Option<FrameId>, // least recently unpinned
    len: usize,
}

impl LruList {
    fn new(capacity: usize) -> Self {
        Self {
            next: vec![None; capacity],
            prev: vec![None; capacity],
            tracked: vec![false; capacity],
            head: None,
            tail: None,
            len: 0,
        }
    }

    fn push_front(&mut self, frame_id: FrameId) {
        self.prev[frame_id] = None;
        self.next[frame_id] = self.head;
        match self.head {
            Some(old_head) => self.prev[old_head] = Some(frame_id),
            None => self.tail = Some(frame_id),
        }
        self.head = Some(frame_id);
        self.tracked[frame_id] = true;
        self.len += 1;
    }

    fn unlink(&mut self, frame_id: FrameId) {
        let prev = self.prev[frame_id];
        let next = self.next[frame_id];
        match prev {
            Some(prev) => self.next[prev] = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.prev[next] = prev,
            None => self.tail = prev,
        }
        self.prev[frame_id] = None;
        self.next[frame_id] = None;
        self.tracked[frame_id] = false;
        self.len -= 1;
    }
}

/// Least-recently-unpinned replacement policy.
///
/// Eligibility is ordered by unpin events, not accesses: a frame enters the
/// order once its pin count reaches zero and leaves it when re-pinned or
/// selected as a victim.
#[derive(Debug)]
pub struct LruReplacer {
    list: Mutex<LruList>,
}

impl LruReplacer {
    /// Creates a replacer able to track up to `capacity` frames, indexed
    /// `0..capacity`.
    pub fn new(capacity: usize) -> Self {
        Self {
            list: Mutex::new(LruList::new(capacity)),
        }
    }
}

impl Replacer for LruReplacer {
    fn mark_unpinned(&self, frame_id: FrameId) {
        let mut list = self.list.lock().unwrap();
        debug_assert!(frame_id < list.tracked.len());
        // A frame is tracked at most once; a second unpin keeps its position.
        if list.tracked[frame_id] {
            return;
        }
        list.push_front(frame_id);
    }

    fn mark_pinned(&self, frame_id: FrameId) {
        let mut list = self.list.lock().unwrap();
        debug_assert!(frame_id < list.tracked.len());
        if !list.tracked[frame_id] {
            return;
        }
        list.unlink(frame_id);
    }

    fn select_victim(&self) -> Option<FrameId> {
        let mut list = self.list.lock().unwrap();
        let victim = list.tail?;
        list.unlink(victim);
        Some(victim)
    }

    fn tracked_count(&self) -> usize {
        self.list.lock().unwrap().len
    }
}
