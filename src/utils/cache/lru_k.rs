use std::collections::{HashMap, HashSet, VecDeque};

use log::warn;

use crate::buffer::FrameId;
use crate::error::{QuillIndexError, QuillIndexResult};
use crate::utils::cache::Replacer;

/// LRU-K victim selection over buffer frames.
///
/// Accesses are stamped with a logical clock, so eviction order only depends on
/// the order of `record_access` calls. A frame with fewer than `k` recorded
/// accesses has infinite backward k-distance and is preferred as a victim; ties
/// among those fall back to the oldest first access.
#[derive(Debug)]
pub struct LRUKReplacer {
    k: usize,
    capacity: usize,
    current_timestamp: u64,
    // last k access timestamps of every tracked frame, pinned or not
    access_history: HashMap<FrameId, VecDeque<u64>>,
    // frames with pin_count == 0
    evictable_frames: HashSet<FrameId>,
}

impl LRUKReplacer {
    pub fn with_k(capacity: usize, k: usize) -> Self {
        assert!(k > 0, "k must be greater than 0");
        Self {
            k,
            capacity,
            current_timestamp: 0,
            access_history: HashMap::new(),
            evictable_frames: HashSet::new(),
        }
    }

    fn check_frame(&self, frame_id: FrameId) -> QuillIndexResult<()> {
        if frame_id >= self.capacity {
            return Err(QuillIndexError::Internal(format!(
                "frame id {} out of replacer capacity {}",
                frame_id, self.capacity
            )));
        }
        Ok(())
    }
}

impl Replacer for LRUKReplacer {
    fn new(capacity: usize) -> Self {
        Self::with_k(capacity, 2)
    }

    fn record_access(&mut self, frame_id: FrameId) -> QuillIndexResult<()> {
        self.check_frame(frame_id)?;
        self.current_timestamp += 1;
        let history = self.access_history.entry(frame_id).or_default();
        history.push_back(self.current_timestamp);
        if history.len() > self.k {
            history.pop_front();
        }
        Ok(())
    }

    fn evict(&mut self) -> Option<FrameId> {
        let mut victim: Option<(FrameId, bool, u64)> = None;
        for frame_id in self.evictable_frames.iter() {
            let Some(history) = self.access_history.get(frame_id) else {
                warn!("evictable frame {} has no access history", frame_id);
                continue;
            };
            let Some(&oldest) = history.front() else {
                continue;
            };
            let infinite = history.len() < self.k;
            let better = match victim {
                None => true,
                Some((_, best_infinite, best_oldest)) => {
                    (infinite && !best_infinite) || (infinite == best_infinite && oldest < best_oldest)
                }
            };
            if better {
                victim = Some((*frame_id, infinite, oldest));
            }
        }

        let (frame_id, _, _) = victim?;
        self.remove(frame_id);
        Some(frame_id)
    }

    fn set_evictable(&mut self, frame_id: FrameId, set_evictable: bool) -> QuillIndexResult<()> {
        self.check_frame(frame_id)?;
        if set_evictable {
            if !self.access_history.contains_key(&frame_id) {
                return Err(QuillIndexError::Internal(format!(
                    "frame {} made evictable without any recorded access",
                    frame_id
                )));
            }
            self.evictable_frames.insert(frame_id);
        } else {
            self.evictable_frames.remove(&frame_id);
        }
        Ok(())
    }

    fn remove(&mut self, frame_id: FrameId) {
        self.evictable_frames.remove(&frame_id);
        self.access_history.remove(&frame_id);
    }

    fn size(&self) -> usize {
        self.evictable_frames.len()
    }
}
