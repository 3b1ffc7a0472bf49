use std::collections::{BTreeMap, VecDeque};

use parking_lot::Mutex;

use crate::common::{FrameId, Timestamp};

/// Tracks access history for a single frame
#[derive(Debug)]
struct FrameAccessInfo {
    /// History of access timestamps (most recent at back, at most k kept)
    history: VecDeque<Timestamp>,
    /// Whether this frame is currently evictable
    is_evictable: bool,
}

impl FrameAccessInfo {
    fn new() -> Self {
        Self {
            history: VecDeque::new(),
            is_evictable: false,
        }
    }

    fn record_access(&mut self, timestamp: Timestamp, k: usize) {
        self.history.push_back(timestamp);
        while self.history.len() > k {
            self.history.pop_front();
        }
    }

    /// Backward k-distance from the current timestamp.
    /// None means fewer than k recorded accesses (+inf distance).
    fn k_distance(&self, current_timestamp: Timestamp, k: usize) -> Option<Timestamp> {
        if self.history.len() < k {
            None
        } else {
            Some(current_timestamp - self.history[self.history.len() - k])
        }
    }

    fn earliest_timestamp(&self) -> Option<Timestamp> {
        self.history.front().copied()
    }
}

struct ReplacerInner {
    /// Monotone logical clock, advanced on every recorded access
    current_timestamp: Timestamp,
    /// Number of tracked frames with `is_evictable == true`
    curr_size: usize,
    /// Ordered by frame id, which makes finite-distance ties deterministic
    entries: BTreeMap<FrameId, FrameAccessInfo>,
}

/// LRU-K replacement policy.
///
/// Evicts the evictable frame whose backward k-distance (current timestamp
/// minus the timestamp of the k-th most recent access) is largest. A frame
/// with fewer than k recorded accesses has +inf distance and is preferred;
/// ties among +inf frames fall back to classic LRU on the earliest recorded
/// timestamp, with a never-accessed frame ranking before every accessed one.
/// Ties among equal finite distances go to the smallest frame id.
pub struct LruKReplacer {
    k: usize,
    /// Frames must satisfy `0 <= frame_id < replacer_size`
    replacer_size: usize,
    inner: Mutex<ReplacerInner>,
}

impl LruKReplacer {
    pub fn new(k: usize, replacer_size: usize) -> Self {
        assert!(k > 0, "k must be positive");
        Self {
            k,
            replacer_size,
            inner: Mutex::new(ReplacerInner {
                current_timestamp: 0,
                curr_size: 0,
                entries: BTreeMap::new(),
            }),
        }
    }

    fn check_frame(&self, frame_id: FrameId) {
        assert!(
            frame_id.as_usize() < self.replacer_size,
            "frame id {} out of range (replacer size {})",
            frame_id,
            self.replacer_size
        );
    }

    /// Evicts the frame with the largest backward k-distance and untracks it.
    /// Returns None iff no evictable frame exists.
    pub fn evict(&self) -> Option<FrameId> {
        let mut inner = self.inner.lock();

        if inner.curr_size == 0 {
            return None;
        }

        let now = inner.current_timestamp;
        let k = self.k;

        let mut victim: Option<FrameId> = None;
        let mut victim_k_dist: Option<Timestamp> = None;
        let mut victim_earliest_ts: Option<Timestamp> = None;

        for (frame_id, info) in inner.entries.iter() {
            if !info.is_evictable {
                continue;
            }

            let k_dist = info.k_distance(now, k);
            let earliest_ts = info.earliest_timestamp();

            let should_replace = match (victim_k_dist, k_dist) {
                // Victim is +inf, candidate finite: keep the victim.
                (None, Some(_)) => false,
                // Victim finite, candidate +inf: take the candidate.
                (Some(_), None) => true,
                // Both +inf: earliest first timestamp wins; an empty
                // history counts as earlier than any timestamp.
                (None, None) => match (victim_earliest_ts, earliest_ts) {
                    (Some(v_ts), Some(c_ts)) => c_ts < v_ts,
                    (Some(_), None) => true,
                    _ => false,
                },
                // Both finite: strictly larger distance wins, so the
                // smallest frame id keeps ties (BTreeMap iteration order).
                (Some(v_dist), Some(c_dist)) => c_dist > v_dist,
            };

            if victim.is_none() || should_replace {
                victim = Some(*frame_id);
                victim_k_dist = k_dist;
                victim_earliest_ts = earliest_ts;
            }
        }

        if let Some(frame_id) = victim {
            inner.entries.remove(&frame_id);
            inner.curr_size -= 1;
        }

        victim
    }

    /// Records an access to the given frame at the next logical timestamp.
    pub fn record_access(&self, frame_id: FrameId) {
        self.check_frame(frame_id);

        let mut inner = self.inner.lock();
        inner.current_timestamp += 1;
        let timestamp = inner.current_timestamp;
        inner
            .entries
            .entry(frame_id)
            .or_insert_with(FrameAccessInfo::new)
            .record_access(timestamp, self.k);
    }

    /// Flips a frame's evictable flag, adjusting the replacer size. A frame
    /// not yet tracked begins tracking with an empty history.
    pub fn set_evictable(&self, frame_id: FrameId, is_evictable: bool) {
        self.check_frame(frame_id);

        let mut inner = self.inner.lock();
        let entry = inner
            .entries
            .entry(frame_id)
            .or_insert_with(FrameAccessInfo::new);
        if entry.is_evictable != is_evictable {
            entry.is_evictable = is_evictable;
            if is_evictable {
                inner.curr_size += 1;
            } else {
                inner.curr_size -= 1;
            }
        }
    }

    /// Untracks a frame. The frame must be evictable if tracked; untracking
    /// an unknown frame is a no-op.
    pub fn remove(&self, frame_id: FrameId) {
        self.check_frame(frame_id);

        let mut inner = self.inner.lock();
        if let Some(info) = inner.entries.get(&frame_id) {
            assert!(
                info.is_evictable,
                "cannot remove non-evictable frame {}",
                frame_id
            );
            inner.entries.remove(&frame_id);
            inner.curr_size -= 1;
        }
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.inner.lock().curr_size
    }

    pub fn k(&self) -> usize {
        self.k
    }
}
