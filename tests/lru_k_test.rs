//! Integration tests for the LRU-K replacer

use stratum::buffer::LruKReplacer;
use stratum::common::FrameId;

fn f(id: u32) -> FrameId {
    FrameId::new(id)
}

#[test]
fn test_documented_victim_sequence() {
    // 7 frames, k = 2. Accesses: 1,2,3,4,1,2,5,1,2,3,4 (timestamps 1..=11),
    // then frames 1..=6 marked evictable. Frame 6 was never accessed.
    let replacer = LruKReplacer::new(2, 7);

    for id in [1u32, 2, 3, 4, 1, 2, 5, 1, 2, 3, 4] {
        replacer.record_access(f(id));
    }
    for id in 1..=6u32 {
        replacer.set_evictable(f(id), true);
    }
    assert_eq!(replacer.size(), 6);

    // Capped histories and backward distances at now = 11:
    //   1: [5,8] -> 6       2: [6,9] -> 5
    //   3: [3,10] -> 8      4: [4,11] -> 7
    //   5: [7] -> +inf      6: [] -> +inf, no first timestamp
    // Frame 6 (never accessed twice) goes first, then 5, then the finite
    // distances largest-first: 3, 4, 1, 2.
    let expected = [6u32, 5, 3, 4, 1, 2];
    for &victim in &expected {
        assert_eq!(replacer.evict(), Some(f(victim)));
    }
    assert_eq!(replacer.evict(), None);
}

#[test]
fn test_size_counts_evictable_only() {
    let replacer = LruKReplacer::new(2, 10);

    for id in 0..5u32 {
        replacer.record_access(f(id));
    }
    assert_eq!(replacer.size(), 0);

    replacer.set_evictable(f(0), true);
    replacer.set_evictable(f(1), true);
    assert_eq!(replacer.size(), 2);

    replacer.set_evictable(f(1), false);
    assert_eq!(replacer.size(), 1);

    replacer.remove(f(0));
    assert_eq!(replacer.size(), 0);
}

#[test]
fn test_cold_frames_evicted_before_hot() {
    let replacer = LruKReplacer::new(2, 10);

    // Frame 0 is hot (two accesses); frames 1 and 2 are single-touch.
    replacer.record_access(f(0));
    replacer.record_access(f(0));
    replacer.record_access(f(1));
    replacer.record_access(f(2));

    for id in 0..3u32 {
        replacer.set_evictable(f(id), true);
    }

    // Both cold frames leave before the hot one, in first-touch order.
    assert_eq!(replacer.evict(), Some(f(1)));
    assert_eq!(replacer.evict(), Some(f(2)));
    assert_eq!(replacer.evict(), Some(f(0)));
}

#[test]
fn test_lru_fallback_among_cold_frames() {
    let replacer = LruKReplacer::new(3, 10);

    // Nobody reaches k = 3 accesses: pure LRU on the first timestamp.
    replacer.record_access(f(4));
    replacer.record_access(f(2));
    replacer.record_access(f(2));
    replacer.record_access(f(7));

    for id in [2u32, 4, 7] {
        replacer.set_evictable(f(id), true);
    }

    assert_eq!(replacer.evict(), Some(f(4)));
    assert_eq!(replacer.evict(), Some(f(2)));
    assert_eq!(replacer.evict(), Some(f(7)));
}

#[test]
fn test_evict_reflects_later_accesses() {
    let replacer = LruKReplacer::new(2, 10);

    replacer.record_access(f(0));
    replacer.record_access(f(0));
    replacer.record_access(f(1));
    replacer.record_access(f(1));

    replacer.set_evictable(f(0), true);
    replacer.set_evictable(f(1), true);

    // Two fresh accesses push frame 0's k-th most recent access past
    // frame 1's, so frame 1 now has the larger backward distance.
    replacer.record_access(f(0));
    replacer.record_access(f(0));
    assert_eq!(replacer.evict(), Some(f(1)));
    assert_eq!(replacer.evict(), Some(f(0)));
}

#[test]
fn test_concurrent_record_and_evict() {
    use std::sync::Arc;
    use std::thread;

    let replacer = Arc::new(LruKReplacer::new(2, 100));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let replacer = Arc::clone(&replacer);
            thread::spawn(move || {
                for i in 0..25u32 {
                    let frame = f(t * 25 + i);
                    replacer.record_access(frame);
                    replacer.set_evictable(frame, true);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(replacer.size(), 100);
    for _ in 0..100 {
        assert!(replacer.evict().is_some());
    }
    assert_eq!(replacer.evict(), None);
}
