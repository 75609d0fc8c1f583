//! Per-peer snapshot ring with fixed-delay interpolation.
//!
//! Remote state arrives at roughly 10 Hz with irregular spacing. Rendering
//! samples the buffer at `now - interpolation_delay`, which almost always
//! falls between two received snapshots, so motion stays smooth regardless
//! of packet timing. Sampling outside the buffered range clamps to the
//! nearest end; the buffer never extrapolates.

use std::collections::VecDeque;

use crate::snapshot::EntitySnapshot;

/// Default number of snapshots retained per peer (~2 s at 10 Hz).
pub const DEFAULT_BUFFER_CAPACITY: usize = 20;

// ---------------------------------------------------------------------------
// StateBuffer
// ---------------------------------------------------------------------------

/// Bounded, timestamp-ordered ring of [`EntitySnapshot`]s for one peer.
#[derive(Debug, Clone)]
pub struct StateBuffer {
    snapshots: VecDeque<EntitySnapshot>,
    capacity: usize,
}

impl Default for StateBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

impl StateBuffer {
    /// Creates an empty buffer holding at most `capacity` snapshots.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            snapshots: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a snapshot, evicting the oldest if at capacity.
    ///
    /// Returns `false` (and stores nothing) if `snapshot` is older than the
    /// newest buffered one.
    pub fn push(&mut self, snapshot: EntitySnapshot) -> bool {
        if self
            .snapshots
            .back()
            .is_some_and(|newest| snapshot.timestamp_ms < newest.timestamp_ms)
        {
            return false;
        }
        if self.snapshots.len() >= self.capacity {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(snapshot);
        true
    }

    /// Samples the buffer at `render_time_ms`.
    ///
    /// - empty buffer: `None`, the entity is not visible yet
    /// - one snapshot: that snapshot unchanged
    /// - outside the buffered range: the oldest or newest snapshot unchanged
    /// - otherwise: position lerped between the bracketing pair, discrete
    ///   fields (facing, animation) taken from the newer one
    pub fn query(&self, render_time_ms: u64) -> Option<EntitySnapshot> {
        let newest = self.snapshots.back()?;
        if self.snapshots.len() == 1 || render_time_ms >= newest.timestamp_ms {
            return Some(newest.clone());
        }
        let oldest = self.snapshots.front()?;
        if render_time_ms <= oldest.timestamp_ms {
            return Some(oldest.clone());
        }

        // Newest pairs first: the render time sits near the recent end.
        for i in (1..self.snapshots.len()).rev() {
            let a = &self.snapshots[i - 1];
            let b = &self.snapshots[i];
            if a.timestamp_ms <= render_time_ms && render_time_ms <= b.timestamp_ms {
                return Some(interpolate(a, b, render_time_ms));
            }
        }
        Some(newest.clone())
    }

    /// Most recently pushed snapshot.
    pub fn newest(&self) -> Option<&EntitySnapshot> {
        self.snapshots.back()
    }

    /// Oldest retained snapshot.
    pub fn oldest(&self) -> Option<&EntitySnapshot> {
        self.snapshots.front()
    }

    /// Returns the number of buffered snapshots.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Returns `true` if nothing has been buffered.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Maximum number of retained snapshots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Linear interpolation of position between `a` and `b` at `t`.
fn interpolate(a: &EntitySnapshot, b: &EntitySnapshot, t: u64) -> EntitySnapshot {
    let span = b.timestamp_ms - a.timestamp_ms;
    if span == 0 {
        return b.clone();
    }
    let alpha = (t - a.timestamp_ms) as f32 / span as f32;
    EntitySnapshot {
        id: b.id.clone(),
        position: a.position.lerp(b.position, alpha),
        facing: b.facing,
        anim: b.anim,
        timestamp_ms: t,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::snapshot::{AnimState, PeerId};

    fn snap(t: u64, x: f32) -> EntitySnapshot {
        EntitySnapshot::new(
            PeerId::new("remote"),
            Vec3::new(x, 0.0, 0.0),
            0.0,
            AnimState::Walk,
            t,
        )
    }

    #[test]
    fn test_empty_buffer_returns_nothing() {
        let buffer = StateBuffer::default();
        assert!(buffer.query(0).is_none());
        assert!(buffer.query(1_000).is_none());
    }

    #[test]
    fn test_single_snapshot_snaps() {
        let mut buffer = StateBuffer::default();
        let only = snap(500, 3.0);
        buffer.push(only.clone());

        assert_eq!(buffer.query(0), Some(only.clone()));
        assert_eq!(buffer.query(10_000), Some(only));
    }

    #[test]
    fn test_midpoint_interpolation() {
        let mut buffer = StateBuffer::default();
        buffer.push(snap(0, 0.0));
        buffer.push(snap(100, 10.0));

        let sample = buffer.query(50).unwrap();
        assert!(
            (sample.position.x - 5.0).abs() < 1e-5,
            "expected x=5, got {}",
            sample.position.x
        );
        assert_eq!(sample.timestamp_ms, 50);
    }

    #[test]
    fn test_clamps_outside_range() {
        let mut buffer = StateBuffer::default();
        buffer.push(snap(100, 1.0));
        buffer.push(snap(200, 2.0));
        buffer.push(snap(300, 3.0));

        assert_eq!(buffer.query(0).unwrap().position.x, 1.0, "before oldest");
        assert_eq!(buffer.query(5_000).unwrap().position.x, 3.0, "after newest");
    }

    #[test]
    fn test_interpolated_position_stays_within_bracket() {
        let mut buffer = StateBuffer::default();
        let points = [(0, 0.0), (80, 4.0), (170, -2.0), (260, 9.0), (390, 9.5)];
        for (t, x) in points {
            buffer.push(snap(t, x));
        }

        for t in 0..=390u64 {
            let sample = buffer.query(t).unwrap();
            let pair = points
                .windows(2)
                .find(|w| w[0].0 <= t && t <= w[1].0)
                .unwrap();
            let lo = pair[0].1.min(pair[1].1) - 1e-4;
            let hi = pair[0].1.max(pair[1].1) + 1e-4;
            assert!(
                (lo..=hi).contains(&sample.position.x),
                "t={t}: x={} outside [{lo}, {hi}]",
                sample.position.x
            );
        }
    }

    #[test]
    fn test_discrete_fields_come_from_newer_snapshot() {
        let mut buffer = StateBuffer::default();
        let mut a = snap(0, 0.0);
        a.anim = AnimState::Idle;
        a.facing = 0.0;
        let mut b = snap(100, 10.0);
        b.anim = AnimState::Run;
        b.facing = 1.5;
        buffer.push(a);
        buffer.push(b);

        let sample = buffer.query(10).unwrap();
        assert_eq!(sample.anim, AnimState::Run);
        assert_eq!(sample.facing, 1.5);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut buffer = StateBuffer::new(3);
        for i in 0..5u64 {
            buffer.push(snap(i * 100, i as f32));
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.oldest().unwrap().timestamp_ms, 200);
        assert_eq!(buffer.newest().unwrap().timestamp_ms, 400);
    }

    #[test]
    fn test_out_of_order_snapshot_rejected() {
        let mut buffer = StateBuffer::default();
        assert!(buffer.push(snap(200, 2.0)));
        assert!(!buffer.push(snap(100, 1.0)), "older than newest");
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.newest().unwrap().timestamp_ms, 200);
    }

    #[test]
    fn test_equal_timestamps_do_not_divide_by_zero() {
        let mut buffer = StateBuffer::default();
        buffer.push(snap(0, 0.0));
        buffer.push(snap(100, 4.0));
        buffer.push(snap(100, 6.0));

        let sample = buffer.query(100).unwrap();
        assert!(sample.position.x.is_finite());
        assert_eq!(sample.position.x, 6.0);
    }
}
