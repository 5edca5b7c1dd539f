//! Pointer tracking.
//!
//! Keeps the last known position of every active pointer (mouse plus any
//! number of touch points) and turns movement into force events. Window
//! coordinates are y-down; the fluid field is y-up, so positions are
//! flipped and the drag delta's y is negated on the way out.

use std::collections::HashMap;

use glam::Vec2;

use crate::config::{TOUCH_FORCE_SCALE, TOUCH_THICKNESS};
use crate::forces::ForceEvent;

/// Per-pointer drag state.
#[derive(Debug, Default)]
pub struct PointerTracker {
    last: HashMap<u64, Vec2>,
}

impl PointerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pointer position in window coordinates. Returns a force
    /// event for the drag segment if this pointer was already down and
    /// actually moved.
    pub fn moved(&mut self, id: u64, pos: Vec2, viewport_height: f32) -> Option<ForceEvent> {
        let prev = self.last.insert(id, pos)?;
        let delta = pos - prev;
        if delta == Vec2::ZERO {
            return None;
        }
        Some(ForceEvent {
            p1: Vec2::new(prev.x, viewport_height - prev.y),
            p2: Vec2::new(pos.x, viewport_height - pos.y),
            vector: Vec2::new(delta.x, -delta.y),
            thickness: TOUCH_THICKNESS,
            end_caps: true,
            scale: TOUCH_FORCE_SCALE,
        })
    }

    /// Forget a pointer. The next move starts a fresh drag.
    pub fn released(&mut self, id: u64) {
        self.last.remove(&id);
    }

    pub fn clear(&mut self) {
        self.last.clear();
    }

    pub fn active_count(&self) -> usize {
        self.last.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_move_produces_no_force() {
        let mut tracker = PointerTracker::new();
        assert!(tracker.moved(0, Vec2::new(10.0, 10.0), 100.0).is_none());
        assert_eq!(tracker.active_count(), 1);
    }

    #[test]
    fn test_drag_yields_flipped_segment() {
        let mut tracker = PointerTracker::new();
        tracker.moved(0, Vec2::new(10.0, 90.0), 100.0);
        let ev = tracker.moved(0, Vec2::new(13.0, 86.0), 100.0).unwrap();
        // y flips into field space.
        assert_eq!(ev.p1, Vec2::new(10.0, 10.0));
        assert_eq!(ev.p2, Vec2::new(13.0, 14.0));
        // Upward screen motion becomes positive field-y velocity.
        assert_eq!(ev.vector, Vec2::new(3.0, 4.0));
        assert!(ev.end_caps);
        assert_eq!(ev.scale, TOUCH_FORCE_SCALE);
        assert_eq!(ev.thickness, TOUCH_THICKNESS);
    }

    #[test]
    fn test_stationary_pointer_is_silent() {
        let mut tracker = PointerTracker::new();
        tracker.moved(0, Vec2::new(5.0, 5.0), 100.0);
        assert!(tracker.moved(0, Vec2::new(5.0, 5.0), 100.0).is_none());
    }

    #[test]
    fn test_release_resets_drag() {
        let mut tracker = PointerTracker::new();
        tracker.moved(0, Vec2::new(5.0, 5.0), 100.0);
        tracker.released(0);
        assert_eq!(tracker.active_count(), 0);
        // No segment from across the release.
        assert!(tracker.moved(0, Vec2::new(50.0, 50.0), 100.0).is_none());
    }

    #[test]
    fn test_pointers_are_independent() {
        let mut tracker = PointerTracker::new();
        tracker.moved(0, Vec2::new(0.0, 0.0), 100.0);
        tracker.moved(7, Vec2::new(50.0, 50.0), 100.0);
        let ev = tracker.moved(7, Vec2::new(51.0, 50.0), 100.0).unwrap();
        assert_eq!(ev.vector, Vec2::new(1.0, 0.0));
        assert_eq!(tracker.active_count(), 2);
    }
}
