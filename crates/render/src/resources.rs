//! Bookkeeping for GPU resources owned by render targets.
//!
//! wgpu frees resources on drop, so nothing here is needed for memory safety.
//! The tracker makes lifetimes observable: every target gets a non-zero id,
//! live counts go back to their baseline once a target is destroyed, and
//! releasing the same id twice is reported instead of silently ignored.

use std::collections::HashSet;
use std::fmt;
use std::num::NonZeroU32;

use parking_lot::Mutex;
use thiserror::Error;

/// Textures owned by one render target (color + depth).
pub const TEXTURES_PER_TARGET: usize = 2;

/// Identifier of a render target, always greater than zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(NonZeroU32);

impl TargetId {
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ResourceError {
    #[error("render target {0} was already destroyed")]
    DoubleRelease(TargetId),
    #[error("render target {0} was never registered")]
    UnknownTarget(TargetId),
}

/// Snapshot of live resources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    pub targets: usize,
    pub textures: usize,
}

#[derive(Default)]
struct TrackerState {
    last_id: u32,
    live: HashSet<TargetId>,
}

#[derive(Default)]
pub struct ResourceTracker {
    state: Mutex<TrackerState>,
}

impl ResourceTracker {
    /// Registers a new target and returns its id.
    pub fn register_target(&self) -> TargetId {
        let mut state = self.state.lock();
        state.last_id = state.last_id.wrapping_add(1).max(1);
        let id = TargetId(NonZeroU32::MIN.saturating_add(state.last_id - 1));
        state.live.insert(id);
        id
    }

    /// Marks a target as released.
    pub fn release_target(&self, id: TargetId) -> Result<(), ResourceError> {
        let mut state = self.state.lock();
        if state.live.remove(&id) {
            return Ok(());
        }
        if id.get() <= state.last_id {
            Err(ResourceError::DoubleRelease(id))
        } else {
            Err(ResourceError::UnknownTarget(id))
        }
    }

    pub fn is_live(&self, id: TargetId) -> bool {
        self.state.lock().live.contains(&id)
    }

    pub fn counts(&self) -> ResourceCounts {
        let state = self.state.lock();
        ResourceCounts {
            targets: state.live.len(),
            textures: state.live.len() * TEXTURES_PER_TARGET,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_start_at_one_and_increase() {
        let tracker = ResourceTracker::default();
        let a = tracker.register_target();
        let b = tracker.register_target();
        assert_eq!(a.get(), 1);
        assert_eq!(b.get(), 2);
    }

    #[test]
    fn release_returns_counts_to_baseline() {
        let tracker = ResourceTracker::default();
        let baseline = tracker.counts();
        let id = tracker.register_target();
        assert_eq!(tracker.counts().targets, 1);
        assert_eq!(tracker.counts().textures, TEXTURES_PER_TARGET);
        tracker.release_target(id).unwrap();
        assert_eq!(tracker.counts(), baseline);
    }

    #[test]
    fn double_release_is_rejected() {
        let tracker = ResourceTracker::default();
        let id = tracker.register_target();
        tracker.release_target(id).unwrap();
        assert_eq!(tracker.release_target(id), Err(ResourceError::DoubleRelease(id)));
        assert!(!tracker.is_live(id));
    }

    #[test]
    fn releasing_a_foreign_id_is_unknown() {
        let tracker = ResourceTracker::default();
        let other = ResourceTracker::default();
        other.register_target();
        let foreign = other.register_target();
        assert_eq!(
            tracker.release_target(foreign),
            Err(ResourceError::UnknownTarget(foreign))
        );
    }
}
