use glam::{Quat, Vec3};
use kitting_core::Euler3;

use crate::pose::quat_from_euler_degrees;

/// Apply `euler` degrees in the object's own frame (post-multiplied).
pub fn rotate_self(rotation: Quat, euler: Euler3) -> Quat {
    (rotation * quat_from_euler_degrees(euler)).normalize()
}

/// Apply `steps` in order, starting from `base`.
///
/// Order matters: the steps are incremental rotations, not absolute ones.
pub fn replay_rotations(base: Quat, steps: &[Euler3]) -> Quat {
    steps
        .iter()
        .fold(base, |rotation, step| rotate_self(rotation, *step))
}

/// Editable rotation history of one placed object.
///
/// Entry 0 records the orientation the object was created with and is not
/// replayed; every later entry is one editing segment.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RotationHistory {
    entries: Vec<Euler3>,
}

impl RotationHistory {
    /// History of an object created with orientation `creation`, with one open segment.
    pub fn seeded(creation: Euler3) -> Self {
        Self {
            entries: vec![creation, Euler3::ZERO],
        }
    }

    /// Rebuild from persisted entries.
    pub fn from_entries(entries: Vec<Euler3>) -> Self {
        Self { entries }
    }

    /// Copy of this history with a fresh open segment, for a duplicated object.
    pub fn forked(&self) -> Self {
        let mut entries = self.entries.clone();
        entries.push(Euler3::ZERO);
        Self { entries }
    }

    /// Open a new segment (rotation axis or mode switched).
    pub fn begin_segment(&mut self) {
        self.entries.push(Euler3::ZERO);
    }

    /// Add `degrees` about `axis` to the open segment.
    pub fn amend_last(&mut self, axis: Vec3, degrees: f32) {
        let delta = Euler3::from(axis * degrees);
        match self.entries.last_mut() {
            Some(last) => *last = *last + delta,
            None => self.entries.push(delta),
        }
    }

    /// All entries, creation orientation first.
    pub fn entries(&self) -> &[Euler3] {
        &self.entries
    }

    /// Entries replayed on top of the creation pose.
    pub fn steps(&self) -> &[Euler3] {
        self.entries.get(1..).unwrap_or(&[])
    }

    /// Orientation reached by replaying the steps from `base`.
    pub fn replay_from(&self, base: Quat) -> Quat {
        replay_rotations(base, self.steps())
    }

    /// Owned entries for persistence.
    pub fn into_entries(self) -> Vec<Euler3> {
        self.entries
    }
}
