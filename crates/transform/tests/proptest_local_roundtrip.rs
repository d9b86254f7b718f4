//! Property tests for anchor-local transforms.
//!
//! Critical properties:
//! - `to_world(P, to_local(P, O))` reconstructs `O` for any anchor pose `P`
//! - the local offset length equals the world distance to the anchor
//! - replaying an empty rotation history leaves the creation orientation untouched

use glam::Vec3;
use kitting_core::Euler3;
use kitting_transform::{to_local, to_world, Pose, RotationHistory};
use proptest::prelude::*;

fn coord() -> impl Strategy<Value = f32> {
    -50.0f32..50.0f32
}

fn angle() -> impl Strategy<Value = f32> {
    0.0f32..360.0f32
}

// Pitch is kept away from ±90° where Euler decomposition loses precision.
fn pitch() -> impl Strategy<Value = f32> {
    prop_oneof![-80.0f32..80.0f32, 100.0f32..260.0f32]
}

proptest! {
    #[test]
    fn local_then_world_reconstructs_position(
        ax in coord(), ay in coord(), az in coord(),
        ex in pitch(), ey in angle(), ez in angle(),
        ox in coord(), oy in coord(), oz in coord(),
    ) {
        let anchor = Pose::from_euler_degrees(Vec3::new(ax, ay, az), Euler3::new(ex, ey, ez));
        let object = Vec3::new(ox, oy, oz);

        let local = to_local(&anchor, object);
        let rebuilt = to_world(&anchor, local);

        prop_assert!((rebuilt - object).length() < 1e-2, "rebuilt {rebuilt:?} vs {object:?}");
    }

    #[test]
    fn local_offset_preserves_distance(
        ex in pitch(), ey in angle(), ez in angle(),
        ox in coord(), oy in coord(), oz in coord(),
    ) {
        let anchor = Pose::from_euler_degrees(Vec3::new(1.0, -2.0, 3.0), Euler3::new(ex, ey, ez));
        let object = Vec3::new(ox, oy, oz);

        let local = to_local(&anchor, object);
        let expected = (object - anchor.position).length();

        prop_assert!((local.length() - expected).abs() < 1e-2);
    }

    #[test]
    fn empty_history_keeps_creation_orientation(ex in pitch(), ey in angle(), ez in angle()) {
        let anchor = Pose::from_euler_degrees(Vec3::ZERO, Euler3::new(ex, ey, ez));
        let history = RotationHistory::seeded(anchor.euler_degrees());

        let replayed = history.replay_from(anchor.rotation);

        prop_assert!(replayed.dot(anchor.rotation).abs() > 1.0 - 1e-4);
    }
}
