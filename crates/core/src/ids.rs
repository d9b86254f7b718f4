//! Opaque identifiers.
//!
//! Live objects and platform handles are addressed by small copyable ids so
//! that persistence-relevant data never hangs off a scene-graph reference.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident($inner:ty), $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub $inner);

        impl $name {
            /// Raw numeric value.
            pub const fn raw(self) -> $inner {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

opaque_id!(
    /// Stable id of an object in the session's object arena.
    ObjectId(u32),
    "object"
);

opaque_id!(
    /// One quality marker (a face of the anchor cube) attached to a local anchor.
    MarkerId(u32),
    "marker"
);

opaque_id!(
    /// Platform handle of a local (not yet hosted) anchor.
    AnchorKey(u64),
    "anchor"
);

opaque_id!(
    /// Platform handle of an in-flight or completed cloud-anchor operation.
    CloudHandle(u64),
    "cloud"
);

opaque_id!(
    /// Platform id of a detected plane.
    PlaneId(u64),
    "plane"
);
