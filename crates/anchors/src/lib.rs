#![warn(missing_docs)]
//! Cloud anchor handling: the AR platform seam, the hosting quality gate and
//! the tracker that polls in-flight hosting and resolving requests.

pub mod lifecycle;
pub mod platform;
pub mod quality;

pub use lifecycle::{
    AnchorLifecycleTracker, LifecycleError, LifecycleEvent, OperationKind, PendingOperation,
    PendingPayload, HOSTING_LIFETIME_DAYS,
};
pub use platform::{
    ArPlatform, CloudAnchorState, FeatureMapQuality, PlaneAlignment, PlaneHit, PlatformError,
};
pub use quality::{
    AnchorQualityGate, GateReport, QualityGateConfig, QualityMarker, SampleRejection,
    QUALITY_GOOD_TEXT, SCAN_AROUND_TEXT,
};
