//! The AR platform collaborator.
//!
//! Plane detection, anchor tracking and the cloud anchor service live outside
//! this workspace; the session only sees them through [`ArPlatform`].

use std::fmt;

use glam::Vec2;
use kitting_core::{AnchorKey, CloudHandle, PlaneId};
use kitting_transform::Pose;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Orientation class of a detected plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaneAlignment {
    /// Floor, table top.
    HorizontalUp,
    /// Ceiling.
    HorizontalDown,
    /// Wall, shelf front.
    Vertical,
    /// Anything else.
    NotAxisAligned,
}

/// Result of a raycast against detected planes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneHit {
    /// Plane that was hit.
    pub plane: PlaneId,
    /// Hit pose; its rotation follows the plane.
    pub pose: Pose,
    /// Orientation class of the plane.
    pub alignment: PlaneAlignment,
}

/// Status of a cloud anchor request as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CloudAnchorState {
    /// Not a cloud anchor.
    None,
    /// Hosting or resolving still running.
    TaskInProgress,
    /// Request finished.
    Success,
    /// Internal platform error.
    ErrorInternal,
    /// Credentials rejected.
    ErrorNotAuthorized,
    /// Quota exhausted.
    ErrorResourceExhausted,
    /// Not enough visual data around the anchor.
    ErrorHostingDatasetProcessingFailed,
    /// The cloud anchor id is unknown or expired.
    ErrorResolvingCloudIdNotFound,
    /// Hosted with a newer SDK.
    ErrorResolvingSdkTooOld,
    /// Hosted with an older, incompatible SDK.
    ErrorResolvingSdkTooNew,
    /// Hosting service unreachable.
    ErrorHostingServiceUnavailable,
}

impl CloudAnchorState {
    /// Name of the state, as shown to the user on failure.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::TaskInProgress => "TaskInProgress",
            Self::Success => "Success",
            Self::ErrorInternal => "ErrorInternal",
            Self::ErrorNotAuthorized => "ErrorNotAuthorized",
            Self::ErrorResourceExhausted => "ErrorResourceExhausted",
            Self::ErrorHostingDatasetProcessingFailed => "ErrorHostingDatasetProcessingFailed",
            Self::ErrorResolvingCloudIdNotFound => "ErrorResolvingCloudIdNotFound",
            Self::ErrorResolvingSdkTooOld => "ErrorResolvingSdkTooOld",
            Self::ErrorResolvingSdkTooNew => "ErrorResolvingSdkTooNew",
            Self::ErrorHostingServiceUnavailable => "ErrorHostingServiceUnavailable",
        }
    }

    /// Whether the request is still running.
    pub fn is_in_progress(self) -> bool {
        self == Self::TaskInProgress
    }

    /// Whether the request finished without success.
    pub fn is_failure(self) -> bool {
        !matches!(self, Self::TaskInProgress | Self::Success)
    }
}

impl fmt::Display for CloudAnchorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hosting readiness of the visual features seen from a camera pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeatureMapQuality {
    /// Not enough features.
    Insufficient,
    /// Hostable, but weak.
    Sufficient,
    /// Hostable.
    Good,
}

/// Errors raised synchronously by the platform when a request cannot be made.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlatformError {
    /// The plane is no longer tracked.
    #[error("plane {0} is not tracked")]
    UnknownPlane(PlaneId),
    /// The local anchor is no longer tracked.
    #[error("anchor {0} is not tracked")]
    UnknownAnchor(AnchorKey),
    /// The platform refused the request.
    #[error("platform rejected the request: {0}")]
    Rejected(String),
}

/// AR platform services used by the kitting session.
///
/// Cloud requests are asynchronous on the platform side: `host_cloud_anchor`
/// and `resolve_cloud_anchor` return immediately with a handle whose state is
/// polled through [`ArPlatform::cloud_anchor_state`].
pub trait ArPlatform {
    /// Cast a ray from a normalized screen point against detected planes.
    fn raycast_planes(&self, screen_point: Vec2) -> Option<PlaneHit>;

    /// Attach a local anchor to `plane` at `pose`.
    fn attach_anchor(&mut self, plane: PlaneId, pose: Pose) -> Result<AnchorKey, PlatformError>;

    /// Current pose of a local anchor.
    fn anchor_pose(&self, anchor: AnchorKey) -> Option<Pose>;

    /// Stop tracking a local anchor.
    fn remove_anchor(&mut self, anchor: AnchorKey);

    /// Start hosting a local anchor for `ttl_days`.
    fn host_cloud_anchor(
        &mut self,
        anchor: AnchorKey,
        ttl_days: u32,
    ) -> Result<CloudHandle, PlatformError>;

    /// Start resolving a hosted anchor by its cloud id.
    fn resolve_cloud_anchor(&mut self, cloud_anchor_id: &str) -> Result<CloudHandle, PlatformError>;

    /// Current status of a cloud request.
    fn cloud_anchor_state(&self, handle: CloudHandle) -> CloudAnchorState;

    /// Cloud id of a hosted or resolved anchor, once known.
    fn cloud_anchor_id(&self, handle: CloudHandle) -> Option<String>;

    /// Live pose of a hosted or resolved anchor.
    fn cloud_anchor_pose(&self, handle: CloudHandle) -> Option<Pose>;

    /// Feature-map quality for hosting, as seen from `camera`.
    fn estimate_feature_map_quality(&self, camera: &Pose) -> FeatureMapQuality;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_names_are_user_facing() {
        assert_eq!(
            CloudAnchorState::ErrorResolvingCloudIdNotFound.to_string(),
            "ErrorResolvingCloudIdNotFound"
        );
        assert_eq!(CloudAnchorState::Success.as_str(), "Success");
    }

    #[test]
    fn failure_classification() {
        assert!(!CloudAnchorState::TaskInProgress.is_failure());
        assert!(!CloudAnchorState::Success.is_failure());
        assert!(CloudAnchorState::None.is_failure());
        assert!(CloudAnchorState::ErrorHostingDatasetProcessingFailed.is_failure());
        assert!(CloudAnchorState::TaskInProgress.is_in_progress());
    }

    #[test]
    fn quality_orders_by_strength() {
        assert!(FeatureMapQuality::Good > FeatureMapQuality::Sufficient);
        assert!(FeatureMapQuality::Sufficient > FeatureMapQuality::Insufficient);
    }
}
