//! Hosting quality gate.
//!
//! The anchor is shown as a cube whose walls are quality markers. Each frame,
//! every wall that is not yet Good is checked against the camera viewpoint and,
//! if the viewpoint is usable, the platform's feature-map estimate is recorded
//! for it. The anchor is ready to host once enough walls were seen well.

use std::collections::BTreeSet;

use glam::Vec3;
use kitting_camera::ArCamera;
use kitting_core::MarkerId;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::platform::{ArPlatform, FeatureMapQuality};

/// Shown while the walls are being scanned.
pub const SCAN_AROUND_TEXT: &str =
    "Move the device around the virtual object until its walls turn green.";

/// Shown once the gate converged.
pub const QUALITY_GOOD_TEXT: &str = "The quality of the anchor is good.";

/// Thresholds of the quality gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityGateConfig {
    /// Samples at or beyond this distance are rejected.
    pub max_distance: f32,
    /// Samples at or below this distance are rejected.
    pub min_distance: f32,
    /// Viewing directions closer than this to straight down are rejected (degrees).
    pub top_view_degrees: f32,
    /// Allowed yaw difference between a wall and the camera (degrees).
    pub yaw_tolerance_degrees: f32,
    /// Good walls that alone are enough.
    pub good_required: usize,
    /// Good walls that are enough together with `sufficient_required` sufficient ones.
    pub good_with_sufficient: usize,
    /// Sufficient walls needed alongside `good_with_sufficient` good ones.
    pub sufficient_required: usize,
}

impl Default for QualityGateConfig {
    fn default() -> Self {
        Self {
            max_distance: 10.0,
            min_distance: 0.15,
            top_view_degrees: 15.0,
            yaw_tolerance_degrees: 15.0,
            good_required: 4,
            good_with_sufficient: 3,
            sufficient_required: 1,
        }
    }
}

/// One wall of the anchor cube.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityMarker {
    /// Stable wall id.
    pub id: MarkerId,
    /// World-space center of the wall.
    pub position: Vec3,
    /// Yaw, in degrees, a camera must roughly share to face this wall.
    pub yaw_degrees: f32,
}

/// Why a viewpoint was not sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleRejection {
    /// The wall is not on screen.
    OutOfView,
    /// Camera is too far from the wall.
    TooFar,
    /// Camera is too close to the wall.
    TooClose,
    /// Camera is looking from above.
    TopView,
    /// Camera is not facing the wall.
    OffAxis,
}

impl SampleRejection {
    /// Guidance shown to the user.
    pub fn help_text(self) -> &'static str {
        match self {
            Self::OutOfView => "Point to the virtual object.",
            Self::TooFar => "Get closer, you are too far away from the virtual object.",
            Self::TooClose => "Move backward, you are too close to the virtual object.",
            Self::TopView => "You are looking from the top view, move around from all sides.",
            Self::OffAxis => SCAN_AROUND_TEXT,
        }
    }
}

/// Outcome of one sampling frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GateReport {
    /// Guidance for the last wall checked this frame.
    pub help_text: Option<&'static str>,
    /// Walls promoted to Good this frame.
    pub promoted_good: Vec<MarkerId>,
    /// Walls recorded as Sufficient this frame.
    pub marked_sufficient: Vec<MarkerId>,
    /// The gate converged this frame; its sets were cleared.
    pub converged: bool,
}

/// Multi-viewpoint readiness check for hosting.
#[derive(Debug, Clone, Default)]
pub struct AnchorQualityGate {
    config: QualityGateConfig,
    good: BTreeSet<MarkerId>,
    sufficient: BTreeSet<MarkerId>,
}

impl AnchorQualityGate {
    /// Create an empty gate.
    pub fn new(config: QualityGateConfig) -> Self {
        Self {
            config,
            good: BTreeSet::new(),
            sufficient: BTreeSet::new(),
        }
    }

    /// Thresholds in use.
    pub fn config(&self) -> &QualityGateConfig {
        &self.config
    }

    /// Check whether `camera` is a usable viewpoint for `marker`.
    pub fn check_viewpoint(
        &self,
        camera: &ArCamera,
        marker: &QualityMarker,
    ) -> Result<(), SampleRejection> {
        if !camera.is_in_view(marker.position) {
            return Err(SampleRejection::OutOfView);
        }

        let to_camera = camera.position() - marker.position;
        let distance = to_camera.length();
        if distance >= self.config.max_distance {
            return Err(SampleRejection::TooFar);
        }
        if distance <= self.config.min_distance {
            return Err(SampleRejection::TooClose);
        }

        if to_camera.angle_between(Vec3::Y).to_degrees() < self.config.top_view_degrees {
            return Err(SampleRejection::TopView);
        }

        let camera_yaw = camera.pose.euler_degrees().y;
        if yaw_difference(marker.yaw_degrees, camera_yaw).abs() > self.config.yaw_tolerance_degrees
        {
            return Err(SampleRejection::OffAxis);
        }

        Ok(())
    }

    /// Record an estimate for `marker`.
    ///
    /// Good removes the marker from the sufficient set. Returns true if the
    /// marker changed set.
    pub fn record(&mut self, marker: MarkerId, quality: FeatureMapQuality) -> bool {
        match quality {
            FeatureMapQuality::Good => {
                self.sufficient.remove(&marker);
                self.good.insert(marker)
            }
            FeatureMapQuality::Sufficient if !self.good.contains(&marker) => {
                self.sufficient.insert(marker)
            }
            _ => false,
        }
    }

    /// Sample every marker not yet Good from `camera`.
    ///
    /// On convergence both sets are cleared and `converged` is set; the caller
    /// takes it from there.
    pub fn sample_frame<P: ArPlatform + ?Sized>(
        &mut self,
        platform: &P,
        camera: &ArCamera,
        markers: &[QualityMarker],
    ) -> GateReport {
        let mut report = GateReport::default();

        for marker in markers {
            if self.good.contains(&marker.id) {
                continue;
            }
            match self.check_viewpoint(camera, marker) {
                Err(rejection) => report.help_text = Some(rejection.help_text()),
                Ok(()) => {
                    report.help_text = Some(SCAN_AROUND_TEXT);
                    let quality = platform.estimate_feature_map_quality(&camera.pose);
                    if self.record(marker.id, quality) {
                        debug!(marker = %marker.id, ?quality, "quality marker sampled");
                        match quality {
                            FeatureMapQuality::Good => report.promoted_good.push(marker.id),
                            FeatureMapQuality::Sufficient => {
                                report.marked_sufficient.push(marker.id)
                            }
                            FeatureMapQuality::Insufficient => {}
                        }
                    }
                }
            }
        }

        if self.is_converged() {
            debug!(
                good = self.good.len(),
                sufficient = self.sufficient.len(),
                "quality gate converged"
            );
            report.converged = true;
            report.help_text = Some(QUALITY_GOOD_TEXT);
            self.reset();
        }

        report
    }

    /// Readiness rule over the current sets.
    pub fn is_converged(&self) -> bool {
        let good = self.good.len();
        let sufficient = self.sufficient.len();
        good >= self.config.good_required
            || (good >= self.config.good_with_sufficient
                && sufficient >= self.config.sufficient_required)
    }

    /// Whether `marker` was seen with Good quality.
    pub fn is_good(&self, marker: MarkerId) -> bool {
        self.good.contains(&marker)
    }

    /// Number of Good markers.
    pub fn good_count(&self) -> usize {
        self.good.len()
    }

    /// Number of Sufficient markers.
    pub fn sufficient_count(&self) -> usize {
        self.sufficient.len()
    }

    /// Forget all samples.
    pub fn reset(&mut self) {
        self.good.clear();
        self.sufficient.clear();
    }
}

/// Signed yaw difference `a - b` wrapped into `[-180, 180)`.
fn yaw_difference(a: f32, b: f32) -> f32 {
    (a - b + 180.0).rem_euclid(360.0) - 180.0
}
