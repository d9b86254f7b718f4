//! Scriptable AR platform for headless sessions and tests.

use std::collections::{BTreeMap, VecDeque};

use glam::Vec2;
use kitting_anchors::{
    ArPlatform, CloudAnchorState, FeatureMapQuality, PlaneAlignment, PlaneHit, PlatformError,
};
use kitting_core::{AnchorKey, CloudHandle, PlaneId};
use kitting_transform::Pose;
use tracing::debug;

#[derive(Debug, Clone)]
struct CloudOp {
    state: CloudAnchorState,
    outcome: CloudAnchorState,
    cloud_anchor_id: Option<String>,
    pose: Option<Pose>,
    ticks_left: u32,
}

/// In-memory stand-in for the AR runtime and the cloud anchor service.
///
/// Cloud requests stay `TaskInProgress` until [`step`](Self::step) has run
/// one more time than the [latency](Self::set_latency), then finish with the
/// scripted outcome.
/// Hosted anchors live in a simulated cloud that outlives
/// [`restart`](Self::restart), so a later session can resolve them.
#[derive(Debug, Clone)]
pub struct SimulatedPlatform {
    surface: Option<PlaneHit>,
    anchors: BTreeMap<AnchorKey, Pose>,
    ops: BTreeMap<CloudHandle, CloudOp>,
    cloud: BTreeMap<String, Pose>,
    host_outcomes: VecDeque<CloudAnchorState>,
    resolve_outcomes: VecDeque<CloudAnchorState>,
    quality: FeatureMapQuality,
    latency_ticks: u32,
    relocalization: Pose,
    next_handle: u64,
    next_cloud_id: u64,
}

impl Default for SimulatedPlatform {
    fn default() -> Self {
        Self {
            surface: None,
            anchors: BTreeMap::new(),
            ops: BTreeMap::new(),
            cloud: BTreeMap::new(),
            host_outcomes: VecDeque::new(),
            resolve_outcomes: VecDeque::new(),
            quality: FeatureMapQuality::Good,
            latency_ticks: 0,
            relocalization: Pose::IDENTITY,
            next_handle: 0,
            next_cloud_id: 0,
        }
    }
}

impl SimulatedPlatform {
    /// Platform with no detected planes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every raycast hit `plane` at `pose`.
    pub fn set_surface(&mut self, plane: PlaneId, pose: Pose, alignment: PlaneAlignment) {
        self.surface = Some(PlaneHit {
            plane,
            pose,
            alignment,
        });
    }

    /// Forget the detected plane.
    pub fn clear_surface(&mut self) {
        self.surface = None;
    }

    /// Feature map quality reported for every camera pose.
    pub fn set_quality(&mut self, quality: FeatureMapQuality) {
        self.quality = quality;
    }

    /// Steps a cloud request stays in progress.
    pub fn set_latency(&mut self, ticks: u32) {
        self.latency_ticks = ticks;
    }

    /// The next hosting request ends in `state` instead of success.
    pub fn fail_next_host(&mut self, state: CloudAnchorState) {
        self.host_outcomes.push_back(state);
    }

    /// The next resolving request ends in `state` instead of success.
    pub fn fail_next_resolve(&mut self, state: CloudAnchorState) {
        self.resolve_outcomes.push_back(state);
    }

    /// Simulate a new app session: local anchors and requests are gone and
    /// the world frame moved by `relocalization`. The cloud is kept.
    pub fn restart(&mut self, relocalization: Pose) {
        self.anchors.clear();
        self.ops.clear();
        self.relocalization = relocalization;
    }

    /// Let in-flight requests progress by one step.
    pub fn step(&mut self) {
        for (handle, op) in self.ops.iter_mut() {
            if op.state != CloudAnchorState::TaskInProgress {
                continue;
            }
            if op.ticks_left > 0 {
                op.ticks_left -= 1;
                continue;
            }
            op.state = op.outcome;
            debug!(%handle, state = %op.state, "simulated cloud request finished");
        }
    }

    /// Cloud ids hosted so far.
    pub fn hosted_ids(&self) -> Vec<String> {
        self.cloud.keys().cloned().collect()
    }

    /// Number of live local anchors.
    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    /// Number of resolve requests ever submitted for `cloud_anchor_id` and still known.
    pub fn resolve_requests(&self, cloud_anchor_id: &str) -> usize {
        self.ops
            .values()
            .filter(|op| op.cloud_anchor_id.as_deref() == Some(cloud_anchor_id))
            .count()
    }

    fn next_handle(&mut self) -> CloudHandle {
        self.next_handle += 1;
        CloudHandle(self.next_handle)
    }

    fn relocalize(&self, pose: Pose) -> Pose {
        Pose::new(
            self.relocalization.rotation * pose.position + self.relocalization.position,
            (self.relocalization.rotation * pose.rotation).normalize(),
        )
    }

    fn submit(&mut self, op: CloudOp) -> CloudHandle {
        let handle = self.next_handle();
        self.ops.insert(handle, op);
        handle
    }
}

impl ArPlatform for SimulatedPlatform {
    fn raycast_planes(&self, _screen_point: Vec2) -> Option<PlaneHit> {
        self.surface
    }

    fn attach_anchor(&mut self, plane: PlaneId, pose: Pose) -> Result<AnchorKey, PlatformError> {
        match self.surface {
            Some(surface) if surface.plane == plane => {
                self.next_handle += 1;
                let key = AnchorKey(self.next_handle);
                self.anchors.insert(key, pose);
                Ok(key)
            }
            _ => Err(PlatformError::UnknownPlane(plane)),
        }
    }

    fn anchor_pose(&self, anchor: AnchorKey) -> Option<Pose> {
        self.anchors.get(&anchor).copied()
    }

    fn remove_anchor(&mut self, anchor: AnchorKey) {
        self.anchors.remove(&anchor);
    }

    fn host_cloud_anchor(
        &mut self,
        anchor: AnchorKey,
        _ttl_days: u32,
    ) -> Result<CloudHandle, PlatformError> {
        let pose = self
            .anchors
            .get(&anchor)
            .copied()
            .ok_or(PlatformError::UnknownAnchor(anchor))?;
        let outcome = self
            .host_outcomes
            .pop_front()
            .unwrap_or(CloudAnchorState::Success);
        let cloud_anchor_id = (outcome == CloudAnchorState::Success).then(|| {
            self.next_cloud_id += 1;
            let id = format!("ua-{:04}", self.next_cloud_id);
            self.cloud.insert(id.clone(), pose);
            id
        });
        Ok(self.submit(CloudOp {
            state: CloudAnchorState::TaskInProgress,
            outcome,
            cloud_anchor_id,
            pose: Some(pose),
            ticks_left: self.latency_ticks,
        }))
    }

    fn resolve_cloud_anchor(&mut self, cloud_anchor_id: &str) -> Result<CloudHandle, PlatformError> {
        let stored = self.cloud.get(cloud_anchor_id).copied();
        let outcome = match (self.resolve_outcomes.pop_front(), stored) {
            (Some(scripted), _) => scripted,
            (None, Some(_)) => CloudAnchorState::Success,
            (None, None) => CloudAnchorState::ErrorResolvingCloudIdNotFound,
        };
        let pose = stored.map(|p| self.relocalize(p));
        Ok(self.submit(CloudOp {
            state: CloudAnchorState::TaskInProgress,
            outcome,
            cloud_anchor_id: Some(cloud_anchor_id.to_string()),
            pose,
            ticks_left: self.latency_ticks,
        }))
    }

    fn cloud_anchor_state(&self, handle: CloudHandle) -> CloudAnchorState {
        self.ops
            .get(&handle)
            .map_or(CloudAnchorState::None, |op| op.state)
    }

    fn cloud_anchor_id(&self, handle: CloudHandle) -> Option<String> {
        self.ops.get(&handle)?.cloud_anchor_id.clone()
    }

    fn cloud_anchor_pose(&self, handle: CloudHandle) -> Option<Pose> {
        let op = self.ops.get(&handle)?;
        (op.state == CloudAnchorState::Success).then_some(op.pose).flatten()
    }

    fn estimate_feature_map_quality(&self, _camera: &Pose) -> FeatureMapQuality {
        self.quality
    }
}
