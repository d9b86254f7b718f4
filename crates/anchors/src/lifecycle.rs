//! In-flight cloud anchor operations.
//!
//! Every submission becomes a [`PendingOperation`]. [`AnchorLifecycleTracker::poll`]
//! is called once per tick; operations that reached a terminal state are
//! drained exactly once and reported as [`LifecycleEvent`]s.

use std::collections::BTreeMap;

use kitting_core::{AnchorKey, AnchorRecord, CloudHandle, ObjectId, SimTick};
use kitting_transform::Pose;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::platform::{ArPlatform, CloudAnchorState, PlatformError};

/// Lifetime requested when hosting.
pub const HOSTING_LIFETIME_DAYS: u32 = 364;

/// What an operation was submitted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Publishing a local anchor.
    Hosting,
    /// Resolving a stored anchor to show its objects to a picker.
    Resolving,
    /// Resolving a stored anchor so a configurator can edit it.
    ResolvingForConfiguration,
}

impl OperationKind {
    /// Whether this is one of the resolving kinds.
    pub fn is_resolving(self) -> bool {
        !matches!(self, Self::Hosting)
    }
}

/// Data an operation will produce on success.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingPayload {
    /// Local anchor being hosted and the objects placed under it.
    Hosting {
        /// Local anchor handed to the platform.
        anchor: AnchorKey,
        /// Objects to persist once hosted.
        objects: Vec<ObjectId>,
    },
    /// Stored record whose anchor is being resolved.
    Record(AnchorRecord),
}

/// One submitted platform request.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOperation {
    /// Platform handle.
    pub handle: CloudHandle,
    /// Submission kind.
    pub kind: OperationKind,
    /// What completion produces.
    pub payload: PendingPayload,
    /// Tick of submission.
    pub submitted_at: SimTick,
}

impl PendingOperation {
    /// Cloud id being resolved, if this is a resolving operation.
    pub fn resolving_id(&self) -> Option<&str> {
        match &self.payload {
            PendingPayload::Record(record) if self.kind.is_resolving() => {
                Some(record.cloud_anchor_id.as_str())
            }
            _ => None,
        }
    }
}

/// Terminal outcome of a pending operation.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// Hosting succeeded.
    Hosted {
        /// Platform handle, now a live cloud anchor.
        handle: CloudHandle,
        /// Local anchor that was hosted.
        anchor: AnchorKey,
        /// Cloud id assigned by the platform.
        cloud_anchor_id: String,
        /// Live pose of the hosted anchor.
        pose: Pose,
        /// Objects to persist relative to `pose`.
        objects: Vec<ObjectId>,
    },
    /// Resolving succeeded.
    Resolved {
        /// Platform handle, now a live cloud anchor.
        handle: CloudHandle,
        /// [`OperationKind::Resolving`] or [`OperationKind::ResolvingForConfiguration`].
        kind: OperationKind,
        /// Live pose of the resolved anchor.
        pose: Pose,
        /// Stored record the anchor belongs to.
        record: AnchorRecord,
    },
    /// The platform reported a terminal failure.
    Failed {
        /// Platform handle, dropped.
        handle: CloudHandle,
        /// Submission kind.
        kind: OperationKind,
        /// Reported status.
        state: CloudAnchorState,
    },
}

impl LifecycleEvent {
    /// Message shown to the user for a failure.
    pub fn failure_text(&self) -> Option<String> {
        match self {
            Self::Failed {
                kind: OperationKind::Hosting,
                state,
                ..
            } => Some(format!("Host failed - {state}")),
            Self::Failed { state, .. } => {
                Some(format!("Failed in resolving cloud anchor - {state}"))
            }
            _ => None,
        }
    }
}

/// Errors returned when a submission is refused.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LifecycleError {
    /// A resolving request for this id is already in flight.
    #[error("cloud anchor {0} is already being resolved")]
    AlreadyPending(String),
    /// The platform refused the request.
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Tracks in-flight hosting and resolving requests.
#[derive(Debug, Default)]
pub struct AnchorLifecycleTracker {
    pending: Vec<PendingOperation>,
    resolved: BTreeMap<String, CloudHandle>,
}

impl AnchorLifecycleTracker {
    /// Empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start hosting `anchor`; `objects` are reported back on success.
    pub fn submit_hosting<P: ArPlatform + ?Sized>(
        &mut self,
        platform: &mut P,
        anchor: AnchorKey,
        ttl_days: u32,
        objects: Vec<ObjectId>,
        now: SimTick,
    ) -> Result<CloudHandle, LifecycleError> {
        let handle = platform.host_cloud_anchor(anchor, ttl_days)?;
        info!(%anchor, %handle, ttl_days, objects = objects.len(), "hosting submitted");
        self.pending.push(PendingOperation {
            handle,
            kind: OperationKind::Hosting,
            payload: PendingPayload::Hosting { anchor, objects },
            submitted_at: now,
        });
        Ok(handle)
    }

    /// Start resolving `record` for visualization.
    pub fn submit_resolving<P: ArPlatform + ?Sized>(
        &mut self,
        platform: &mut P,
        record: AnchorRecord,
        now: SimTick,
    ) -> Result<CloudHandle, LifecycleError> {
        self.submit_resolve(platform, record, OperationKind::Resolving, now)
    }

    /// Start resolving `record` for configuration.
    pub fn submit_resolving_for_configuration<P: ArPlatform + ?Sized>(
        &mut self,
        platform: &mut P,
        record: AnchorRecord,
        now: SimTick,
    ) -> Result<CloudHandle, LifecycleError> {
        self.submit_resolve(platform, record, OperationKind::ResolvingForConfiguration, now)
    }

    fn submit_resolve<P: ArPlatform + ?Sized>(
        &mut self,
        platform: &mut P,
        record: AnchorRecord,
        kind: OperationKind,
        now: SimTick,
    ) -> Result<CloudHandle, LifecycleError> {
        if self.is_pending(&record.cloud_anchor_id) {
            debug!(cloud_anchor_id = %record.cloud_anchor_id, "resolve already pending");
            return Err(LifecycleError::AlreadyPending(record.cloud_anchor_id));
        }
        let handle = platform.resolve_cloud_anchor(&record.cloud_anchor_id)?;
        info!(cloud_anchor_id = %record.cloud_anchor_id, %handle, ?kind, "resolving submitted");
        self.pending.push(PendingOperation {
            handle,
            kind,
            payload: PendingPayload::Record(record),
            submitted_at: now,
        });
        Ok(handle)
    }

    /// Check every pending operation once and drain the finished ones.
    ///
    /// Events come out in submission order.
    pub fn poll<P: ArPlatform + ?Sized>(&mut self, platform: &P) -> Vec<LifecycleEvent> {
        let mut events = Vec::new();
        let mut still_pending = Vec::with_capacity(self.pending.len());

        for op in self.pending.drain(..) {
            let state = platform.cloud_anchor_state(op.handle);
            if state.is_in_progress() {
                still_pending.push(op);
                continue;
            }
            if state == CloudAnchorState::Success {
                if let Some(event) = Self::complete(platform, op, &mut self.resolved) {
                    events.push(event);
                }
                continue;
            }
            warn!(handle = %op.handle, kind = ?op.kind, %state, "cloud anchor operation failed");
            events.push(LifecycleEvent::Failed {
                handle: op.handle,
                kind: op.kind,
                state,
            });
        }

        self.pending = still_pending;
        events
    }

    fn complete<P: ArPlatform + ?Sized>(
        platform: &P,
        op: PendingOperation,
        resolved: &mut BTreeMap<String, CloudHandle>,
    ) -> Option<LifecycleEvent> {
        let Some(pose) = platform.cloud_anchor_pose(op.handle) else {
            warn!(handle = %op.handle, "succeeded without a pose");
            return Some(LifecycleEvent::Failed {
                handle: op.handle,
                kind: op.kind,
                state: CloudAnchorState::ErrorInternal,
            });
        };

        match op.payload {
            PendingPayload::Hosting { anchor, objects } => {
                let Some(cloud_anchor_id) = platform.cloud_anchor_id(op.handle) else {
                    warn!(handle = %op.handle, "hosted without a cloud id");
                    return Some(LifecycleEvent::Failed {
                        handle: op.handle,
                        kind: op.kind,
                        state: CloudAnchorState::ErrorInternal,
                    });
                };
                info!(%cloud_anchor_id, handle = %op.handle, "hosting succeeded");
                Some(LifecycleEvent::Hosted {
                    handle: op.handle,
                    anchor,
                    cloud_anchor_id,
                    pose,
                    objects,
                })
            }
            PendingPayload::Record(record) => {
                info!(cloud_anchor_id = %record.cloud_anchor_id, handle = %op.handle, "resolving succeeded");
                resolved.insert(record.cloud_anchor_id.clone(), op.handle);
                Some(LifecycleEvent::Resolved {
                    handle: op.handle,
                    kind: op.kind,
                    pose,
                    record,
                })
            }
        }
    }

    /// Whether a resolving request for `cloud_anchor_id` is in flight.
    pub fn is_pending(&self, cloud_anchor_id: &str) -> bool {
        self.pending
            .iter()
            .any(|op| op.resolving_id() == Some(cloud_anchor_id))
    }

    /// Whether `cloud_anchor_id` was resolved since the last clear.
    pub fn is_resolved(&self, cloud_anchor_id: &str) -> bool {
        self.resolved.contains_key(cloud_anchor_id)
    }

    /// Handle of a resolved anchor.
    pub fn resolved_handle(&self, cloud_anchor_id: &str) -> Option<CloudHandle> {
        self.resolved.get(cloud_anchor_id).copied()
    }

    /// Operations still in flight.
    pub fn pending(&self) -> &[PendingOperation] {
        &self.pending
    }

    /// Number of in-flight operations of `kind`.
    pub fn pending_count(&self, kind: OperationKind) -> usize {
        self.pending.iter().filter(|op| op.kind == kind).count()
    }

    /// Whether anything is in flight.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Forget the resolved set (scenario changed).
    pub fn clear_resolved(&mut self) {
        self.resolved.clear();
    }

    /// Drop everything. Platform requests already submitted finish unobserved.
    pub fn clear(&mut self) {
        if !self.pending.is_empty() {
            debug!(dropped = self.pending.len(), "discarding pending cloud operations");
        }
        self.pending.clear();
        self.resolved.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec3};
    use kitting_core::PlaneId;
    use std::collections::HashMap;

    use crate::platform::{FeatureMapQuality, PlaneHit};

    /// Platform double where every request stays in progress until told otherwise.
    #[derive(Default)]
    struct StubPlatform {
        next: u64,
        states: HashMap<CloudHandle, CloudAnchorState>,
        ids: HashMap<CloudHandle, String>,
    }

    impl StubPlatform {
        fn finish(&mut self, handle: CloudHandle, state: CloudAnchorState) {
            self.states.insert(handle, state);
        }
    }

    impl ArPlatform for StubPlatform {
        fn raycast_planes(&self, _screen_point: Vec2) -> Option<PlaneHit> {
            None
        }

        fn attach_anchor(&mut self, _plane: PlaneId, _pose: Pose) -> Result<AnchorKey, PlatformError> {
            self.next += 1;
            Ok(AnchorKey(self.next))
        }

        fn anchor_pose(&self, _anchor: AnchorKey) -> Option<Pose> {
            Some(Pose::IDENTITY)
        }

        fn remove_anchor(&mut self, _anchor: AnchorKey) {}

        fn host_cloud_anchor(&mut self, _anchor: AnchorKey, _ttl_days: u32) -> Result<CloudHandle, PlatformError> {
            self.next += 1;
            let handle = CloudHandle(self.next);
            self.states.insert(handle, CloudAnchorState::TaskInProgress);
            self.ids.insert(handle, format!("hosted-{}", self.next));
            Ok(handle)
        }

        fn resolve_cloud_anchor(&mut self, cloud_anchor_id: &str) -> Result<CloudHandle, PlatformError> {
            self.next += 1;
            let handle = CloudHandle(self.next);
            self.states.insert(handle, CloudAnchorState::TaskInProgress);
            self.ids.insert(handle, cloud_anchor_id.to_string());
            Ok(handle)
        }

        fn cloud_anchor_state(&self, handle: CloudHandle) -> CloudAnchorState {
            self.states.get(&handle).copied().unwrap_or(CloudAnchorState::None)
        }

        fn cloud_anchor_id(&self, handle: CloudHandle) -> Option<String> {
            self.ids.get(&handle).cloned()
        }

        fn cloud_anchor_pose(&self, _handle: CloudHandle) -> Option<Pose> {
            Some(Pose::new(Vec3::new(1.0, 0.0, 0.0), glam::Quat::IDENTITY))
        }

        fn estimate_feature_map_quality(&self, _camera: &Pose) -> FeatureMapQuality {
            FeatureMapQuality::Good
        }
    }

    fn record(id: &str) -> AnchorRecord {
        AnchorRecord::new(
            "CloudAnchor0",
            id,
            chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap(),
            "Line3",
            Vec::new(),
        )
    }

    #[test]
    fn in_progress_stays_pending() {
        let mut platform = StubPlatform::default();
        let mut tracker = AnchorLifecycleTracker::new();
        tracker
            .submit_hosting(&mut platform, AnchorKey(1), HOSTING_LIFETIME_DAYS, vec![], SimTick::ZERO)
            .unwrap();

        assert!(tracker.poll(&platform).is_empty());
        assert_eq!(tracker.pending_count(OperationKind::Hosting), 1);
    }

    #[test]
    fn hosting_success_is_drained_once() {
        let mut platform = StubPlatform::default();
        let mut tracker = AnchorLifecycleTracker::new();
        let objects = vec![ObjectId(3), ObjectId(4)];
        let handle = tracker
            .submit_hosting(&mut platform, AnchorKey(9), 364, objects.clone(), SimTick::ZERO)
            .unwrap();
        platform.finish(handle, CloudAnchorState::Success);

        let events = tracker.poll(&platform);
        assert_eq!(events.len(), 1);
        match &events[0] {
            LifecycleEvent::Hosted { anchor, objects: got, cloud_anchor_id, .. } => {
                assert_eq!(*anchor, AnchorKey(9));
                assert_eq!(got, &objects);
                assert!(cloud_anchor_id.starts_with("hosted-"));
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(tracker.poll(&platform).is_empty());
        assert!(!tracker.has_pending());
    }

    #[test]
    fn failure_reports_status_name_and_drops() {
        let mut platform = StubPlatform::default();
        let mut tracker = AnchorLifecycleTracker::new();
        let host = tracker
            .submit_hosting(&mut platform, AnchorKey(1), 364, vec![], SimTick::ZERO)
            .unwrap();
        let resolve = tracker
            .submit_resolving(&mut platform, record("abc"), SimTick::ZERO)
            .unwrap();
        platform.finish(host, CloudAnchorState::ErrorHostingDatasetProcessingFailed);
        platform.finish(resolve, CloudAnchorState::ErrorResolvingCloudIdNotFound);

        let texts: Vec<String> = tracker
            .poll(&platform)
            .iter()
            .filter_map(LifecycleEvent::failure_text)
            .collect();
        assert_eq!(
            texts,
            vec![
                "Host failed - ErrorHostingDatasetProcessingFailed".to_string(),
                "Failed in resolving cloud anchor - ErrorResolvingCloudIdNotFound".to_string(),
            ]
        );
        assert!(!tracker.has_pending());
        assert!(!tracker.is_resolved("abc"));
    }

    #[test]
    fn duplicate_resolve_rejected_until_completion() {
        let mut platform = StubPlatform::default();
        let mut tracker = AnchorLifecycleTracker::new();

        let first = tracker
            .submit_resolving(&mut platform, record("dup"), SimTick::ZERO)
            .unwrap();
        let second = tracker.submit_resolving(&mut platform, record("dup"), SimTick(1));
        assert_eq!(second, Err(LifecycleError::AlreadyPending("dup".into())));

        platform.finish(first, CloudAnchorState::Success);
        let events = tracker.poll(&platform);
        assert_eq!(events.len(), 1);
        assert!(tracker.is_resolved("dup"));
        assert_eq!(tracker.resolved_handle("dup"), Some(first));

        let third = tracker
            .submit_resolving(&mut platform, record("dup"), SimTick(2))
            .unwrap();
        assert_ne!(third, first);
        platform.finish(third, CloudAnchorState::Success);
        assert_eq!(tracker.poll(&platform).len(), 1);
    }

    #[test]
    fn resolving_kind_is_carried_through() {
        let mut platform = StubPlatform::default();
        let mut tracker = AnchorLifecycleTracker::new();
        let handle = tracker
            .submit_resolving_for_configuration(&mut platform, record("conf"), SimTick::ZERO)
            .unwrap();
        platform.finish(handle, CloudAnchorState::Success);

        match tracker.poll(&platform).pop() {
            Some(LifecycleEvent::Resolved { kind, record, .. }) => {
                assert_eq!(kind, OperationKind::ResolvingForConfiguration);
                assert_eq!(record.cloud_anchor_id, "conf");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn clear_discards_late_results() {
        let mut platform = StubPlatform::default();
        let mut tracker = AnchorLifecycleTracker::new();
        let handle = tracker
            .submit_resolving(&mut platform, record("late"), SimTick::ZERO)
            .unwrap();
        tracker.clear();
        platform.finish(handle, CloudAnchorState::Success);

        assert!(tracker.poll(&platform).is_empty());
        assert!(!tracker.is_resolved("late"));
    }
}
