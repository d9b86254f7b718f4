//! The session state machine.
//!
//! [`SessionController::tick`] runs once per frame with the tracked camera and
//! walks a fixed phase order: scheduled tasks, placement, quality gate,
//! platform poll, materialization, pending anchor updates, guidance. Every
//! other public method is a UI event. Nothing here returns an error to the
//! caller; failures are logged and turned into help text.

use std::collections::BTreeMap;

use glam::{Vec2, Vec3};
use kitting_anchors::{
    AnchorLifecycleTracker, AnchorQualityGate, ArPlatform, LifecycleError, LifecycleEvent,
    OperationKind, PlaneHit, QualityGateConfig, QualityMarker, SCAN_AROUND_TEXT,
};
use kitting_camera::ArCamera;
use kitting_core::{AnchorKey, AnchorRecord, Clock, CloudHandle, Euler3, ObjectId, PieceInfo, SimTick};
use kitting_storage::{AnchorHistoryStore, KeyValueStore};
use kitting_transform::{rotate_self, Pose};
use tracing::{debug, info, warn};

use crate::arena::{AnchorRef, ArenaObject, ObjectArena, ObjectRole};
use crate::config::SessionConfig;
use crate::edit::{AxisMask, EditMode, RotationAxis};
use crate::fetch::{FetchList, FetchOutcome};
use crate::placement::{cube_markers, is_placeable, marker_cube_pose};
use crate::scheduler::Scheduler;
use crate::ui::{
    Button, UiSink, EDIT_SELECTED_TEXT, FETCH_GREEN_TEXT, FIND_SURFACE_TEXT, HOST_SUCCEEDED_TEXT,
    PLACE_ANCHOR_TEXT, SEARCHING_TEXT, SELECT_OR_ADD_TEXT,
};

/// Top-level application mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionMode {
    /// Main menu.
    #[default]
    None,
    /// Placing and hosting anchors.
    Configuring,
    /// Visualization waiting for a kit to be identified.
    Scanning,
    /// Visualization guiding a picker through a kit.
    Visualizing,
}

impl SessionMode {
    /// Scanning or Visualizing.
    pub fn is_visualization(self) -> bool {
        matches!(self, Self::Scanning | Self::Visualizing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionTask {
    InstantiateFirstObject(AnchorKey),
    ReturnToScanning,
}

/// Anchor placed in this session and not hosted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalAnchor {
    /// Platform handle.
    pub key: AnchorKey,
    /// Hit pose the anchor was attached at.
    pub pose: Pose,
    /// Pose of the marker cube.
    pub cube: Pose,
    /// Cube walls still shown.
    pub markers: Vec<QualityMarker>,
    /// Whether the quality gate is still sampling.
    pub gating: bool,
    /// Whether the first object was created.
    pub ready: bool,
}

/// Cloud anchor offered for editing while configuring.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationAnchor {
    /// Pose when it was hosted or resolved.
    pub pose: Pose,
    /// Stored record.
    pub record: AnchorRecord,
}

/// Where the picker should look next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Guidance {
    /// Target bin.
    pub target: ObjectId,
    /// Target world position.
    pub position: Vec3,
    /// Whether the target is off screen and the arrow is shown.
    pub show_arrow: bool,
}

/// Orchestrates placement, gating, editing, hosting and resolving.
pub struct SessionController<P, S, C, U> {
    platform: P,
    store: AnchorHistoryStore<S, C>,
    ui: U,
    config: SessionConfig,
    gate: AnchorQualityGate,
    tracker: AnchorLifecycleTracker,
    scheduler: Scheduler<SessionTask>,
    arena: ObjectArena,
    tick: SimTick,
    camera: ArCamera,
    mode: SessionMode,
    scenario: String,
    placement_enabled: bool,
    indicator: Option<PlaneHit>,
    local_anchor: Option<LocalAnchor>,
    configuration_anchors: BTreeMap<CloudHandle, ConfigurationAnchor>,
    expanded: Option<CloudHandle>,
    pending_updates: Vec<CloudHandle>,
    selected: Option<ObjectId>,
    edit_mode: EditMode,
    rotation_axis: RotationAxis,
    translation_mask: AxisMask,
    fetch: FetchList,
    guidance: Option<Guidance>,
}

impl<P, S, C, U> SessionController<P, S, C, U>
where
    P: ArPlatform,
    S: KeyValueStore,
    C: Clock,
    U: UiSink,
{
    /// Idle session in [`SessionMode::None`].
    pub fn new(
        platform: P,
        store: AnchorHistoryStore<S, C>,
        ui: U,
        config: SessionConfig,
        quality: QualityGateConfig,
    ) -> Self {
        Self {
            platform,
            store,
            ui,
            config,
            gate: AnchorQualityGate::new(quality),
            tracker: AnchorLifecycleTracker::new(),
            scheduler: Scheduler::new(),
            arena: ObjectArena::new(),
            tick: SimTick::ZERO,
            camera: ArCamera::default(),
            mode: SessionMode::None,
            scenario: String::new(),
            placement_enabled: false,
            indicator: None,
            local_anchor: None,
            configuration_anchors: BTreeMap::new(),
            expanded: None,
            pending_updates: Vec::new(),
            selected: None,
            edit_mode: EditMode::default(),
            rotation_axis: RotationAxis::default(),
            translation_mask: AxisMask::default(),
            fetch: FetchList::default(),
            guidance: None,
        }
    }

    // ----- frame ---------------------------------------------------------

    /// Advance one tick with the current camera.
    pub fn tick(&mut self, camera: &ArCamera) {
        self.tick = self.tick.advance(1);
        self.camera = *camera;

        self.run_due_tasks();
        self.update_placement();
        self.update_quality();
        for event in self.tracker.poll(&self.platform) {
            self.materialize(event);
        }
        self.apply_pending_updates();
        self.update_guidance();
    }

    fn run_due_tasks(&mut self) {
        for task in self.scheduler.drain_due(self.tick) {
            match task {
                SessionTask::InstantiateFirstObject(key) => self.instantiate_first_object(key),
                SessionTask::ReturnToScanning => self.return_to_scanning(),
            }
        }
    }

    fn update_placement(&mut self) {
        if self.mode != SessionMode::Configuring || !self.placement_enabled {
            return;
        }
        let hit = self
            .platform
            .raycast_planes(Vec2::splat(0.5))
            .filter(|hit| is_placeable(hit.alignment));
        let changed = hit.is_some() != self.indicator.is_some();
        self.indicator = hit;
        if changed {
            let found = self.indicator.is_some();
            self.ui.set_button_enabled(Button::Place, found);
            self.ui
                .set_help_text(if found { PLACE_ANCHOR_TEXT } else { FIND_SURFACE_TEXT });
        }
    }

    fn update_quality(&mut self) {
        if self.mode != SessionMode::Configuring {
            return;
        }
        let Some(local) = self.local_anchor.as_mut() else {
            return;
        };
        if !local.gating {
            return;
        }

        let report = self
            .gate
            .sample_frame(&self.platform, &self.camera, &local.markers);
        if let Some(text) = report.help_text {
            self.ui.set_help_text(text);
        }
        if report.converged {
            local.gating = false;
            let delay = self.config.convergence_delay_ticks();
            self.scheduler
                .schedule_after(self.tick, delay, SessionTask::InstantiateFirstObject(local.key));
            info!(anchor = %local.key, delay_ticks = delay, "anchor quality converged");
        }
    }

    fn instantiate_first_object(&mut self, key: AnchorKey) {
        let Some(local) = self.local_anchor.as_mut().filter(|l| l.key == key) else {
            debug!(anchor = %key, "anchor gone before its first object");
            return;
        };
        local.markers.clear();
        local.ready = true;
        let pose = self.platform.anchor_pose(key).unwrap_or(local.pose);
        let id = self
            .arena
            .insert(ArenaObject::at_anchor(pose, AnchorRef::Local(key)));
        info!(anchor = %key, object = %id, "first object placed");

        self.ui.set_button_enabled(Button::Host, true);
        self.ui.set_button_enabled(Button::AddObject, true);
        self.ui.set_help_text(SELECT_OR_ADD_TEXT);
    }

    fn materialize(&mut self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Hosted {
                handle,
                anchor,
                cloud_anchor_id,
                pose,
                objects,
            } => self.on_hosted(handle, anchor, cloud_anchor_id, pose, &objects),
            LifecycleEvent::Resolved {
                handle,
                kind: OperationKind::ResolvingForConfiguration,
                pose,
                record,
            } => self.on_resolved_for_configuration(handle, pose, record),
            LifecycleEvent::Resolved {
                handle,
                pose,
                record,
                ..
            } => self.on_resolved(handle, pose, &record),
            failed @ LifecycleEvent::Failed { .. } => {
                if let Some(text) = failed.failure_text() {
                    self.ui.set_help_text(&text);
                }
                if let LifecycleEvent::Failed {
                    kind: OperationKind::Hosting,
                    ..
                } = failed
                {
                    self.ui.set_button_enabled(Button::Host, true);
                    self.ui.set_button_enabled(Button::AddObject, true);
                    self.ui.set_button_enabled(Button::NewAnchor, true);
                }
            }
        }
    }

    fn on_hosted(
        &mut self,
        handle: CloudHandle,
        anchor: AnchorKey,
        cloud_anchor_id: String,
        pose: Pose,
        objects: &[ObjectId],
    ) {
        let records = objects
            .iter()
            .filter_map(|id| self.arena.get(*id))
            .map(|object| object.to_record(&pose))
            .collect();
        let count = self.store.record_count().unwrap_or_else(|err| {
            warn!(%err, "failed to count stored anchors");
            0
        });
        let record = AnchorRecord::new(
            AnchorRecord::sequential_name(count),
            cloud_anchor_id,
            self.store.clock().now(),
            self.scenario.clone(),
            records,
        );
        if let Err(err) = self.store.save(record.clone()) {
            warn!(%err, cloud_anchor_id = %record.cloud_anchor_id, "failed to persist hosted anchor");
        }

        let owner = AnchorRef::Local(anchor);
        self.arena.remove_owned(owner);
        if self.selected.is_some_and(|id| !self.arena.contains(id)) {
            self.selected = None;
        }
        if self.local_anchor.as_ref().is_some_and(|l| l.key == anchor) {
            self.local_anchor = None;
            self.platform.remove_anchor(anchor);
        }
        self.configuration_anchors
            .insert(handle, ConfigurationAnchor { pose, record });

        self.ui.set_help_text(HOST_SUCCEEDED_TEXT);
        self.ui.set_button_enabled(Button::NewAnchor, true);
        self.ui.set_button_enabled(Button::RemoveObject, false);
    }

    fn on_resolved_for_configuration(&mut self, handle: CloudHandle, pose: Pose, record: AnchorRecord) {
        if self.mode != SessionMode::Configuring {
            debug!(%handle, "configuration resolve finished outside configuration");
            return;
        }
        for object in record.objects.iter().filter(|o| o.piece_info.is_configured()) {
            self.ui
                .set_dropdown_highlight(&object.piece_info.reference, "");
        }
        info!(cloud_anchor_id = %record.cloud_anchor_id, %handle, "anchor available for editing");
        self.configuration_anchors
            .insert(handle, ConfigurationAnchor { pose, record });
    }

    fn on_resolved(&mut self, handle: CloudHandle, pose: Pose, record: &AnchorRecord) {
        if !self.mode.is_visualization() {
            debug!(%handle, "resolve finished outside visualization");
            return;
        }
        for stored in &record.objects {
            let mut object =
                ArenaObject::from_record(stored, &pose, AnchorRef::Cloud(handle), ObjectRole::Resolved);
            object.visible = self.is_shown(object.reference());
            self.arena.insert(object);
        }
        info!(
            cloud_anchor_id = %record.cloud_anchor_id,
            objects = record.objects.len(),
            "anchor objects restored"
        );
        self.ui.set_help_text(FETCH_GREEN_TEXT);
    }

    fn apply_pending_updates(&mut self) {
        for handle in std::mem::take(&mut self.pending_updates) {
            let Some(anchor) = self.configuration_anchors.get(&handle) else {
                debug!(%handle, "update for an anchor that is gone");
                continue;
            };
            let pose = self.platform.cloud_anchor_pose(handle).unwrap_or(anchor.pose);
            let owner = AnchorRef::Cloud(handle);
            let mut record = anchor.record.clone();
            record.objects = self
                .arena
                .iter()
                .filter(|(_, o)| o.role == ObjectRole::Editable && o.owner == owner)
                .map(|(_, o)| o.to_record(&pose))
                .collect();

            match self.store.update(record.clone()) {
                Ok(replaced) => {
                    debug!(cloud_anchor_id = %record.cloud_anchor_id, replaced, "anchor objects updated");
                    if let Some(entry) = self.configuration_anchors.get_mut(&handle) {
                        entry.record = record;
                    }
                    self.ui.set_help_text(HOST_SUCCEEDED_TEXT);
                }
                Err(err) => {
                    warn!(%err, cloud_anchor_id = %record.cloud_anchor_id, "failed to update anchor record");
                }
            }
            self.ui.set_button_enabled(Button::Host, true);
            self.ui.set_button_enabled(Button::AddObject, true);
        }
    }

    fn update_guidance(&mut self) {
        self.guidance = None;
        if self.mode != SessionMode::Visualizing {
            return;
        }
        let eye = self.camera.position();
        let target = self
            .arena
            .iter()
            .filter(|(_, o)| o.role == ObjectRole::Resolved && o.visible)
            .min_by(|(_, a), (_, b)| {
                a.pose
                    .position
                    .distance_squared(eye)
                    .total_cmp(&b.pose.position.distance_squared(eye))
            });
        self.guidance = target.map(|(id, object)| Guidance {
            target: id,
            position: object.pose.position,
            show_arrow: !self.camera.is_in_view(object.pose.position),
        });
    }

    // ----- modes ---------------------------------------------------------

    fn enter(&mut self, mode: SessionMode, scenario: &str) -> bool {
        if self.mode != SessionMode::None {
            warn!(current = ?self.mode, requested = ?mode, "leave the current mode first");
            return false;
        }
        if self.scenario != scenario {
            self.tracker.clear_resolved();
        }
        self.scenario = scenario.to_string();
        self.mode = mode;
        info!(?mode, scenario = %self.scenario, "entered mode");
        true
    }

    /// Start configuring `scenario`: place new anchors and edit stored ones.
    pub fn enter_configuration(&mut self, scenario: &str) -> bool {
        if !self.enter(SessionMode::Configuring, scenario) {
            return false;
        }
        self.placement_enabled = true;
        self.indicator = None;
        for button in [
            Button::Place,
            Button::NewAnchor,
            Button::Host,
            Button::AddObject,
            Button::RemoveObject,
        ] {
            self.ui.set_button_enabled(button, false);
        }
        self.ui.set_button_enabled(Button::PieceList, true);
        self.ui.set_help_text(PLACE_ANCHOR_TEXT);
        self.resolve_scenario_anchors();
        true
    }

    /// Start visualizing `scenario`; waits in Scanning for a kit.
    pub fn enter_visualization(&mut self, scenario: &str) -> bool {
        if !self.enter(SessionMode::Scanning, scenario) {
            return false;
        }
        self.ui.set_help_text(SEARCHING_TEXT);
        self.ui.set_end_of_kit(false);
        self.resolve_scenario_anchors();
        true
    }

    /// Kit scanned: `pieces` are `(reference, quantity)` pairs to fetch.
    pub fn kit_identified<I, T>(&mut self, pieces: I) -> bool
    where
        I: IntoIterator<Item = (T, u32)>,
        T: Into<String>,
    {
        if self.mode != SessionMode::Scanning {
            debug!(mode = ?self.mode, "kit identified outside scanning");
            return false;
        }
        self.fetch = FetchList::new(pieces);
        self.mode = SessionMode::Visualizing;
        let (done, total) = self.fetch.progress();
        self.ui.set_fetch_progress(done, total);
        self.ui.set_end_of_kit(false);
        self.refresh_visibility();
        let restored = !self.arena.ids_with(ObjectRole::Resolved).is_empty();
        self.ui
            .set_help_text(if restored { FETCH_GREEN_TEXT } else { SEARCHING_TEXT });
        info!(pieces = total, "kit identified");
        true
    }

    /// Fetch pieces in list order or in any order.
    pub fn set_fetch_order(&mut self, ordered: bool) -> bool {
        if !self.mode.is_visualization() {
            return false;
        }
        self.fetch.set_ordered(ordered);
        self.refresh_visibility();
        true
    }

    fn return_to_scanning(&mut self) {
        if self.mode != SessionMode::Visualizing {
            return;
        }
        self.mode = SessionMode::Scanning;
        self.fetch = FetchList::default();
        self.ui.set_end_of_kit(false);
        self.ui.set_fetch_progress(0, 0);
        self.refresh_visibility();
        self.guidance = None;
        info!("kit finished, scanning for the next one");
    }

    /// Drop everything and return to the main menu.
    pub fn back(&mut self) {
        self.clear_session();
        info!(from = ?self.mode, "back to menu");
        self.mode = SessionMode::None;
    }

    /// Drop anchors, objects, pending work and fetch state; stay in the mode.
    ///
    /// Requests already submitted to the platform finish unobserved.
    pub fn clear(&mut self) {
        self.clear_session();
        if self.mode == SessionMode::Configuring {
            self.placement_enabled = true;
            self.ui.set_button_enabled(Button::Host, false);
            self.ui.set_button_enabled(Button::AddObject, false);
            self.ui.set_button_enabled(Button::RemoveObject, false);
            self.ui.set_help_text(PLACE_ANCHOR_TEXT);
        }
        if self.mode == SessionMode::Visualizing {
            self.mode = SessionMode::Scanning;
        }
    }

    fn clear_session(&mut self) {
        if let Some(local) = self.local_anchor.take() {
            self.platform.remove_anchor(local.key);
        }
        self.arena.clear();
        self.configuration_anchors.clear();
        self.expanded = None;
        self.selected = None;
        self.pending_updates.clear();
        self.tracker.clear();
        self.scheduler.clear();
        self.gate.reset();
        self.indicator = None;
        self.placement_enabled = false;
        self.guidance = None;
        self.fetch = FetchList::default();
        if self.mode.is_visualization() {
            self.ui.set_end_of_kit(false);
            self.ui.set_fetch_progress(0, 0);
        }
    }

    /// Submit resolve requests for the scenario's stored anchors.
    ///
    /// Anchors already resolved, in flight, or hosted in this session are
    /// skipped. Returns how many requests were submitted.
    pub fn resolve_scenario_anchors(&mut self) -> usize {
        let kind = match self.mode {
            SessionMode::Configuring => OperationKind::ResolvingForConfiguration,
            SessionMode::Scanning | SessionMode::Visualizing => OperationKind::Resolving,
            SessionMode::None => return 0,
        };
        let records = match self.store.records_for_scenario(&self.scenario) {
            Ok(records) => records,
            Err(err) => {
                warn!(%err, scenario = %self.scenario, "failed to read stored anchors");
                return 0;
            }
        };

        let mut submitted = 0;
        for record in records {
            let id = record.cloud_anchor_id.clone();
            let known = self
                .configuration_anchors
                .values()
                .any(|a| a.record.cloud_anchor_id == id);
            if known || self.tracker.is_resolved(&id) {
                debug!(cloud_anchor_id = %id, "anchor already resolved");
                continue;
            }
            let result = if kind == OperationKind::Resolving {
                self.tracker
                    .submit_resolving(&mut self.platform, record, self.tick)
            } else {
                self.tracker
                    .submit_resolving_for_configuration(&mut self.platform, record, self.tick)
            };
            match result {
                Ok(_) => submitted += 1,
                Err(LifecycleError::AlreadyPending(id)) => {
                    debug!(cloud_anchor_id = %id, "resolve already in flight");
                }
                Err(err) => warn!(%err, cloud_anchor_id = %id, "failed to submit resolve"),
            }
        }
        info!(submitted, ?kind, scenario = %self.scenario, "resolving scenario anchors");
        submitted
    }

    // ----- placement -----------------------------------------------------

    /// Allow placing another anchor.
    pub fn enable_new_anchor(&mut self) -> bool {
        if self.mode != SessionMode::Configuring || self.hosting_in_flight() {
            return false;
        }
        self.placement_enabled = true;
        self.indicator = None;
        self.ui.set_button_enabled(Button::NewAnchor, false);
        self.ui.set_button_enabled(Button::Place, false);
        self.ui.set_help_text(PLACE_ANCHOR_TEXT);
        true
    }

    /// Place an anchor at the indicator found on the last tick.
    pub fn place_anchor(&mut self) -> bool {
        if self.mode != SessionMode::Configuring || !self.placement_enabled {
            return false;
        }
        match self.indicator {
            Some(hit) => self.place_at(hit),
            None => {
                self.ui.set_help_text(FIND_SURFACE_TEXT);
                false
            }
        }
    }

    /// Screen tap at `point` (normalized viewport coordinates).
    pub fn tap(&mut self, point: Vec2) -> bool {
        if self.mode != SessionMode::Configuring || !self.placement_enabled {
            return false;
        }
        match self
            .platform
            .raycast_planes(point)
            .filter(|hit| is_placeable(hit.alignment))
        {
            Some(hit) => self.place_at(hit),
            None => false,
        }
    }

    fn place_at(&mut self, hit: PlaneHit) -> bool {
        if self.hosting_in_flight() {
            debug!("placement refused while hosting");
            return false;
        }
        let camera_yaw = self.camera.pose.euler_degrees().y;
        let Some(cube) = marker_cube_pose(&hit, camera_yaw) else {
            debug!(plane = %hit.plane, alignment = ?hit.alignment, "plane not placeable");
            return false;
        };

        self.discard_editing();
        let key = match self.platform.attach_anchor(hit.plane, hit.pose) {
            Ok(key) => key,
            Err(err) => {
                warn!(%err, plane = %hit.plane, "failed to attach anchor");
                return false;
            }
        };
        let markers = cube_markers(&cube, self.config.marker_half_extent);
        info!(anchor = %key, plane = %hit.plane, alignment = ?hit.alignment, "anchor placed");
        self.local_anchor = Some(LocalAnchor {
            key,
            pose: hit.pose,
            cube,
            markers,
            gating: true,
            ready: false,
        });
        self.placement_enabled = false;
        self.indicator = None;

        self.ui.set_button_enabled(Button::Place, false);
        self.ui.set_button_enabled(Button::Host, false);
        self.ui.set_button_enabled(Button::AddObject, false);
        self.ui.set_button_enabled(Button::RemoveObject, false);
        self.ui.set_button_enabled(Button::NewAnchor, true);
        self.ui.set_help_text(SCAN_AROUND_TEXT);
        true
    }

    /// The bins of a hosting anchor stay until the request completes.
    fn hosting_in_flight(&self) -> bool {
        self.tracker.pending_count(OperationKind::Hosting) > 0
    }

    /// Drop the anchor being edited and its objects.
    fn discard_editing(&mut self) {
        if let Some(local) = self.local_anchor.take() {
            self.platform.remove_anchor(local.key);
        }
        self.expanded = None;
        self.gate.reset();
        self.arena.remove_role(ObjectRole::Editable);
        self.selected = None;
        // Only first-object instantiations are queued while configuring.
        self.scheduler.clear();
    }

    fn current_anchor(&self) -> Option<(AnchorRef, Pose)> {
        if let Some(handle) = self.expanded {
            let anchor = self.configuration_anchors.get(&handle)?;
            let pose = self.platform.cloud_anchor_pose(handle).unwrap_or(anchor.pose);
            return Some((AnchorRef::Cloud(handle), pose));
        }
        let local = self.local_anchor.as_ref().filter(|l| l.ready)?;
        let pose = self.platform.anchor_pose(local.key).unwrap_or(local.pose);
        Some((AnchorRef::Local(local.key), pose))
    }

    // ----- editing -------------------------------------------------------

    /// Add a bin: a copy of the selected one, or a fresh one at the anchor.
    pub fn add_object(&mut self) -> Option<ObjectId> {
        if self.mode != SessionMode::Configuring {
            return None;
        }
        let (owner, pose) = self.current_anchor()?;
        let object = match self.selected_editable() {
            Some(selected) => selected.copy(),
            None => ArenaObject::at_anchor(pose, owner),
        };
        let copied = self.selected.is_some();
        let id = self.arena.insert(object);
        debug!(object = %id, copied, "object added");
        Some(id)
    }

    /// Remove the selected bin.
    pub fn remove_selected(&mut self) -> bool {
        let Some(id) = self.selected_editable().and(self.selected) else {
            return false;
        };
        self.selected = None;
        let Some(object) = self.arena.remove(id) else {
            return false;
        };
        if let Some(piece) = object.piece {
            self.ui.set_dropdown_highlight("", &piece.reference);
        }
        debug!(object = %id, "object removed");
        self.ui.set_button_enabled(Button::RemoveObject, false);
        self.ui.set_help_text(SELECT_OR_ADD_TEXT);
        true
    }

    /// Select a bin. While visualizing this marks its piece as fetched.
    pub fn select_object(&mut self, id: ObjectId) -> bool {
        match self.mode {
            SessionMode::Configuring => {
                let editable = self
                    .arena
                    .get(id)
                    .is_some_and(|o| o.role == ObjectRole::Editable);
                if !editable {
                    return false;
                }
                self.selected = Some(id);
                self.ui.set_button_enabled(Button::RemoveObject, true);
                self.ui.set_help_text(EDIT_SELECTED_TEXT);
                true
            }
            SessionMode::Visualizing => self.mark_fetched(id),
            _ => false,
        }
    }

    /// Clear the selection.
    pub fn deselect(&mut self) {
        if self.selected.take().is_some() {
            self.ui.set_button_enabled(Button::RemoveObject, false);
            self.ui.set_help_text(SELECT_OR_ADD_TEXT);
        }
    }

    /// Expand a hosted or resolved anchor into editable bins.
    ///
    /// Unsaved edits of the anchor being edited are dropped.
    pub fn select_configuration_anchor(&mut self, handle: CloudHandle) -> bool {
        if self.mode != SessionMode::Configuring
            || self.expanded == Some(handle)
            || self.hosting_in_flight()
        {
            return false;
        }
        let Some(anchor) = self.configuration_anchors.get(&handle) else {
            return false;
        };
        let pose = self.platform.cloud_anchor_pose(handle).unwrap_or(anchor.pose);
        let stored = anchor.record.objects.clone();

        self.discard_editing();
        self.expanded = Some(handle);
        self.placement_enabled = false;
        for object in &stored {
            self.arena.insert(ArenaObject::from_record(
                object,
                &pose,
                AnchorRef::Cloud(handle),
                ObjectRole::Editable,
            ));
        }
        info!(%handle, objects = stored.len(), "anchor expanded for editing");

        self.ui.set_button_enabled(Button::Host, true);
        self.ui.set_button_enabled(Button::AddObject, true);
        self.ui.set_button_enabled(Button::RemoveObject, false);
        self.ui.set_help_text(SELECT_OR_ADD_TEXT);
        true
    }

    /// Rotate or scale with twist/pinch gestures.
    pub fn set_edit_mode(&mut self, mode: EditMode) {
        self.edit_mode = mode;
    }

    /// Switch the twist axis; every editable bin starts a new rotation segment.
    pub fn set_rotation_axis(&mut self, axis: RotationAxis) {
        for (_, object) in self.arena.iter_mut() {
            if object.role == ObjectRole::Editable {
                object.history.begin_segment();
            }
        }
        self.rotation_axis = axis;
    }

    /// Restrict drags to some world axes.
    pub fn set_translation_mask(&mut self, mask: AxisMask) {
        self.translation_mask = mask;
    }

    /// Twist the selected bin by `degrees` about the current axis.
    pub fn twist(&mut self, degrees: f32) -> bool {
        if self.edit_mode != EditMode::Rotate || !degrees.is_finite() {
            return false;
        }
        let axis = self.rotation_axis.twist_axis();
        let Some(object) = self.selected_editable_mut() else {
            return false;
        };
        object.pose.rotation = rotate_self(object.pose.rotation, Euler3::from(axis * degrees));
        object.history.amend_last(axis, degrees);
        true
    }

    /// Drag the selected bin by `delta`, filtered by the translation mask.
    pub fn translate(&mut self, delta: Vec3) -> bool {
        let mask = self.translation_mask;
        let Some(object) = self.selected_editable_mut() else {
            return false;
        };
        object.pose.position += mask.apply(delta);
        true
    }

    /// Pinch the selected bin by `factor`.
    pub fn scale_by(&mut self, factor: f32) -> bool {
        if self.edit_mode != EditMode::Scale || !factor.is_finite() || factor <= 0.0 {
            return false;
        }
        let Some(object) = self.selected_editable_mut() else {
            return false;
        };
        object.scale *= factor;
        true
    }

    /// Assign `piece` to the selected bin. An empty reference unassigns.
    pub fn assign_piece(&mut self, piece: PieceInfo) -> bool {
        let Some(object) = self.selected_editable_mut() else {
            return false;
        };
        let reference = piece.reference.clone();
        let previous = std::mem::replace(&mut object.piece, Some(piece).filter(PieceInfo::is_configured));
        let cleared = previous
            .map(|p| p.reference)
            .filter(|r| *r != reference)
            .unwrap_or_default();
        self.ui.set_dropdown_highlight(&reference, &cleared);
        true
    }

    fn selected_editable(&self) -> Option<&ArenaObject> {
        if self.mode != SessionMode::Configuring {
            return None;
        }
        self.arena
            .get(self.selected?)
            .filter(|o| o.role == ObjectRole::Editable)
    }

    fn selected_editable_mut(&mut self) -> Option<&mut ArenaObject> {
        if self.mode != SessionMode::Configuring {
            return None;
        }
        self.arena
            .get_mut(self.selected?)
            .filter(|o| o.role == ObjectRole::Editable)
    }

    // ----- hosting -------------------------------------------------------

    /// Host the placed anchor with its bins.
    pub fn host(&mut self) -> bool {
        if self.mode != SessionMode::Configuring {
            return false;
        }
        let Some(key) = self.local_anchor.as_ref().filter(|l| l.ready).map(|l| l.key) else {
            debug!("nothing ready to host");
            return false;
        };
        let objects = self
            .arena
            .iter()
            .filter(|(_, o)| o.owner == AnchorRef::Local(key))
            .map(|(id, _)| id)
            .collect();
        match self.tracker.submit_hosting(
            &mut self.platform,
            key,
            self.config.hosting_days,
            objects,
            self.tick,
        ) {
            Ok(_) => {
                self.selected = None;
                for button in [
                    Button::Host,
                    Button::Place,
                    Button::AddObject,
                    Button::RemoveObject,
                    Button::NewAnchor,
                ] {
                    self.ui.set_button_enabled(button, false);
                }
                true
            }
            Err(err) => {
                warn!(%err, anchor = %key, "hosting request refused");
                false
            }
        }
    }

    /// Persist the edited bins of the expanded anchor on the next tick.
    pub fn store_anchor_update(&mut self) -> bool {
        if self.mode != SessionMode::Configuring {
            return false;
        }
        let Some(handle) = self.expanded else {
            return false;
        };
        if !self.pending_updates.contains(&handle) {
            self.pending_updates.push(handle);
        }
        for button in [Button::Host, Button::Place, Button::AddObject, Button::RemoveObject] {
            self.ui.set_button_enabled(button, false);
        }
        true
    }

    // ----- visualization -------------------------------------------------

    /// The picker took one unit from bin `id`.
    pub fn mark_fetched(&mut self, id: ObjectId) -> bool {
        if self.mode != SessionMode::Visualizing {
            return false;
        }
        let Some(object) = self
            .arena
            .get(id)
            .filter(|o| o.role == ObjectRole::Resolved && o.visible)
        else {
            return false;
        };
        let reference = object.reference().to_string();
        match self.fetch.fetch(&reference) {
            FetchOutcome::NotListed => {
                debug!(object = %id, %reference, "piece not on the list");
                return false;
            }
            FetchOutcome::Picked { remaining } => debug!(%reference, remaining, "piece picked"),
            FetchOutcome::Completed => info!(%reference, "piece complete"),
        }

        let (done, total) = self.fetch.progress();
        self.ui.set_fetch_progress(done, total);
        self.refresh_visibility();
        if self.fetch.is_complete() {
            self.ui.set_end_of_kit(true);
            if !self
                .scheduler
                .contains(|t| *t == SessionTask::ReturnToScanning)
            {
                self.scheduler.schedule_after(
                    self.tick,
                    self.config.kit_complete_delay_ticks(),
                    SessionTask::ReturnToScanning,
                );
            }
            info!(pieces = total, "kit complete");
        }
        true
    }

    fn is_shown(&self, reference: &str) -> bool {
        self.mode == SessionMode::Visualizing && self.fetch.should_show(reference)
    }

    fn refresh_visibility(&mut self) {
        let visualizing = self.mode == SessionMode::Visualizing;
        let fetch = &self.fetch;
        for (_, object) in self.arena.iter_mut() {
            if object.role == ObjectRole::Resolved {
                object.visible = visualizing && fetch.should_show(object.reference());
            }
        }
    }

    // ----- scenarios -----------------------------------------------------

    /// Stored scenario names.
    pub fn list_scenarios(&self) -> Vec<String> {
        self.store.list_scenarios().unwrap_or_else(|err| {
            warn!(%err, "failed to list scenarios");
            Vec::new()
        })
    }

    /// Add a scenario name. False if it exists or storage failed.
    pub fn add_scenario(&mut self, name: &str) -> bool {
        self.store.add_scenario(name).unwrap_or_else(|err| {
            warn!(%err, scenario = %name, "failed to add scenario");
            false
        })
    }

    /// Remove a scenario name.
    pub fn remove_scenario(&mut self, name: &str) -> bool {
        self.store.remove_scenario(name).unwrap_or_else(|err| {
            warn!(%err, scenario = %name, "failed to remove scenario");
            false
        })
    }

    /// Delete every stored anchor of a scenario.
    pub fn clear_scenario(&mut self, name: &str) -> usize {
        self.store.clear_scenario(name).unwrap_or_else(|err| {
            warn!(%err, scenario = %name, "failed to clear scenario");
            0
        })
    }

    /// Stored anchors of a scenario, newest first.
    pub fn stored_records(&mut self, scenario: &str) -> Vec<AnchorRecord> {
        self.store.records_for_scenario(scenario).unwrap_or_else(|err| {
            warn!(%err, %scenario, "failed to read stored anchors");
            Vec::new()
        })
    }

    // ----- accessors -----------------------------------------------------

    /// Current mode.
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Current scenario.
    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    /// Ticks run so far.
    pub fn current_tick(&self) -> SimTick {
        self.tick
    }

    /// Selected bin.
    pub fn selected(&self) -> Option<ObjectId> {
        self.selected
    }

    /// Live bins.
    pub fn arena(&self) -> &ObjectArena {
        &self.arena
    }

    /// One live bin.
    pub fn object(&self, id: ObjectId) -> Option<&ArenaObject> {
        self.arena.get(id)
    }

    /// Anchor placed and not hosted yet.
    pub fn local_anchor(&self) -> Option<&LocalAnchor> {
        self.local_anchor.as_ref()
    }

    /// Anchors offered for editing.
    pub fn configuration_anchors(&self) -> &BTreeMap<CloudHandle, ConfigurationAnchor> {
        &self.configuration_anchors
    }

    /// Anchor currently expanded for editing.
    pub fn expanded_anchor(&self) -> Option<CloudHandle> {
        self.expanded
    }

    /// Placement candidate under the screen center.
    pub fn indicator(&self) -> Option<&PlaneHit> {
        self.indicator.as_ref()
    }

    /// Quality gate state.
    pub fn gate(&self) -> &AnchorQualityGate {
        &self.gate
    }

    /// In-flight platform requests.
    pub fn tracker(&self) -> &AnchorLifecycleTracker {
        &self.tracker
    }

    /// Kit list.
    pub fn fetch_list(&self) -> &FetchList {
        &self.fetch
    }

    /// Guidance computed on the last tick.
    pub fn guidance(&self) -> Option<Guidance> {
        self.guidance
    }

    /// Edit mode.
    pub fn edit_mode(&self) -> EditMode {
        self.edit_mode
    }

    /// Twist axis.
    pub fn rotation_axis(&self) -> RotationAxis {
        self.rotation_axis
    }

    /// History store.
    pub fn store(&mut self) -> &mut AnchorHistoryStore<S, C> {
        &mut self.store
    }

    /// Platform.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Mutable platform, for drivers that script it.
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// UI sink.
    pub fn ui(&self) -> &U {
        &self.ui
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use kitting_anchors::{CloudAnchorState, FeatureMapQuality, PlaneAlignment, PlatformError};
    use kitting_core::PlaneId;
    use kitting_storage::{MemoryStore, StoreConfig};
    use std::collections::HashMap;

    struct FixedClock;

    impl Clock for FixedClock {
        fn now(&self) -> NaiveDateTime {
            NaiveDate::from_ymd_opt(2025, 3, 1)
                .and_then(|d| d.and_hms_opt(9, 30, 0))
                .unwrap()
        }
    }

    /// Platform where every cloud request ends in `outcome` on the next poll.
    struct FakePlatform {
        next: u64,
        outcome: CloudAnchorState,
        anchors: HashMap<AnchorKey, Pose>,
        cloud: HashMap<CloudHandle, (String, Pose)>,
    }

    impl FakePlatform {
        fn new(outcome: CloudAnchorState) -> Self {
            Self {
                next: 0,
                outcome,
                anchors: HashMap::new(),
                cloud: HashMap::new(),
            }
        }

        fn bump(&mut self) -> u64 {
            self.next += 1;
            self.next
        }
    }

    impl ArPlatform for FakePlatform {
        fn raycast_planes(&self, _screen_point: Vec2) -> Option<PlaneHit> {
            Some(PlaneHit {
                plane: PlaneId(1),
                pose: Pose::new(Vec3::new(0.0, 0.0, 2.0), glam::Quat::IDENTITY),
                alignment: PlaneAlignment::HorizontalUp,
            })
        }

        fn attach_anchor(&mut self, _plane: PlaneId, pose: Pose) -> Result<AnchorKey, PlatformError> {
            let key = AnchorKey(self.bump());
            self.anchors.insert(key, pose);
            Ok(key)
        }

        fn anchor_pose(&self, anchor: AnchorKey) -> Option<Pose> {
            self.anchors.get(&anchor).copied()
        }

        fn remove_anchor(&mut self, anchor: AnchorKey) {
            self.anchors.remove(&anchor);
        }

        fn host_cloud_anchor(&mut self, anchor: AnchorKey, _ttl_days: u32) -> Result<CloudHandle, PlatformError> {
            let pose = self
                .anchors
                .get(&anchor)
                .copied()
                .ok_or(PlatformError::UnknownAnchor(anchor))?;
            let handle = CloudHandle(self.bump());
            self.cloud.insert(handle, (format!("cloud-{}", handle.0), pose));
            Ok(handle)
        }

        fn resolve_cloud_anchor(&mut self, cloud_anchor_id: &str) -> Result<CloudHandle, PlatformError> {
            let handle = CloudHandle(self.bump());
            self.cloud.insert(handle, (cloud_anchor_id.to_string(), Pose::IDENTITY));
            Ok(handle)
        }

        fn cloud_anchor_state(&self, handle: CloudHandle) -> CloudAnchorState {
            if self.cloud.contains_key(&handle) {
                self.outcome
            } else {
                CloudAnchorState::None
            }
        }

        fn cloud_anchor_id(&self, handle: CloudHandle) -> Option<String> {
            self.cloud.get(&handle).map(|(id, _)| id.clone())
        }

        fn cloud_anchor_pose(&self, handle: CloudHandle) -> Option<Pose> {
            self.cloud.get(&handle).map(|(_, pose)| *pose)
        }

        fn estimate_feature_map_quality(&self, _camera: &Pose) -> FeatureMapQuality {
            FeatureMapQuality::Good
        }
    }

    #[derive(Default)]
    struct Ui {
        help: Vec<String>,
        buttons: HashMap<Button, bool>,
        highlights: Vec<(String, String)>,
        end_of_kit: bool,
        progress: (usize, usize),
    }

    impl UiSink for Ui {
        fn set_help_text(&mut self, text: &str) {
            self.help.push(text.to_string());
        }

        fn set_button_enabled(&mut self, button: Button, enabled: bool) {
            self.buttons.insert(button, enabled);
        }

        fn set_dropdown_highlight(&mut self, highlighted: &str, cleared: &str) {
            self.highlights.push((highlighted.to_string(), cleared.to_string()));
        }

        fn set_fetch_progress(&mut self, fetched: usize, total: usize) {
            self.progress = (fetched, total);
        }

        fn set_end_of_kit(&mut self, visible: bool) {
            self.end_of_kit = visible;
        }
    }

    type Session = SessionController<FakePlatform, MemoryStore, FixedClock, Ui>;

    fn session(outcome: CloudAnchorState) -> Session {
        let quality = QualityGateConfig {
            good_required: 1,
            ..QualityGateConfig::default()
        };
        SessionController::new(
            FakePlatform::new(outcome),
            AnchorHistoryStore::new(MemoryStore::new(), FixedClock, StoreConfig::default()),
            Ui::default(),
            SessionConfig::default(),
            quality,
        )
    }

    fn run(session: &mut Session, ticks: usize) {
        let camera = ArCamera::default();
        for _ in 0..ticks {
            session.tick(&camera);
        }
    }

    fn ready_session(outcome: CloudAnchorState) -> Session {
        let mut s = session(outcome);
        assert!(s.enter_configuration("Line3"));
        run(&mut s, 1);
        assert!(s.place_anchor());
        run(&mut s, 50);
        s
    }

    fn editable(s: &Session) -> Vec<ObjectId> {
        s.arena().ids_with(ObjectRole::Editable)
    }

    #[test]
    fn placement_gates_then_instantiates_after_delay() {
        let mut s = session(CloudAnchorState::Success);
        s.enter_configuration("Line3");
        run(&mut s, 1);
        assert!(s.indicator().is_some());
        assert!(s.place_anchor());
        assert_eq!(s.local_anchor().map(|l| l.markers.len()), Some(4));

        run(&mut s, 1);
        assert!(!s.local_anchor().is_some_and(|l| l.gating));
        assert!(editable(&s).is_empty());

        run(&mut s, 44);
        assert!(editable(&s).is_empty());
        run(&mut s, 1);
        assert_eq!(editable(&s).len(), 1);
        assert!(s.local_anchor().is_some_and(|l| l.ready && l.markers.is_empty()));
        assert_eq!(s.ui().buttons.get(&Button::Host), Some(&true));
    }

    #[test]
    fn add_copies_selection_and_remove_clears_highlight() {
        let mut s = ready_session(CloudAnchorState::Success);
        let first = editable(&s)[0];
        assert!(s.select_object(first));
        assert!(s.translate(Vec3::new(0.5, 0.0, 0.0)));
        assert!(s.assign_piece(PieceInfo::new("REF1", "Bolt", "A1")));

        let copy = s.add_object().expect("copy");
        let original = s.object(first).expect("first").clone();
        let copied = s.object(copy).expect("copy");
        assert_eq!(copied.pose, original.pose);
        assert_eq!(copied.piece, None);
        assert_eq!(copied.history.entries().len(), original.history.entries().len() + 1);

        assert!(s.remove_selected());
        assert!(!s.arena().contains(first));
        assert_eq!(
            s.ui().highlights,
            vec![("REF1".to_string(), String::new()), (String::new(), "REF1".to_string())]
        );
    }

    #[test]
    fn twist_amends_open_segment_and_axis_switch_opens_one() {
        let mut s = ready_session(CloudAnchorState::Success);
        let id = editable(&s)[0];
        s.select_object(id);
        s.set_rotation_axis(RotationAxis::Z);
        assert!(s.twist(10.0));
        assert!(s.twist(5.0));
        let entries = s.object(id).expect("object").history.entries().to_vec();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2], Euler3::new(0.0, 0.0, -15.0));

        s.set_edit_mode(EditMode::Scale);
        assert!(!s.twist(10.0));
        assert!(s.scale_by(2.0));
        assert_eq!(s.object(id).expect("object").scale, Vec3::splat(2.0));
    }

    #[test]
    fn hosting_persists_relative_records() {
        let mut s = ready_session(CloudAnchorState::Success);
        let first = editable(&s)[0];
        s.select_object(first);
        s.assign_piece(PieceInfo::new("REF1", "Bolt", "A1"));
        s.deselect();
        let second = s.add_object().expect("second");
        s.select_object(second);
        s.translate(Vec3::new(1.0, 0.0, 0.0));

        assert!(s.host());
        run(&mut s, 1);

        let records = s.stored_records("Line3");
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.name, "CloudAnchor0");
        assert_eq!(record.serialized_time, "03/01/2025 09:30:00");
        assert_eq!(record.objects.len(), 2);
        assert_eq!(record.objects[0].piece_info.reference, "REF1");
        assert!(record.objects[0].local_position().length() < 1e-5);
        assert!((record.objects[1].local_position() - Vec3::X).length() < 1e-5);

        assert!(editable(&s).is_empty());
        assert!(s.local_anchor().is_none());
        assert_eq!(s.configuration_anchors().len(), 1);
        assert_eq!(s.ui().help.last().map(String::as_str), Some(HOST_SUCCEEDED_TEXT));
    }

    #[test]
    fn hosting_failure_is_reported_and_recoverable() {
        let mut s = ready_session(CloudAnchorState::ErrorHostingServiceUnavailable);
        assert!(s.host());
        run(&mut s, 1);
        assert_eq!(
            s.ui().help.last().map(String::as_str),
            Some("Host failed - ErrorHostingServiceUnavailable")
        );
        assert!(s.stored_records("Line3").is_empty());
        assert_eq!(editable(&s).len(), 1);
        assert!(s.host());
    }

    #[test]
    fn modes_require_leaving_first() {
        let mut s = session(CloudAnchorState::Success);
        assert!(s.enter_visualization("Line3"));
        assert!(!s.enter_configuration("Line3"));
        assert!(s.kit_identified([("REF1", 1)]));
        assert_eq!(s.mode(), SessionMode::Visualizing);
        assert!(!s.kit_identified([("REF2", 1)]));
        s.back();
        assert_eq!(s.mode(), SessionMode::None);
        assert!(s.enter_configuration("Line3"));
    }

    #[test]
    fn editing_needs_configuration_mode() {
        let mut s = session(CloudAnchorState::Success);
        assert!(s.add_object().is_none());
        assert!(!s.host());
        assert!(!s.place_anchor());
        assert!(!s.tap(Vec2::splat(0.5)));
    }
}
