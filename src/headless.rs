//! Scripted end-to-end session against the simulated platform.
//!
//! Configures one anchor (place, scan the cube walls, add and label bins,
//! host), then restarts the simulated device and visualizes the scenario
//! (resolve, identify the kit, fetch every piece).

use crate::config::KittingConfig;
use anyhow::{bail, Context, Result};
use glam::{Quat, Vec3};
use kitting_anchors::{FeatureMapQuality, PlaneAlignment, QualityMarker};
use kitting_camera::ArCamera;
use kitting_core::{Clock, PieceInfo, PlaneId};
use kitting_session::{ObjectRole, SessionController, SessionMode};
use kitting_storage::{AnchorHistoryStore, KeyValueStore};
use kitting_testkit::{EventRecord, JsonlSink, RecordingUi, SimulatedPlatform};
use kitting_transform::Pose;
use std::path::PathBuf;
use tracing::{info, warn};

type Session<S, C> = SessionController<SimulatedPlatform, S, C, RecordingUi>;

/// Distance kept from a wall while scanning it.
const SCAN_DISTANCE: f32 = 0.8;

pub struct HeadlessConfig {
    pub config: KittingConfig,
    pub scenario: String,
    pub event_log: Option<PathBuf>,
    pub max_ticks: u64,
    /// Ticks a simulated cloud request stays in flight.
    pub latency_ticks: u32,
}

/// What the scripted run achieved.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessSummary {
    pub hosted: Vec<String>,
    pub restored_objects: usize,
    pub fetched: usize,
    pub ticks: u64,
}

struct EventLog {
    sink: Option<JsonlSink>,
}

impl EventLog {
    fn record<S, C>(&mut self, session: &Session<S, C>, kind: &str, payload: &str)
    where
        S: KeyValueStore,
        C: Clock,
    {
        info!(tick = session.current_tick().0, kind, payload, "session event");
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        let event = EventRecord {
            tick: session.current_tick(),
            mode: mode_label(session.mode()),
            kind,
            payload,
        };
        if let Err(err) = sink.write(&event) {
            warn!(%err, kind, "failed to write event");
        }
    }
}

fn mode_label(mode: SessionMode) -> &'static str {
    match mode {
        SessionMode::None => "none",
        SessionMode::Configuring => "configuring",
        SessionMode::Scanning => "scanning",
        SessionMode::Visualizing => "visualizing",
    }
}

/// Run the scripted session on `store`.
pub fn run<S, C>(cfg: HeadlessConfig, store: AnchorHistoryStore<S, C>) -> Result<HeadlessSummary>
where
    S: KeyValueStore,
    C: Clock,
{
    let sink = match cfg.event_log.as_deref() {
        Some(path) => Some(JsonlSink::create(path)?),
        None => None,
    };
    let mut log = EventLog { sink };

    let mut platform = SimulatedPlatform::new();
    platform.set_latency(cfg.latency_ticks);
    platform.set_surface(
        PlaneId(1),
        Pose::new(Vec3::new(0.0, 0.0, 1.5), Quat::IDENTITY),
        PlaneAlignment::HorizontalUp,
    );
    platform.set_quality(FeatureMapQuality::Good);

    let mut session = SessionController::new(
        platform,
        store,
        RecordingUi::new(),
        cfg.config.session.clone(),
        cfg.config.quality.clone(),
    );
    let budget = cfg.max_ticks;

    let hosted = configure(&mut session, &cfg.scenario, budget, &mut log)?;

    session.back();
    let shift = Pose::new(
        Vec3::new(0.25, 0.0, -0.1),
        Quat::from_rotation_y(10f32.to_radians()),
    );
    session.platform_mut().restart(shift);
    log.record(&session, "restart", "device relocalized");

    let (restored_objects, fetched) = visualize(&mut session, &cfg.scenario, budget, &mut log)?;
    session.back();

    Ok(HeadlessSummary {
        hosted,
        restored_objects,
        fetched,
        ticks: session.current_tick().0,
    })
}

fn configure<S, C>(
    session: &mut Session<S, C>,
    scenario: &str,
    budget: u64,
    log: &mut EventLog,
) -> Result<Vec<String>>
where
    S: KeyValueStore,
    C: Clock,
{
    if session.add_scenario(scenario) {
        log.record(session, "scenario added", scenario);
    }
    if !session.enter_configuration(scenario) {
        bail!("could not enter configuration for scenario '{scenario}'");
    }
    log.record(session, "mode", scenario);

    let overview = ArCamera::looking_at(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 0.0, 1.5));
    run_until(session, budget, |_| overview, |s| s.indicator().is_some())
        .context("no surface found")?;
    if !session.place_anchor() {
        bail!("anchor placement failed");
    }
    log.record(session, "placed", session.ui().last_help());

    let markers = session
        .local_anchor()
        .map(|l| l.markers.clone())
        .unwrap_or_default();
    run_until(
        session,
        budget,
        |tick| wall_camera(&markers, tick),
        |s| s.local_anchor().is_some_and(|l| !l.gating),
    )
    .context("anchor quality never converged")?;
    log.record(session, "converged", session.ui().last_help());

    run_until(session, budget, |_| overview, |s| s.local_anchor().is_some_and(|l| l.ready))
        .context("first object never appeared")?;
    let first = session
        .arena()
        .ids_with(ObjectRole::Editable)
        .first()
        .copied()
        .context("first object missing")?;

    session.select_object(first);
    session.assign_piece(PieceInfo::new("REF1", "Bolt M6", "A1"));
    let second = session.add_object().context("add object refused")?;
    session.select_object(second);
    session.translate(Vec3::new(0.3, 0.0, 0.0));
    session.twist(45.0);
    session.assign_piece(PieceInfo::new("REF2", "Washer", "A2"));
    session.deselect();
    log.record(session, "edited", &format!("{} objects", session.arena().len()));

    let known: Vec<String> = cloud_ids(session);
    if !session.host() {
        bail!("hosting was refused");
    }
    log.record(session, "hosting", "submitted");
    run_until(
        session,
        budget,
        |_| overview,
        |s| s.configuration_anchors().len() > known.len() || !s.tracker().has_pending(),
    )
    .context("hosting never finished")?;

    let hosted: Vec<String> = cloud_ids(session)
        .into_iter()
        .filter(|id| !known.contains(id))
        .collect();
    if hosted.is_empty() {
        bail!("hosting failed: {}", session.ui().last_help());
    }
    log.record(session, "hosted", &hosted.join(","));
    Ok(hosted)
}

fn visualize<S, C>(
    session: &mut Session<S, C>,
    scenario: &str,
    budget: u64,
    log: &mut EventLog,
) -> Result<(usize, usize)>
where
    S: KeyValueStore,
    C: Clock,
{
    if !session.enter_visualization(scenario) {
        bail!("could not enter visualization for scenario '{scenario}'");
    }
    log.record(session, "mode", scenario);

    let overview = ArCamera::looking_at(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 0.0, 1.5));
    run_until(session, budget, |_| overview, |s| !s.tracker().has_pending())
        .context("resolving never finished")?;
    let restored = session.arena().ids_with(ObjectRole::Resolved);
    log.record(session, "resolved", &format!("{} objects", restored.len()));
    if restored.is_empty() {
        bail!("nothing was restored: {}", session.ui().last_help());
    }

    let pieces: Vec<(String, u32)> = restored
        .iter()
        .filter_map(|id| session.object(*id))
        .map(|o| o.reference().to_string())
        .filter(|r| !r.is_empty())
        .map(|r| (r, 1))
        .collect();
    session.kit_identified(pieces);
    log.record(session, "kit", &format!("{} pieces", session.fetch_list().items().len()));

    let mut fetched = 0;
    loop {
        run_until(session, budget, |_| overview, |_| true)?;
        if session.mode() != SessionMode::Visualizing {
            break;
        }
        let Some(target) = session.guidance().map(|g| g.target) else {
            break;
        };
        if !session.mark_fetched(target) {
            break;
        }
        fetched += 1;
    }
    log.record(session, "fetched", &fetched.to_string());

    run_until(session, budget, |_| overview, |s| s.mode() == SessionMode::Scanning)
        .context("kit never completed")?;
    log.record(session, "kit complete", "");
    Ok((restored.len(), fetched))
}

fn cloud_ids<S, C>(session: &Session<S, C>) -> Vec<String>
where
    S: KeyValueStore,
    C: Clock,
{
    session
        .configuration_anchors()
        .values()
        .map(|a| a.record.cloud_anchor_id.clone())
        .collect()
}

/// Camera squarely in front of one wall, cycling through the walls by tick.
fn wall_camera(markers: &[QualityMarker], tick: u64) -> ArCamera {
    if markers.is_empty() {
        return ArCamera::default();
    }
    let marker = markers[(tick as usize) % markers.len()];
    let facing = Quat::from_rotation_y(marker.yaw_degrees.to_radians()) * Vec3::Z;
    ArCamera::looking_at(marker.position - facing * SCAN_DISTANCE, marker.position)
}

/// Step the platform and tick until `done` holds, at most `budget` ticks.
fn run_until<S, C, F, D>(
    session: &mut Session<S, C>,
    budget: u64,
    mut camera: F,
    done: D,
) -> Result<u64>
where
    S: KeyValueStore,
    C: Clock,
    F: FnMut(u64) -> ArCamera,
    D: Fn(&Session<S, C>) -> bool,
{
    for step in 0..budget.max(1) {
        session.platform_mut().step();
        session.tick(&camera(step));
        if done(session) {
            return Ok(step + 1);
        }
    }
    bail!("gave up after {budget} ticks")
}
