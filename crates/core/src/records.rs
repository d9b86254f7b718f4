//! Persisted anchor history records.
//!
//! Field names are pinned with `serde(rename)` because the blob layout is shared
//! with previously written data: `{"Collection": [...], "dropdownScenarios": [...]}`.

use chrono::NaiveDateTime;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Kind label written for every placeable bin.
pub const BOX_KIND: &str = "Box";

/// Date-time layout of `SerializedTime` (month/day/year, 24h clock).
pub const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// Format a creation time the way it is persisted.
pub fn format_timestamp(time: NaiveDateTime) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// 12-hour layout written by en-US locales, e.g. `3/1/2025 9:30:00 AM`.
const TIMESTAMP_FORMAT_12H: &str = "%m/%d/%Y %I:%M:%S %p";

/// Parse a persisted creation time.
///
/// Accepts the 24h layout and the 12-hour AM/PM layout; numeric fields may
/// be unpadded.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    [TIMESTAMP_FORMAT, TIMESTAMP_FORMAT_12H]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}

/// Physical part associated with a placed bin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PieceInfo {
    /// Unique part reference used to match fetch lists.
    #[serde(rename = "Reference", default)]
    pub reference: String,
    /// Human-readable part name.
    #[serde(rename = "Name", default)]
    pub name: String,
    /// Warehouse localization code.
    #[serde(rename = "Localization", default)]
    pub localization: String,
}

impl PieceInfo {
    /// Create piece info from its three fields.
    pub fn new(
        reference: impl Into<String>,
        name: impl Into<String>,
        localization: impl Into<String>,
    ) -> Self {
        Self {
            reference: reference.into(),
            name: name.into(),
            localization: localization.into(),
        }
    }

    /// The "unconfigured" marker value.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when a reference has been assigned.
    pub fn is_configured(&self) -> bool {
        !self.reference.is_empty()
    }

    /// Three-line label shown on a bin.
    pub fn label(&self) -> String {
        format!("{}\n{}\n{}", self.reference, self.name, self.localization)
    }
}

/// Euler angles in degrees, serialized as `{"x":..,"y":..,"z":..}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Euler3 {
    /// Rotation about X (pitch).
    pub x: f32,
    /// Rotation about Y (yaw).
    pub y: f32,
    /// Rotation about Z (roll).
    pub z: f32,
}

impl Euler3 {
    /// Zero rotation.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Create from components in degrees.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Component-wise view as a glam vector.
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

impl From<Vec3> for Euler3 {
    fn from(v: Vec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<Euler3> for Vec3 {
    fn from(e: Euler3) -> Self {
        e.to_vec3()
    }
}

impl std::ops::Add for Euler3 {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

/// An object placed under an anchor, expressed in the anchor's local frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachedObjectRecord {
    /// Placeable kind; only [`BOX_KIND`] today.
    #[serde(rename = "Prefab_name")]
    pub kind: String,
    /// Anchor-local X.
    #[serde(rename = "X")]
    pub x: f32,
    /// Anchor-local Y.
    #[serde(rename = "Y")]
    pub y: f32,
    /// Anchor-local Z.
    #[serde(rename = "Z")]
    pub z: f32,
    /// Rotation history: entry 0 is the creation orientation, later entries are
    /// incremental rotations replayed in order.
    #[serde(rename = "Rotations", default)]
    pub rotations: Vec<Euler3>,
    /// Scale along X.
    #[serde(rename = "Scale_X")]
    pub scale_x: f32,
    /// Scale along Y.
    #[serde(rename = "Scale_Y")]
    pub scale_y: f32,
    /// Scale along Z.
    #[serde(rename = "Scale_Z")]
    pub scale_z: f32,
    /// Associated part; empty reference means unconfigured.
    #[serde(rename = "PieceInfo", default)]
    pub piece_info: PieceInfo,
}

impl AttachedObjectRecord {
    /// Build a bin record from its anchor-local position, history, scale and piece.
    pub fn new_box(
        local_position: Vec3,
        rotations: Vec<Euler3>,
        scale: Vec3,
        piece_info: PieceInfo,
    ) -> Self {
        Self {
            kind: BOX_KIND.to_string(),
            x: local_position.x,
            y: local_position.y,
            z: local_position.z,
            rotations,
            scale_x: scale.x,
            scale_y: scale.y,
            scale_z: scale.z,
            piece_info,
        }
    }

    /// Anchor-local position.
    pub fn local_position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    /// Scale vector.
    pub fn scale(&self) -> Vec3 {
        Vec3::new(self.scale_x, self.scale_y, self.scale_z)
    }
}

/// A hosted cloud anchor with the objects placed around it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorRecord {
    /// Generated display name (`CloudAnchor<n>`).
    #[serde(rename = "Name")]
    pub name: String,
    /// Opaque cloud anchor id returned by the platform.
    #[serde(rename = "Id")]
    pub cloud_anchor_id: String,
    /// Creation time in [`TIMESTAMP_FORMAT`].
    #[serde(rename = "SerializedTime")]
    pub serialized_time: String,
    /// Scenario (kitting station) the anchor belongs to.
    #[serde(rename = "scenarioName")]
    pub scenario_name: String,
    /// Objects attached to the anchor.
    #[serde(rename = "listOfAnchoredObjects", default)]
    pub objects: Vec<AttachedObjectRecord>,
}

impl AnchorRecord {
    /// Build a record created at `created`.
    pub fn new(
        name: impl Into<String>,
        cloud_anchor_id: impl Into<String>,
        created: NaiveDateTime,
        scenario_name: impl Into<String>,
        objects: Vec<AttachedObjectRecord>,
    ) -> Self {
        Self {
            name: name.into(),
            cloud_anchor_id: cloud_anchor_id.into(),
            serialized_time: format_timestamp(created),
            scenario_name: scenario_name.into(),
            objects,
        }
    }

    /// Display name for the `index`-th stored anchor.
    pub fn sequential_name(index: usize) -> String {
        format!("CloudAnchor{index}")
    }

    /// Parsed creation time, `None` if the stored string is malformed.
    pub fn created_time(&self) -> Option<NaiveDateTime> {
        parse_timestamp(&self.serialized_time)
    }
}

/// The single persisted aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnchorHistoryCollection {
    /// Records, newest first.
    #[serde(rename = "Collection", default)]
    pub records: Vec<AnchorRecord>,
    /// Scenario names in insertion order.
    #[serde(rename = "dropdownScenarios", default)]
    pub scenarios: Vec<String>,
}

impl AnchorHistoryCollection {
    /// Sort newest-first by creation time; stable for equal times.
    ///
    /// Records with an unreadable timestamp sort last.
    pub fn sort_newest_first(&mut self) {
        self.records
            .sort_by(|left, right| right.created_time().cmp(&left.created_time()));
    }

    /// Records stored for `scenario`, in collection order.
    pub fn records_for_scenario<'a>(
        &'a self,
        scenario: &'a str,
    ) -> impl Iterator<Item = &'a AnchorRecord> + 'a {
        self.records
            .iter()
            .filter(move |record| record.scenario_name == scenario)
    }

    /// Find a record by cloud anchor id.
    pub fn find(&self, cloud_anchor_id: &str) -> Option<&AnchorRecord> {
        self.records
            .iter()
            .find(|record| record.cloud_anchor_id == cloud_anchor_id)
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no record is stored.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
