//! Live objects addressed by stable ids.

use std::collections::BTreeMap;

use glam::Vec3;
use kitting_core::{AnchorKey, AttachedObjectRecord, CloudHandle, ObjectId, PieceInfo};
use kitting_transform::{to_local, to_world, Pose, RotationHistory};

/// Anchor an object hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnchorRef {
    /// Local anchor not hosted yet.
    Local(AnchorKey),
    /// Hosted or resolved cloud anchor.
    Cloud(CloudHandle),
}

/// What an object is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectRole {
    /// Editable bin of the anchor being configured.
    Editable,
    /// Read-only bin shown to a picker.
    Resolved,
}

/// One placed bin.
#[derive(Debug, Clone, PartialEq)]
pub struct ArenaObject {
    /// World pose.
    pub pose: Pose,
    /// Scale.
    pub scale: Vec3,
    /// Rotation history since creation.
    pub history: RotationHistory,
    /// Assigned piece, if any.
    pub piece: Option<PieceInfo>,
    /// Owning anchor.
    pub owner: AnchorRef,
    /// Whether the bin is shown.
    pub visible: bool,
    /// Editable or resolved.
    pub role: ObjectRole,
}

impl ArenaObject {
    /// Fresh editable bin at `anchor_pose`.
    pub fn at_anchor(anchor_pose: Pose, owner: AnchorRef) -> Self {
        Self {
            pose: anchor_pose,
            scale: Vec3::ONE,
            history: RotationHistory::seeded(anchor_pose.euler_degrees()),
            piece: None,
            owner,
            visible: true,
            role: ObjectRole::Editable,
        }
    }

    /// Duplicate of `self` with a fresh rotation segment and no piece.
    pub fn copy(&self) -> Self {
        Self {
            history: self.history.forked(),
            piece: None,
            ..self.clone()
        }
    }

    /// Rebuild a stored bin against the anchor's live pose.
    ///
    /// The object starts at the anchor pose, moves by the stored local
    /// position in that frame, then replays its rotation steps. Editable
    /// copies get a fresh rotation segment.
    pub fn from_record(
        record: &AttachedObjectRecord,
        anchor_pose: &Pose,
        owner: AnchorRef,
        role: ObjectRole,
    ) -> Self {
        let position = to_world(anchor_pose, record.local_position());
        let mut history = RotationHistory::from_entries(record.rotations.clone());
        let rotation = history.replay_from(anchor_pose.rotation);
        if role == ObjectRole::Editable {
            history.begin_segment();
        }
        Self {
            pose: Pose::new(position, rotation),
            scale: record.scale(),
            history,
            piece: Some(record.piece_info.clone()).filter(PieceInfo::is_configured),
            owner,
            visible: true,
            role,
        }
    }

    /// Persistable form relative to `anchor_pose`.
    pub fn to_record(&self, anchor_pose: &Pose) -> AttachedObjectRecord {
        AttachedObjectRecord::new_box(
            to_local(anchor_pose, self.pose.position),
            self.history.entries().to_vec(),
            self.scale,
            self.piece.clone().unwrap_or_default(),
        )
    }

    /// Piece reference, empty when unconfigured.
    pub fn reference(&self) -> &str {
        self.piece.as_ref().map_or("", |p| p.reference.as_str())
    }
}

/// Arena of live objects.
#[derive(Debug, Clone, Default)]
pub struct ObjectArena {
    objects: BTreeMap<ObjectId, ArenaObject>,
    next_id: u32,
}

impl ObjectArena {
    /// Empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `object`, returning its id. Ids are never reused.
    pub fn insert(&mut self, object: ArenaObject) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.objects.insert(id, object);
        id
    }

    /// Object by id.
    pub fn get(&self, id: ObjectId) -> Option<&ArenaObject> {
        self.objects.get(&id)
    }

    /// Mutable object by id.
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut ArenaObject> {
        self.objects.get_mut(&id)
    }

    /// Remove an object.
    pub fn remove(&mut self, id: ObjectId) -> Option<ArenaObject> {
        self.objects.remove(&id)
    }

    /// Whether `id` is live.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    /// Objects in id order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &ArenaObject)> {
        self.objects.iter().map(|(id, o)| (*id, o))
    }

    /// Mutable objects in id order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ObjectId, &mut ArenaObject)> {
        self.objects.iter_mut().map(|(id, o)| (*id, o))
    }

    /// Ids of objects with `role`.
    pub fn ids_with(&self, role: ObjectRole) -> Vec<ObjectId> {
        self.iter()
            .filter(|(_, o)| o.role == role)
            .map(|(id, _)| id)
            .collect()
    }

    /// Drop every object with `role`, returning how many went.
    pub fn remove_role(&mut self, role: ObjectRole) -> usize {
        let before = self.objects.len();
        self.objects.retain(|_, o| o.role != role);
        before - self.objects.len()
    }

    /// Drop every object hanging off `owner`, returning how many went.
    pub fn remove_owned(&mut self, owner: AnchorRef) -> usize {
        let before = self.objects.len();
        self.objects.retain(|_, o| o.owner != owner);
        before - self.objects.len()
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Drop everything. Ids keep counting up.
    pub fn clear(&mut self) {
        self.objects.clear();
    }
}
