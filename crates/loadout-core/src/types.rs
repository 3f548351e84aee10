//! Core types used throughout the Loadout workspace

use std::fmt;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one running simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Network id of a combatant
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CombatantId(pub u32);

impl fmt::Display for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "combatant#{}", self.0)
    }
}

/// Network id of a single item instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub u32);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item#{}", self.0)
    }
}

/// Connection-level id of an observer (a remote client or the host's own view)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObserverId(pub u32);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer#{}", self.0)
    }
}

/// The kind of an inventory slot, and the kind of slot an item requires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotKind {
    /// Primary weapon slots; can be selected while empty
    Normal,
    /// Extra slots for grenades and gadgets; not selectable while empty
    PocketItem,
}

impl SlotKind {
    /// Display name
    pub fn name(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::PocketItem => "Pocket",
        }
    }
}

/// Descriptor of a pickup-able/droppable object
///
/// `name` is the identity used by the duplicate-ownership guard: two
/// different instances of the same weapon share a name but not an id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemRef {
    pub id: ItemId,
    pub name: String,
    pub slot_kind: SlotKind,
    pub pickupable: bool,
    pub droppable: bool,
}

impl ItemRef {
    /// Create a descriptor for a pickup-able, droppable item
    pub fn new(id: ItemId, name: impl Into<String>, slot_kind: SlotKind) -> Self {
        Self {
            id,
            name: name.into(),
            slot_kind,
            pickupable: true,
            droppable: true,
        }
    }

    /// Whether a slot of the given kind accepts this item
    pub fn fits(&self, kind: SlotKind) -> bool {
        self.slot_kind == kind
    }
}

/// Transform representing a view or fire point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl Transform {
    /// Create a transform at `position` facing `target`
    pub fn looking_at(position: Vec3, target: Vec3) -> Self {
        let direction = (target - position).normalize_or_zero();
        let rotation = if direction == Vec3::ZERO {
            Quat::IDENTITY
        } else {
            Quat::from_rotation_arc(-Vec3::Z, direction)
        };
        Self { position, rotation }
    }

    /// Get the forward direction (negative Z in local space)
    pub fn forward(&self) -> Vec3 {
        self.rotation * -Vec3::Z
    }
}
