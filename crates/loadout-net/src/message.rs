//! Wire message shapes
//!
//! Payload fields only; framing belongs to the transport.

use glam::{Quat, Vec3};
use loadout_core::{CombatantId, ItemId, ItemRef, SlotKind};
use serde::{Deserialize, Serialize};

/// An intent sent from an observer to the authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Command {
    // Select the item in a slot. The index is clamped by the authority.
    TakeItem { slot_index: i32 },
    // Pick up a world item, preferring the given slot.
    Pickup { item: ItemRef, preferred_slot_index: i32 },
    // Drop whatever occupies the slot.
    Drop { slot_index: i32 },
    // Reload the held weapon.
    Reload,
    // Discharge the held weapon along the combatant's current view.
    Fire,
    // Spend one charge of the held throwable.
    Throw,
}

/// A command addressed to one combatant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub combatant: CombatantId,
    pub command: Command,
}

impl CommandEnvelope {
    pub fn new(combatant: CombatantId, command: Command) -> Self {
        Self { combatant, command }
    }
}

/// Loaded and backup ammunition of one weapon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmmoSnapshot {
    pub current: u32,
    pub reserve: u32,
}

/// Everything an observer needs to mirror one occupied slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub item: ItemRef,
    #[serde(default)]
    pub ammo: Option<AmmoSnapshot>,
    /// Charges left on a throwable
    #[serde(default)]
    pub charges: Option<u32>,
}

/// A completed state change, sent from the authority to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Broadcast {
    // A combatant was spawned with the given slot layout.
    CombatantSpawned {
        combatant: CombatantId,
        slot_kinds: Vec<SlotKind>,
    },
    // A combatant and its equipment no longer exist.
    CombatantRemoved { combatant: CombatantId },
    // Authoritative ammunition of one weapon.
    AmmoSync {
        combatant: CombatantId,
        item: ItemId,
        current: u32,
        reserve: u32,
    },
    // The combatant now holds the given slot.
    EquipmentSync {
        combatant: CombatantId,
        slot_index: usize,
    },
    // The combatant's hand no longer points at any slot.
    HandCleared { combatant: CombatantId },
    // The occupant of one slot changed through a pickup or a drop.
    SlotSync {
        combatant: CombatantId,
        slot_index: usize,
        occupant: Option<ItemSnapshot>,
    },
    // Authoritative charge count of one throwable.
    ThrowSync {
        combatant: CombatantId,
        item: ItemId,
        charges: u32,
    },
    // A reload was scheduled; observers play their local reload phase.
    ReloadStarted { combatant: CombatantId, item: ItemId },
    // A resolved discharge, replayed by observers for visuals.
    FireBroadcast {
        combatant: CombatantId,
        item: ItemId,
        points: Vec<Vec3>,
        material_ids: Vec<u8>,
        orientation: Quat,
    },
}

impl Broadcast {
    /// The combatant this broadcast concerns
    pub fn combatant(&self) -> CombatantId {
        match self {
            Self::CombatantSpawned { combatant, .. }
            | Self::CombatantRemoved { combatant }
            | Self::AmmoSync { combatant, .. }
            | Self::EquipmentSync { combatant, .. }
            | Self::HandCleared { combatant }
            | Self::SlotSync { combatant, .. }
            | Self::ThrowSync { combatant, .. }
            | Self::ReloadStarted { combatant, .. }
            | Self::FireBroadcast { combatant, .. } => *combatant,
        }
    }
}

/// Full equipment state of one combatant, sent once to a late joiner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LateJoinSync {
    pub combatant: CombatantId,
    pub slot_kinds: Vec<SlotKind>,
    pub occupants: Vec<Option<ItemSnapshot>>,
    pub held_slot_index: Option<usize>,
}

/// Anything the authority can deliver to an observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    Broadcast(Broadcast),
    Targeted(LateJoinSync),
}
