//! Combatants and the damage seam
//!
//! Health lives outside this crate. The session hands resolved hits to a
//! [`DamageSink`] and learns about deaths through [`DepletionEvent`]s.

use loadout_core::{CombatantId, ObserverId, SlotKind, Transform};

use crate::equipment::EquipmentController;
use crate::hitscan::{AttackType, BodyPart, TargetHit};

/// Receives damage produced by hitscan resolution
pub trait DamageSink {
    fn apply_damage(&mut self, attacker: CombatantId, hit: &TargetHit);
}

/// Health of a combatant reached zero
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepletionEvent {
    pub combatant: CombatantId,
    pub part: BodyPart,
    pub attack_type: AttackType,
    pub attacker: Option<CombatantId>,
    /// Impulse of the killing blow, for ragdolls
    pub force: f32,
}

/// An armed participant, as tracked by the authority
#[derive(Debug)]
pub struct Combatant {
    id: CombatantId,
    controller: ObserverId,
    alive: bool,
    view: Transform,
    pub equipment: EquipmentController,
}

impl Combatant {
    pub fn new(id: CombatantId, controller: ObserverId, layout: &[SlotKind], view: Transform) -> Self {
        Self {
            id,
            controller,
            alive: true,
            view,
            equipment: EquipmentController::new(id, layout),
        }
    }

    pub fn id(&self) -> CombatantId {
        self.id
    }

    /// Observer whose commands drive this combatant
    pub fn controller(&self) -> ObserverId {
        self.controller
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn mark_dead(&mut self) {
        self.alive = false;
    }

    /// Fire point and aim direction
    pub fn view(&self) -> &Transform {
        &self.view
    }

    pub fn set_view(&mut self, view: Transform) {
        self.view = view;
    }
}
