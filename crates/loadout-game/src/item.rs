//! Equippable items
//!
//! An [`Item`] pairs a wire descriptor with one capability set. Behaviour
//! lives behind small traits so the equipment controller can treat guns,
//! knives and grenades uniformly.

use loadout_core::{CombatantId, ItemId, ItemRef, SlotKind};
use loadout_net::ItemSnapshot;
use tracing::warn;

use crate::config::{ArchetypeKind, ArmoryConfig, ItemArchetype, ThrowableConfig};
use crate::error::RejectedIntent;
use crate::weapon::WeaponState;

/// Which presentation an item renders in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Perspective {
    #[default]
    ThirdPerson,
    FirstPerson,
}

/// Lifecycle hooks every item kind supports
pub trait Equippable {
    /// Whether the item may be taken into the hand right now
    fn can_be_equipped(&self) -> bool {
        true
    }

    /// Called when the item becomes the held item
    fn take(&mut self) {}

    /// Called when the item stops being held
    fn put_down(&mut self) {}

    /// Called when the item leaves its owner's inventory
    fn on_dropped(&mut self) {
        self.put_down();
    }

    fn set_perspective(&mut self, _perspective: Perspective) {}
}

/// Items carrying a reloadable magazine
pub trait Reloadable {
    fn weapon(&self) -> &WeaponState;
    fn weapon_mut(&mut self) -> &mut WeaponState;
}

/// Items whose discharge traces through surfaces
pub trait Penetrating {
    /// Maximum surfaces one trace may process
    fn penetration(&self) -> usize;
    fn base_damage(&self) -> f32;
    fn max_range(&self) -> f32;
}

/// Items that can perform a melee attack
pub trait Meleeable {
    fn melee_in_progress(&self) -> bool;
    fn set_melee_in_progress(&mut self, active: bool);
}

/// A ranged weapon
#[derive(Debug, Clone)]
pub struct Gun {
    pub weapon: WeaponState,
    melee: bool,
}

impl Gun {
    pub fn new(weapon: WeaponState) -> Self {
        Self {
            weapon,
            melee: false,
        }
    }
}

impl Equippable for Gun {
    fn put_down(&mut self) {
        self.weapon.put_down();
        self.melee = false;
    }
}

impl Reloadable for Gun {
    fn weapon(&self) -> &WeaponState {
        &self.weapon
    }

    fn weapon_mut(&mut self) -> &mut WeaponState {
        &mut self.weapon
    }
}

impl Penetrating for Gun {
    fn penetration(&self) -> usize {
        self.weapon.config().penetration
    }

    fn base_damage(&self) -> f32 {
        self.weapon.config().base_damage
    }

    fn max_range(&self) -> f32 {
        self.weapon.config().max_range
    }
}

impl Meleeable for Gun {
    fn melee_in_progress(&self) -> bool {
        self.melee
    }

    fn set_melee_in_progress(&mut self, active: bool) {
        self.melee = active;
    }
}

/// A close-range weapon
#[derive(Debug, Clone, Default)]
pub struct Melee {
    active: bool,
}

impl Equippable for Melee {
    fn put_down(&mut self) {
        self.active = false;
    }
}

impl Meleeable for Melee {
    fn melee_in_progress(&self) -> bool {
        self.active
    }

    fn set_melee_in_progress(&mut self, active: bool) {
        self.active = active;
    }
}

/// A consumable thrown item. Once spent it stays in its slot until dropped,
/// but refuses to be taken into the hand again.
#[derive(Debug, Clone)]
pub struct Throwable {
    charges: u32,
}

impl Throwable {
    pub fn new(config: &ThrowableConfig) -> Self {
        Self {
            charges: config.charges,
        }
    }

    pub fn charges(&self) -> u32 {
        self.charges
    }

    /// Spend one charge, returning how many are left
    pub fn throw(&mut self) -> Result<u32, RejectedIntent> {
        self.charges = self.charges.checked_sub(1).ok_or(RejectedIntent::NoCharges)?;
        Ok(self.charges)
    }

    /// Authoritative overwrite
    pub fn set_charges(&mut self, charges: u32) {
        self.charges = charges;
    }
}

impl Equippable for Throwable {
    fn can_be_equipped(&self) -> bool {
        self.charges > 0
    }
}

/// Capability set of a concrete item
#[derive(Debug, Clone)]
pub enum ItemKind {
    Gun(Gun),
    Melee(Melee),
    Throwable(Throwable),
}

impl ItemKind {
    pub fn from_archetype(kind: &ArchetypeKind) -> Self {
        match kind {
            ArchetypeKind::Gun(config) => Self::Gun(Gun::new(WeaponState::new(config.clone()))),
            ArchetypeKind::Melee => Self::Melee(Melee::default()),
            ArchetypeKind::Throwable(config) => Self::Throwable(Throwable::new(config)),
        }
    }

    fn equippable(&self) -> &dyn Equippable {
        match self {
            Self::Gun(g) => g,
            Self::Melee(m) => m,
            Self::Throwable(t) => t,
        }
    }

    fn equippable_mut(&mut self) -> &mut dyn Equippable {
        match self {
            Self::Gun(g) => g,
            Self::Melee(m) => m,
            Self::Throwable(t) => t,
        }
    }

    pub fn as_meleeable_mut(&mut self) -> Option<&mut dyn Meleeable> {
        match self {
            Self::Gun(g) => Some(g),
            Self::Melee(m) => Some(m),
            Self::Throwable(_) => None,
        }
    }
}

/// One item instance, in the world or in an inventory
#[derive(Debug, Clone)]
pub struct Item {
    descriptor: ItemRef,
    pub kind: ItemKind,
    owner: Option<CombatantId>,
    in_use: bool,
    perspective: Perspective,
}

impl Item {
    pub fn new(descriptor: ItemRef, kind: ItemKind) -> Self {
        Self {
            descriptor,
            kind,
            owner: None,
            in_use: false,
            perspective: Perspective::default(),
        }
    }

    /// Instantiate an archetype under a fresh id
    pub fn from_archetype(id: ItemId, archetype: &ItemArchetype) -> Self {
        let descriptor = ItemRef {
            id,
            name: archetype.name.clone(),
            slot_kind: archetype.slot_kind,
            pickupable: archetype.pickupable,
            droppable: archetype.droppable,
        };
        Self::new(descriptor, ItemKind::from_archetype(&archetype.kind))
    }

    /// Rebuild an item from a wire snapshot, using the archetype with the
    /// snapshot's name for the static parameters.
    pub fn from_snapshot(snapshot: &ItemSnapshot, armory: &ArmoryConfig) -> Option<Self> {
        let Some(archetype) = armory.archetype(&snapshot.item.name) else {
            warn!("No archetype named '{}' for {}", snapshot.item.name, snapshot.item.id);
            return None;
        };
        let mut kind = ItemKind::from_archetype(&archetype.kind);
        match (&mut kind, &snapshot.ammo, snapshot.charges) {
            (ItemKind::Gun(gun), Some(ammo), _) => {
                gun.weapon = WeaponState::with_ammo(gun.weapon.config().clone(), ammo.current, ammo.reserve);
            }
            (ItemKind::Throwable(throwable), _, Some(charges)) => throwable.set_charges(charges),
            _ => {}
        }
        Some(Self::new(snapshot.item.clone(), kind))
    }

    pub fn snapshot(&self) -> ItemSnapshot {
        ItemSnapshot {
            item: self.descriptor.clone(),
            ammo: self.weapon().map(WeaponState::snapshot),
            charges: self.throwable().map(Throwable::charges),
        }
    }

    pub fn id(&self) -> ItemId {
        self.descriptor.id
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &ItemRef {
        &self.descriptor
    }

    pub fn slot_kind(&self) -> SlotKind {
        self.descriptor.slot_kind
    }

    pub fn owner(&self) -> Option<CombatantId> {
        self.owner
    }

    pub fn in_use(&self) -> bool {
        self.in_use
    }

    pub fn perspective(&self) -> Perspective {
        self.perspective
    }

    pub fn is_droppable(&self) -> bool {
        self.descriptor.droppable
    }

    /// Unowned and flagged pickup-able
    pub fn can_be_picked_up(&self) -> bool {
        self.descriptor.pickupable && self.owner.is_none()
    }

    pub fn can_be_equipped(&self) -> bool {
        self.kind.equippable().can_be_equipped()
    }

    /// Bind to a new owner; the item starts out holstered
    pub fn assign_to(&mut self, owner: CombatantId) {
        self.owner = Some(owner);
        self.put_down();
    }

    pub fn take(&mut self) {
        self.in_use = true;
        self.kind.equippable_mut().take();
    }

    pub fn put_down(&mut self) {
        self.in_use = false;
        self.kind.equippable_mut().put_down();
    }

    /// Leave the owner's inventory
    pub fn release(&mut self) {
        self.in_use = false;
        self.owner = None;
        self.kind.equippable_mut().on_dropped();
    }

    pub fn set_perspective(&mut self, perspective: Perspective) {
        self.perspective = perspective;
        self.kind.equippable_mut().set_perspective(perspective);
    }

    pub fn gun(&self) -> Option<&Gun> {
        match &self.kind {
            ItemKind::Gun(gun) => Some(gun),
            _ => None,
        }
    }

    pub fn gun_mut(&mut self) -> Option<&mut Gun> {
        match &mut self.kind {
            ItemKind::Gun(gun) => Some(gun),
            _ => None,
        }
    }

    pub fn throwable(&self) -> Option<&Throwable> {
        match &self.kind {
            ItemKind::Throwable(throwable) => Some(throwable),
            _ => None,
        }
    }

    pub fn throwable_mut(&mut self) -> Option<&mut Throwable> {
        match &mut self.kind {
            ItemKind::Throwable(throwable) => Some(throwable),
            _ => None,
        }
    }

    pub fn weapon(&self) -> Option<&WeaponState> {
        self.gun().map(Reloadable::weapon)
    }

    pub fn weapon_mut(&mut self) -> Option<&mut WeaponState> {
        self.gun_mut().map(Reloadable::weapon_mut)
    }
}
