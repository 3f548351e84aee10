//! Per-combatant equipment
//!
//! Ordered slots, the hand (which slot is held), and the rules for taking,
//! picking up and dropping items. The same controller runs on the authority,
//! where its decisions are final, and on observers, where local requests are
//! predictions and the `apply_*` operations overwrite them with the
//! authority's state.

use loadout_core::{CombatantId, ItemId, ItemRef, SlotKind, Transform};
use loadout_net::LateJoinSync;
use rand::Rng;
use tracing::{debug, warn};

use crate::error::RejectedIntent;
use crate::events::GameEvent;
use crate::hitscan::{Discharge, FireReport};
use crate::item::{Item, Meleeable, Penetrating, Perspective};
use crate::weapon::{Role, WeaponEvent};

/// One inventory position
#[derive(Debug, Clone)]
pub struct Slot {
    kind: SlotKind,
    occupant: Option<Item>,
}

impl Slot {
    pub fn kind(&self) -> SlotKind {
        self.kind
    }

    pub fn occupant(&self) -> Option<&Item> {
        self.occupant.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.occupant.is_none()
    }
}

/// Where a pickup landed
#[derive(Debug)]
pub struct PickupOutcome {
    pub slot_index: usize,
    /// Previous occupant pushed out to make room
    pub displaced: Option<Item>,
}

/// A refused pickup hands the item back to the caller
#[derive(Debug)]
pub struct PickupRejected {
    pub item: Item,
    pub reason: RejectedIntent,
}

/// Slots, hand and item lifecycle for one combatant
#[derive(Debug)]
pub struct EquipmentController {
    owner: CombatantId,
    slots: Vec<Slot>,
    held_slot: Option<usize>,
    last_held: Option<ItemRef>,
    perspective: Perspective,
    destroyed: bool,
    events: Vec<GameEvent>,
}

impl EquipmentController {
    /// Empty slots with the given layout; the hand starts empty
    pub fn new(owner: CombatantId, layout: &[SlotKind]) -> Self {
        Self {
            owner,
            slots: layout
                .iter()
                .map(|&kind| Slot {
                    kind,
                    occupant: None,
                })
                .collect(),
            held_slot: None,
            last_held: None,
            perspective: Perspective::default(),
            destroyed: false,
            events: Vec::new(),
        }
    }

    pub fn owner(&self) -> CombatantId {
        self.owner
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    pub fn slot_kinds(&self) -> Vec<SlotKind> {
        self.slots.iter().map(Slot::kind).collect()
    }

    pub fn held_slot_index(&self) -> Option<usize> {
        self.held_slot
    }

    /// Occupant of the held slot, if the hand holds anything
    pub fn held_item(&self) -> Option<&Item> {
        self.held_slot
            .and_then(|index| self.slots.get(index))
            .and_then(Slot::occupant)
    }

    /// The last item that was taken into the hand
    pub fn last_held_item(&self) -> Option<&ItemRef> {
        self.last_held.as_ref()
    }

    pub fn perspective(&self) -> Perspective {
        self.perspective
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Whether any slot holds an item with this name
    pub fn owns_item_named(&self, name: &str) -> bool {
        self.items().any(|item| item.name() == name)
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.slots.iter().filter_map(Slot::occupant)
    }

    pub fn slot_of(&self, item: ItemId) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.occupant().is_some_and(|i| i.id() == item))
    }

    /// Clamp a requested index into the slot range
    pub fn clamp_index(&self, slot_index: i32) -> Option<usize> {
        let last = self.slots.len().checked_sub(1)?;
        Some(slot_index.clamp(0, i32::try_from(last).unwrap_or(i32::MAX)) as usize)
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Switch the hand to a slot.
    ///
    /// The index is clamped into range. Re-taking the held item is a no-op
    /// rejection, and an empty pocket slot can only stay held, never be
    /// switched to.
    pub fn request_equip(&mut self, slot_index: i32) -> Result<usize, RejectedIntent> {
        let index = self.clamp_index(slot_index).ok_or(RejectedIntent::NoSlots)?;
        let slot = &self.slots[index];
        match slot.occupant() {
            Some(item) => {
                if self.held_slot == Some(index) && item.in_use() {
                    return Err(RejectedIntent::AlreadyHeld(index));
                }
                if !item.can_be_equipped() {
                    return Err(RejectedIntent::NotEquippable(index));
                }
            }
            None => {
                if slot.kind() == SlotKind::PocketItem && self.held_slot != Some(index) {
                    return Err(RejectedIntent::EmptyPocketSlot(index));
                }
            }
        }
        self.take(index);
        Ok(index)
    }

    /// Why `item` cannot be picked up, if anything prevents it
    pub fn check_pickup(&self, item: &Item) -> Result<(), RejectedIntent> {
        if self.destroyed {
            return Err(RejectedIntent::Destroyed);
        }
        if !item.can_be_picked_up() {
            return Err(RejectedIntent::NotPickupable(item.id()));
        }
        if self.owns_item_named(item.name()) {
            return Err(RejectedIntent::AlreadyOwned(item.name().to_string()));
        }
        if !self.slots.iter().any(|slot| item.descriptor().fits(slot.kind())) {
            return Err(RejectedIntent::NoMatchingSlot(item.slot_kind()));
        }
        Ok(())
    }

    /// Place an item into the inventory and take it into the hand.
    ///
    /// Placement order: the preferred slot if it fits and is empty, then the
    /// first empty fitting slot, then the first fitting slot scanning
    /// circularly from the preferred one, whose occupant is dropped.
    pub fn request_pickup(
        &mut self,
        item: Item,
        preferred_slot: i32,
    ) -> Result<PickupOutcome, PickupRejected> {
        if let Err(reason) = self.check_pickup(&item) {
            return Err(PickupRejected { item, reason });
        }
        let kind = item.slot_kind();
        let count = self.slots.len();
        let preferred = self.clamp_index(preferred_slot).unwrap_or(0);
        let fits_empty = |slot: &Slot| slot.kind() == kind && slot.is_empty();

        let target = if fits_empty(&self.slots[preferred]) {
            Some(preferred)
        } else {
            self.slots.iter().position(fits_empty).or_else(|| {
                (0..count)
                    .map(|offset| (preferred + offset) % count)
                    .find(|&index| self.slots[index].kind() == kind)
            })
        };
        let Some(target) = target else {
            return Err(PickupRejected {
                item,
                reason: RejectedIntent::NoMatchingSlot(kind),
            });
        };

        let displaced = self.detach(target);
        self.place(target, item);
        Ok(PickupOutcome {
            slot_index: target,
            displaced,
        })
    }

    /// Remove the item in a slot from the inventory and hand it back.
    /// If it was held, the hand stays on the now-empty slot.
    pub fn request_drop(&mut self, slot_index: i32) -> Result<Item, RejectedIntent> {
        let index = usize::try_from(slot_index)
            .ok()
            .filter(|&index| index < self.slots.len())
            .ok_or(RejectedIntent::InvalidSlot(slot_index))?;
        let item = self.slots[index]
            .occupant()
            .ok_or(RejectedIntent::EmptySlot(index))?;
        if !item.is_droppable() {
            return Err(RejectedIntent::NotDroppable(item.id()));
        }
        self.detach(index).ok_or(RejectedIntent::EmptySlot(index))
    }

    /// Release every item. Idempotent; later calls return nothing.
    pub fn on_combatant_destroyed(&mut self) -> Vec<Item> {
        if self.destroyed {
            return Vec::new();
        }
        self.destroyed = true;
        let released: Vec<Item> = (0..self.slots.len())
            .filter_map(|index| self.detach(index))
            .collect();
        if self.held_slot.take().is_some() {
            self.events.push(GameEvent::HandCleared { combatant: self.owner });
        }
        released
    }

    /// Forward a presentation change to every owned item
    pub fn on_perspective_changed(&mut self, first_person: bool) {
        self.perspective = if first_person {
            Perspective::FirstPerson
        } else {
            Perspective::ThirdPerson
        };
        for slot in &mut self.slots {
            if let Some(item) = slot.occupant.as_mut() {
                item.set_perspective(self.perspective);
            }
        }
    }

    /// Externally driven melee flag on the held item
    pub fn set_melee_in_progress(&mut self, active: bool) {
        if let Some(item) = self.held_item_mut() {
            if let Some(melee) = item.kind.as_meleeable_mut() {
                melee.set_melee_in_progress(active);
            }
        }
    }

    /// Discharge the held weapon along `aim`, deflected by its current recoil
    pub fn fire(
        &mut self,
        now: f64,
        aim: &Transform,
        rng: &mut impl Rng,
    ) -> Result<(ItemId, Discharge), RejectedIntent> {
        let index = self.held_slot.ok_or(RejectedIntent::NothingHeld)?;
        let item = self.slots[index]
            .occupant
            .as_mut()
            .ok_or(RejectedIntent::NothingHeld)?;
        let id = item.id();
        let gun = item.gun_mut().ok_or(RejectedIntent::NotAWeapon(id))?;

        let direction = gun.weapon.recoil().apply(aim.forward(), rng);
        let melee = gun.melee_in_progress();
        gun.weapon.fire(now, melee)?;
        let discharge = Discharge {
            shooter: self.owner,
            origin: aim.position,
            direction,
            max_range: gun.max_range(),
            penetration: gun.penetration(),
            base_damage: gun.base_damage(),
        };

        self.collect_weapon_events(index);
        Ok((id, discharge))
    }

    /// Start reloading the held weapon
    pub fn reload(&mut self, now: f64) -> Result<ItemId, RejectedIntent> {
        let index = self.held_slot.ok_or(RejectedIntent::NothingHeld)?;
        let item = self.slots[index]
            .occupant
            .as_mut()
            .ok_or(RejectedIntent::NothingHeld)?;
        let id = item.id();
        item.weapon_mut()
            .ok_or(RejectedIntent::NotAWeapon(id))?
            .request_reload(now)?;
        self.collect_weapon_events(index);
        Ok(id)
    }

    /// Spend one charge of the held throwable. A spent throwable stays held
    /// until the hand moves, after which it cannot be taken again.
    pub fn throw_held(&mut self) -> Result<ItemId, RejectedIntent> {
        let index = self.held_slot.ok_or(RejectedIntent::NothingHeld)?;
        let item = self.slots[index]
            .occupant
            .as_mut()
            .ok_or(RejectedIntent::NothingHeld)?;
        let id = item.id();
        let charges = item
            .throwable_mut()
            .ok_or(RejectedIntent::NotThrowable(id))?
            .throw()?;
        self.events.push(GameEvent::Thrown {
            combatant: self.owner,
            item: id,
            charges,
        });
        Ok(id)
    }

    /// Record a resolved or replayed discharge
    pub fn record_fire(&mut self, item: ItemId, report: FireReport) {
        self.events.push(GameEvent::Fired {
            combatant: self.owner,
            item,
            report,
        });
    }

    /// Tick weapon timers. Only the held weapon's recoil settles, and the
    /// authority also starts the automatic reload of an empty held weapon.
    pub fn advance(&mut self, dt: f32, now: f64, role: Role) {
        for index in 0..self.slots.len() {
            let Some(weapon) = self.slots[index].occupant.as_mut().and_then(Item::weapon_mut) else {
                continue;
            };
            weapon.advance(dt, role);
            let held = self.held_slot == Some(index);
            if held {
                weapon.stabilize_recoil(dt);
            }
            if role == Role::Authority && held && weapon.needs_auto_reload() {
                debug!("{} auto-reloading slot {}", self.owner, index);
                weapon.begin_reload(now);
            }
            self.collect_weapon_events(index);
        }
    }

    // Authoritative overwrites

    /// Point the hand at a slot without validation
    pub fn apply_equipment_sync(&mut self, slot_index: usize) {
        let Some(slot) = self.slots.get(slot_index) else {
            warn!("{} has no slot {} to hold", self.owner, slot_index);
            return;
        };
        if self.held_slot == Some(slot_index) && slot.occupant().map_or(true, Item::in_use) {
            return;
        }
        self.take(slot_index);
    }

    /// Empty the hand without validation
    pub fn apply_hand_cleared(&mut self) {
        if let Some(previous) = self.held_item_mut() {
            previous.put_down();
        }
        if self.held_slot.take().is_some() {
            self.events.push(GameEvent::HandCleared { combatant: self.owner });
        }
    }

    /// Replace a slot's occupant without validation
    pub fn apply_slot_sync(&mut self, slot_index: usize, occupant: Option<Item>) {
        if slot_index >= self.slots.len() {
            warn!("{} has no slot {} to fill", self.owner, slot_index);
            return;
        }
        if let Some(mut previous) = self.slots[slot_index].occupant.take() {
            previous.release();
            self.events.push(GameEvent::ItemDropped {
                combatant: self.owner,
                slot_index,
                item: previous.descriptor().clone(),
            });
        }
        if let Some(item) = occupant {
            self.place_silently(slot_index, item);
            if self.held_slot == Some(slot_index) {
                self.take(slot_index);
            }
        }
    }

    /// Overwrite counters of an owned weapon. Returns whether it was found.
    pub fn apply_ammo_sync(&mut self, item: ItemId, current: u32, reserve: u32) -> bool {
        let Some(index) = self.slot_of(item) else {
            return false;
        };
        let Some(weapon) = self.slots[index].occupant.as_mut().and_then(Item::weapon_mut) else {
            return false;
        };
        weapon.apply_ammo_sync(current, reserve);
        self.collect_weapon_events(index);
        true
    }

    /// Overwrite the charge count of an owned throwable
    pub fn apply_throw_sync(&mut self, item: ItemId, charges: u32) -> bool {
        let Some(index) = self.slot_of(item) else {
            return false;
        };
        let Some(throwable) = self.slots[index].occupant.as_mut().and_then(Item::throwable_mut) else {
            return false;
        };
        if throwable.charges() != charges {
            throwable.set_charges(charges);
            self.events.push(GameEvent::Thrown {
                combatant: self.owner,
                item,
                charges,
            });
        }
        true
    }

    /// Mirror an authoritative reload start on a replica
    pub fn apply_reload_started(&mut self, item: ItemId, now: f64) -> bool {
        let Some(index) = self.slot_of(item) else {
            return false;
        };
        let Some(weapon) = self.slots[index].occupant.as_mut().and_then(Item::weapon_mut) else {
            return false;
        };
        if !weapon.is_reloading() {
            weapon.begin_reload(now);
        }
        self.collect_weapon_events(index);
        true
    }

    /// Rebuild all slot contents and the hand from a late-join snapshot
    pub fn apply_late_join(&mut self, occupants: Vec<Option<Item>>, held_slot: Option<usize>) {
        if occupants.len() != self.slots.len() {
            warn!(
                "{}: late-join snapshot has {} slots, expected {}",
                self.owner,
                occupants.len(),
                self.slots.len()
            );
        }
        for slot in &mut self.slots {
            if let Some(mut item) = slot.occupant.take() {
                item.release();
            }
        }
        self.held_slot = None;
        for (index, occupant) in occupants.into_iter().enumerate().take(self.slots.len()) {
            if let Some(item) = occupant {
                self.place_silently(index, item);
            }
        }
        match held_slot {
            Some(index) if index < self.slots.len() => self.take(index),
            Some(index) => warn!("{}: late-join held slot {} out of range", self.owner, index),
            None => {}
        }
    }

    /// Snapshot for an observer joining mid-session
    pub fn late_join_sync(&self) -> LateJoinSync {
        LateJoinSync {
            combatant: self.owner,
            slot_kinds: self.slot_kinds(),
            occupants: self
                .slots
                .iter()
                .map(|slot| slot.occupant().map(Item::snapshot))
                .collect(),
            held_slot_index: self.held_slot,
        }
    }

    fn held_item_mut(&mut self) -> Option<&mut Item> {
        let index = self.held_slot?;
        self.slots.get_mut(index)?.occupant.as_mut()
    }

    /// Put down the previous item, move the hand, then take the new one
    fn take(&mut self, index: usize) {
        if let Some(previous) = self.held_item_mut() {
            previous.put_down();
        }
        self.held_slot = Some(index);
        if let Some(item) = self.slots[index].occupant() {
            self.last_held = Some(item.descriptor().clone());
        }
        self.events.push(GameEvent::EquipmentChanged {
            combatant: self.owner,
            slot_index: index,
        });
        if let Some(item) = self.slots[index].occupant.as_mut() {
            item.take();
        }
    }

    fn place(&mut self, index: usize, item: Item) {
        self.place_silently(index, item);
        if let Some(item) = self.slots[index].occupant() {
            self.events.push(GameEvent::ItemPickedUp {
                combatant: self.owner,
                slot_index: index,
                snapshot: item.snapshot(),
            });
        }
        if let Err(reason) = self.request_equip(index as i32) {
            debug!("{} keeps the hand after pickup: {}", self.owner, reason);
        }
    }

    fn place_silently(&mut self, index: usize, mut item: Item) {
        item.assign_to(self.owner);
        item.set_perspective(self.perspective);
        self.slots[index].occupant = Some(item);
    }

    /// Empty a slot. A held slot stays held, now empty.
    fn detach(&mut self, index: usize) -> Option<Item> {
        let mut item = self.slots[index].occupant.take()?;
        item.release();
        self.events.push(GameEvent::ItemDropped {
            combatant: self.owner,
            slot_index: index,
            item: item.descriptor().clone(),
        });
        if self.held_slot == Some(index) && !self.destroyed {
            self.take(index);
        }
        Some(item)
    }

    fn collect_weapon_events(&mut self, index: usize) {
        let Some(item) = self.slots[index].occupant.as_mut() else {
            return;
        };
        let id = item.id();
        let Some(weapon) = item.weapon_mut() else {
            return;
        };
        for event in weapon.drain_events() {
            self.events.push(match event {
                WeaponEvent::AmmoChanged { current, reserve } => GameEvent::AmmoChanged {
                    combatant: self.owner,
                    item: id,
                    current,
                    reserve,
                },
                WeaponEvent::ReloadStarted => GameEvent::ReloadStarted {
                    combatant: self.owner,
                    item: id,
                },
            });
        }
    }
}
