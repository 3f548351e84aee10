//! Observer-side session
//!
//! Mirrors every combatant's equipment from the authority's broadcasts and
//! predicts the locally controlled combatant's intents. Authoritative
//! messages always overwrite predicted state.

use std::collections::BTreeMap;

use loadout_core::{CombatantId, ItemRef, ObserverId, Transform};
use loadout_net::{Broadcast, Command, CommandEnvelope, LateJoinSync, ObserverChannel, ServerMessage};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, warn};

use crate::config::ArmoryConfig;
use crate::equipment::EquipmentController;
use crate::error::{RejectedIntent, SessionError};
use crate::events::{EventBus, GameEvent};
use crate::hitscan::FireReport;
use crate::item::Item;
use crate::weapon::Role;

/// One observer's view of the match
pub struct ObserverSession<C: ObserverChannel> {
    channel: C,
    armory: ArmoryConfig,
    now: f64,
    controlled: Option<CombatantId>,
    combatants: BTreeMap<CombatantId, EquipmentController>,
    rng: StdRng,
    bus: EventBus,
}

impl<C: ObserverChannel> ObserverSession<C> {
    pub fn new(armory: ArmoryConfig, channel: C, seed: u64) -> Self {
        Self {
            channel,
            armory,
            now: 0.0,
            controlled: None,
            combatants: BTreeMap::new(),
            rng: StdRng::seed_from_u64(seed),
            bus: EventBus::new(),
        }
    }

    pub fn id(&self) -> ObserverId {
        self.channel.id()
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    /// Drive `combatant` from this observer's input
    pub fn control(&mut self, combatant: CombatantId) {
        self.controlled = Some(combatant);
    }

    pub fn controlled(&self) -> Option<CombatantId> {
        self.controlled
    }

    pub fn combatant(&self, id: CombatantId) -> Option<&EquipmentController> {
        self.combatants.get(&id)
    }

    pub fn combatant_count(&self) -> usize {
        self.combatants.len()
    }

    pub fn subscribe(&mut self, f: impl FnMut(&GameEvent) + Send + 'static) {
        self.bus.subscribe(f);
    }

    /// Switch slots locally, then ask the authority
    pub fn take_item(&mut self, slot_index: i32) -> Result<(), SessionError> {
        let (id, controller) = self.controlled_mut()?;
        if let Err(reason) = controller.request_equip(slot_index) {
            debug!("Predicted take of slot {} refused: {}", slot_index, reason);
        }
        self.send(id, Command::TakeItem { slot_index })
    }

    /// Ask the authority for a world item. Duplicates are refused locally.
    pub fn pickup(&mut self, item: ItemRef, preferred_slot_index: i32) -> Result<(), SessionError> {
        let (id, controller) = self.controlled_mut()?;
        if controller.owns_item_named(&item.name) {
            return Err(RejectedIntent::AlreadyOwned(item.name).into());
        }
        self.send(
            id,
            Command::Pickup {
                item,
                preferred_slot_index,
            },
        )
    }

    /// Ask the authority to drop the item in a slot
    pub fn drop_item(&mut self, slot_index: i32) -> Result<(), SessionError> {
        let (id, _) = self.controlled_mut()?;
        self.send(id, Command::Drop { slot_index })
    }

    /// Start the reload phase locally, then ask the authority
    pub fn reload(&mut self) -> Result<(), SessionError> {
        let now = self.now;
        let (id, controller) = self.controlled_mut()?;
        controller.reload(now)?;
        self.send(id, Command::Reload)
    }

    /// Spend a round locally, then ask the authority to resolve the shot
    pub fn fire(&mut self) -> Result<(), SessionError> {
        let now = self.now;
        let id = self.controlled.ok_or(SessionError::NoControlledCombatant)?;
        let controller = self
            .combatants
            .get_mut(&id)
            .ok_or(RejectedIntent::UnknownCombatant(id))?;
        controller.fire(now, &Transform::default(), &mut self.rng)?;
        self.send(id, Command::Fire)
    }

    /// Spend a charge of the held throwable locally, then tell the authority
    pub fn throw_item(&mut self) -> Result<(), SessionError> {
        let (id, controller) = self.controlled_mut()?;
        controller.throw_held()?;
        self.send(id, Command::Throw)
    }

    pub fn set_perspective(&mut self, first_person: bool) -> Result<(), SessionError> {
        let (_, controller) = self.controlled_mut()?;
        controller.on_perspective_changed(first_person);
        Ok(())
    }

    pub fn set_melee_in_progress(&mut self, active: bool) -> Result<(), SessionError> {
        let (_, controller) = self.controlled_mut()?;
        controller.set_melee_in_progress(active);
        Ok(())
    }

    /// Apply every pending message from the authority. Returns how many.
    pub fn sync(&mut self) -> usize {
        let mut applied = 0;
        while let Some(message) = self.channel.poll_message() {
            applied += 1;
            match message {
                ServerMessage::Broadcast(broadcast) => self.apply_broadcast(broadcast),
                ServerMessage::Targeted(sync) => self.apply_late_join(sync),
            }
        }
        self.flush();
        applied
    }

    /// Tick local reload phases and cooldowns
    pub fn advance(&mut self, dt: f32) {
        self.now += f64::from(dt);
        for controller in self.combatants.values_mut() {
            controller.advance(dt, self.now, Role::Prediction);
        }
        self.flush();
    }

    fn apply_broadcast(&mut self, broadcast: Broadcast) {
        let id = broadcast.combatant();
        if let Broadcast::CombatantSpawned { combatant, slot_kinds } = &broadcast {
            self.combatants
                .insert(*combatant, EquipmentController::new(*combatant, slot_kinds));
            return;
        }
        if let Broadcast::CombatantRemoved { combatant } = broadcast {
            if let Some(mut controller) = self.combatants.remove(&combatant) {
                controller.on_combatant_destroyed();
            }
            return;
        }

        let Some(controller) = self.combatants.get_mut(&id) else {
            debug!("Ignoring broadcast for unknown {}", id);
            return;
        };
        match broadcast {
            Broadcast::AmmoSync {
                item,
                current,
                reserve,
                ..
            } => {
                if !controller.apply_ammo_sync(item, current, reserve) {
                    debug!("{} does not carry {}", id, item);
                }
            }
            Broadcast::EquipmentSync { slot_index, .. } => {
                controller.apply_equipment_sync(slot_index);
            }
            Broadcast::HandCleared { .. } => controller.apply_hand_cleared(),
            Broadcast::SlotSync {
                slot_index,
                occupant,
                ..
            } => {
                let item = occupant.and_then(|snapshot| Item::from_snapshot(&snapshot, &self.armory));
                controller.apply_slot_sync(slot_index, item);
            }
            Broadcast::ThrowSync { item, charges, .. } => {
                if !controller.apply_throw_sync(item, charges) {
                    debug!("{} does not carry throwable {}", id, item);
                }
            }
            Broadcast::ReloadStarted { item, .. } => {
                controller.apply_reload_started(item, self.now);
            }
            Broadcast::FireBroadcast {
                item,
                points,
                material_ids,
                orientation,
                ..
            } => {
                controller.record_fire(
                    item,
                    FireReport {
                        points,
                        material_ids,
                        orientation,
                    },
                );
            }
            Broadcast::CombatantSpawned { .. } | Broadcast::CombatantRemoved { .. } => {}
        }
    }

    fn apply_late_join(&mut self, sync: LateJoinSync) {
        let mut controller = EquipmentController::new(sync.combatant, &sync.slot_kinds);
        let occupants = sync
            .occupants
            .iter()
            .map(|occupant| {
                occupant
                    .as_ref()
                    .and_then(|snapshot| Item::from_snapshot(snapshot, &self.armory))
            })
            .collect();
        controller.apply_late_join(occupants, sync.held_slot_index);
        if self.combatants.insert(sync.combatant, controller).is_some() {
            warn!("Late-join snapshot replaced existing {}", sync.combatant);
        }
    }

    fn controlled_mut(&mut self) -> Result<(CombatantId, &mut EquipmentController), SessionError> {
        let id = self.controlled.ok_or(SessionError::NoControlledCombatant)?;
        let controller = self
            .combatants
            .get_mut(&id)
            .ok_or(RejectedIntent::UnknownCombatant(id))?;
        Ok((id, controller))
    }

    fn send(&mut self, combatant: CombatantId, command: Command) -> Result<(), SessionError> {
        self.flush();
        self.channel
            .send_command(CommandEnvelope::new(combatant, command))?;
        Ok(())
    }

    fn flush(&mut self) {
        for controller in self.combatants.values_mut() {
            for event in controller.drain_events() {
                self.bus.publish(&event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::authority::AuthoritySession;
    use crate::combatant::{DamageSink, DepletionEvent};
    use crate::hitscan::{AttackType, BodyPart, TargetHit};
    use glam::Vec3;
    use loadout_core::ItemId;
    use loadout_net::{AuthorityEndpoint, LocalHub, ObserverEndpoint};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingSink(Vec<TargetHit>);

    impl DamageSink for RecordingSink {
        fn apply_damage(&mut self, _attacker: CombatantId, hit: &TargetHit) {
            self.0.push(*hit);
        }
    }

    struct Match {
        hub: LocalHub,
        authority: AuthoritySession<AuthorityEndpoint>,
        arena: Arena,
        sink: RecordingSink,
    }

    impl Match {
        fn new() -> Self {
            let (hub, endpoint) = LocalHub::new();
            Self {
                hub,
                authority: AuthoritySession::new(ArmoryConfig::default(), endpoint, 11),
                arena: Arena::new(),
                sink: RecordingSink::default(),
            }
        }

        fn join(&mut self) -> ObserverSession<ObserverEndpoint> {
            let endpoint = self.hub.connect();
            let id = endpoint.id();
            self.authority.on_observer_joined(id).unwrap();
            ObserverSession::new(ArmoryConfig::default(), endpoint, u64::from(id.0))
        }

        fn pump(&mut self) {
            self.authority.process_commands(&self.arena, &mut self.sink);
        }
    }

    fn make_match() -> (Match, ObserverSession<ObserverEndpoint>, ObserverSession<ObserverEndpoint>, CombatantId) {
        let mut game = Match::new();
        let mut alice = game.join();
        let mut bob = game.join();
        let id = game
            .authority
            .spawn_combatant(alice.id(), Transform::default(), &["Rifle", "Pistol"]);
        alice.sync();
        bob.sync();
        alice.control(id);
        (game, alice, bob, id)
    }

    #[test]
    fn test_spawn_replicates_to_all() {
        let (_game, alice, bob, id) = make_match();
        for observer in [&alice, &bob] {
            let controller = observer.combatant(id).unwrap();
            assert_eq!(controller.held_slot_index(), Some(0));
            assert!(controller.owns_item_named("Rifle"));
            assert!(controller.owns_item_named("Pistol"));
        }
    }

    #[test]
    fn test_predicted_take_confirmed() {
        let (mut game, mut alice, mut bob, id) = make_match();
        alice.take_item(1).unwrap();
        assert_eq!(alice.combatant(id).unwrap().held_slot_index(), Some(1));

        game.pump();
        // The requester already applied the change and is skipped
        assert_eq!(alice.sync(), 0);
        bob.sync();
        assert_eq!(bob.combatant(id).unwrap().held_slot_index(), Some(1));
        assert_eq!(
            game.authority.combatant(id).unwrap().equipment.held_slot_index(),
            Some(1)
        );
    }

    #[test]
    fn test_rejected_command_broadcasts_nothing() {
        let (mut game, mut alice, mut bob, _id) = make_match();
        assert!(matches!(
            alice.reload(),
            Err(SessionError::Rejected(RejectedIntent::MagazineFull))
        ));
        alice.drop_item(9).unwrap();
        game.pump();
        assert_eq!(alice.sync(), 0);
        assert_eq!(bob.sync(), 0);
    }

    #[test]
    fn test_fire_reconciles_ammo_and_replays_report() {
        let (mut game, mut alice, mut bob, id) = make_match();
        game.arena.add_wall(Vec3::new(5.0, 5.0, 0.5), Vec3::new(0.0, 0.0, -10.0), "Wood", true);
        let reports = Arc::new(Mutex::new(Vec::new()));
        let seen = reports.clone();
        bob.subscribe(move |event| {
            if let GameEvent::Fired { report, .. } = event {
                seen.lock().unwrap().push(report.clone());
            }
        });

        alice.fire().unwrap();
        let predicted = alice.combatant(id).unwrap().held_item().unwrap().weapon().unwrap().current_ammo();
        assert_eq!(predicted, 29);

        game.pump();
        alice.sync();
        bob.sync();

        for observer in [&alice, &bob] {
            let weapon = observer.combatant(id).unwrap().held_item().unwrap().weapon().unwrap().clone();
            assert_eq!((weapon.current_ammo(), weapon.reserve_ammo()), (29, 90));
        }
        let reports = reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].material_ids, vec![2]);
    }

    #[test]
    fn test_shot_damages_other_combatant() {
        let (mut game, mut alice, _bob, id) = make_match();
        let target = game.authority.spawn_combatant(ObserverId(99), Transform::default(), &[]);
        game.arena.add_hitbox(target, BodyPart::Torso, Vec3::splat(0.5), Vec3::new(0.0, 0.0, -6.0), Vec3::ZERO);
        game.arena.add_hitbox(id, BodyPart::Torso, Vec3::splat(0.5), Vec3::ZERO, Vec3::ZERO);
        alice.sync();

        alice.fire().unwrap();
        game.pump();

        assert_eq!(game.sink.0.len(), 1);
        assert_eq!(game.sink.0[0].target.combatant, target);
    }

    #[test]
    fn test_reload_phase_ends_on_ammo_sync() {
        let (mut game, mut alice, mut bob, id) = make_match();
        alice.fire().unwrap();
        game.pump();
        alice.sync();
        bob.sync();

        alice.reload().unwrap();
        assert!(alice.combatant(id).unwrap().held_item().unwrap().weapon().unwrap().is_reloading());
        game.pump();
        bob.sync();
        assert!(bob.combatant(id).unwrap().held_item().unwrap().weapon().unwrap().is_reloading());

        game.authority.advance(1.5);
        alice.sync();
        bob.sync();
        for observer in [&alice, &bob] {
            let weapon = observer.combatant(id).unwrap().held_item().unwrap().weapon().unwrap().clone();
            assert!(!weapon.is_reloading());
            assert_eq!((weapon.current_ammo(), weapon.reserve_ammo()), (30, 89));
        }
    }

    #[test]
    fn test_late_joiner_sees_current_state() {
        let (mut game, mut alice, _bob, id) = make_match();
        alice.take_item(1).unwrap();
        alice.drop_item(0).unwrap();
        game.pump();

        let mut carol = game.join();
        assert_eq!(carol.sync(), 1);
        let controller = carol.combatant(id).unwrap();
        assert_eq!(controller.held_slot_index(), Some(1));
        assert!(controller.slot(0).unwrap().is_empty());
        assert!(controller.owns_item_named("Pistol"));
    }

    #[test]
    fn test_depleted_combatant_empty_handed_everywhere() {
        let (mut game, mut alice, mut bob, id) = make_match();
        game.authority.on_depleted(DepletionEvent {
            combatant: id,
            part: BodyPart::Head,
            attack_type: AttackType::Hitscan,
            attacker: None,
            force: 0.0,
        });
        alice.sync();
        bob.sync();
        let mut carol = game.join();
        carol.sync();

        let authoritative = game.authority.combatant(id).unwrap().equipment.held_slot_index();
        assert_eq!(authoritative, None);
        for observer in [&alice, &bob, &carol] {
            let controller = observer.combatant(id).unwrap();
            assert_eq!(controller.held_slot_index(), authoritative);
            assert!(controller.items().next().is_none());
        }
        assert_eq!(game.authority.world().len(), 2);
    }

    #[test]
    fn test_thrown_charges_replicate() {
        let (mut game, mut alice, mut bob, id) = make_match();
        let grenade = game
            .authority
            .spawn_world_item("Grenade", Vec3::ZERO)
            .unwrap();
        let descriptor = game.authority.world().get(grenade).unwrap().descriptor().clone();
        alice.pickup(descriptor, 3).unwrap();
        game.pump();
        alice.sync();
        bob.sync();
        assert_eq!(bob.combatant(id).unwrap().held_slot_index(), Some(3));

        alice.throw_item().unwrap();
        game.pump();
        alice.sync();
        bob.sync();
        let mut carol = game.join();
        carol.sync();

        for observer in [&alice, &bob, &carol] {
            let held = observer.combatant(id).unwrap().held_item().unwrap();
            assert_eq!(held.throwable().map(crate::item::Throwable::charges), Some(0));
            assert!(!held.can_be_equipped());
        }
        assert!(matches!(
            alice.throw_item(),
            Err(SessionError::Rejected(RejectedIntent::NoCharges))
        ));
    }

    #[test]
    fn test_pickup_of_owned_name_refused_locally() {
        let (mut game, mut alice, _bob, _id) = make_match();
        let rifle = ItemRef::new(ItemId(500), "Rifle", loadout_core::SlotKind::Normal);
        assert!(matches!(
            alice.pickup(rifle, 0),
            Err(SessionError::Rejected(RejectedIntent::AlreadyOwned(_)))
        ));
        assert_eq!(game.authority.process_commands(&game.arena, &mut game.sink), 0);
    }

    #[test]
    fn test_removed_combatant_disappears() {
        let (mut game, mut alice, mut bob, id) = make_match();
        game.authority.despawn_combatant(id);
        alice.sync();
        bob.sync();
        assert!(alice.combatant(id).is_none());
        assert_eq!(bob.combatant_count(), 0);
        assert!(matches!(alice.fire(), Err(SessionError::Rejected(RejectedIntent::UnknownCombatant(_)))));
    }
}
