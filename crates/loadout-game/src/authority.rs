//! Authoritative session
//!
//! Owns every combatant's equipment and the world items, executes commands
//! from observers, and broadcasts each completed state change through the
//! replication channel.

use std::collections::BTreeMap;

use glam::Vec3;
use loadout_core::{CombatantId, ItemId, ObserverId, SessionId, Transform};
use loadout_net::{AuthorityChannel, Broadcast, Command, CommandEnvelope, NetError};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::combatant::{Combatant, DamageSink, DepletionEvent};
use crate::config::ArmoryConfig;
use crate::error::RejectedIntent;
use crate::events::{EventBus, GameEvent};
use crate::hitscan::{self, RayCaster};
use crate::item::Item;
use crate::weapon::Role;
use crate::world::WorldItems;

/// An equipment change the requesting observer already predicted
#[derive(Debug, Clone, Copy)]
struct Echo {
    observer: ObserverId,
    combatant: CombatantId,
    slot_index: usize,
}

/// The single decision-maker of a match
pub struct AuthoritySession<C: AuthorityChannel> {
    id: SessionId,
    armory: ArmoryConfig,
    channel: C,
    now: f64,
    combatants: BTreeMap<CombatantId, Combatant>,
    world: WorldItems,
    next_combatant: u32,
    rng: StdRng,
    bus: EventBus,
}

impl<C: AuthorityChannel> AuthoritySession<C> {
    /// `seed` drives recoil deflection, so sessions replay deterministically
    pub fn new(armory: ArmoryConfig, channel: C, seed: u64) -> Self {
        let world = WorldItems::new(armory.dropped_item_lifetime);
        let id = SessionId::new();
        info!("Authority session {} started", id);
        Self {
            id,
            armory,
            channel,
            now: 0.0,
            combatants: BTreeMap::new(),
            world,
            next_combatant: 1,
            rng: StdRng::seed_from_u64(seed),
            bus: EventBus::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Simulation time in seconds
    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn armory(&self) -> &ArmoryConfig {
        &self.armory
    }

    pub fn world(&self) -> &WorldItems {
        &self.world
    }

    pub fn combatant(&self, id: CombatantId) -> Option<&Combatant> {
        self.combatants.get(&id)
    }

    pub fn combatants(&self) -> impl Iterator<Item = &Combatant> {
        self.combatants.values()
    }

    /// Listen to every event the authority produces
    pub fn subscribe(&mut self, f: impl FnMut(&GameEvent) + Send + 'static) {
        self.bus.subscribe(f);
    }

    /// Spawn a combatant driven by `controller`, arm it with the named items
    /// (item `i` prefers slot `i`) and take the first slot.
    pub fn spawn_combatant(
        &mut self,
        controller: ObserverId,
        view: Transform,
        loadout: &[&str],
    ) -> CombatantId {
        let id = CombatantId(self.next_combatant);
        self.next_combatant += 1;
        let mut combatant = Combatant::new(id, controller, &self.armory.slots, view);
        self.channel.broadcast(
            Broadcast::CombatantSpawned {
                combatant: id,
                slot_kinds: combatant.equipment.slot_kinds(),
            },
            None,
        );

        for (preferred, name) in loadout.iter().enumerate() {
            let Some(archetype) = self.armory.archetype(name) else {
                warn!("Unknown loadout item '{}' for {}", name, id);
                continue;
            };
            let item = self.world.instantiate(archetype);
            if let Err(rejected) = combatant.equipment.request_pickup(item, preferred as i32) {
                warn!("{} could not carry '{}': {}", id, name, rejected.reason);
            }
        }
        if let Err(reason) = combatant.equipment.request_equip(0) {
            debug!("{} spawned without taking slot 0: {}", id, reason);
        }

        info!("Spawned {} for {}", id, controller);
        self.combatants.insert(id, combatant);
        self.flush(None);
        id
    }

    /// Place a persistent item in the world
    pub fn spawn_world_item(&mut self, name: &str, position: Vec3) -> Option<ItemId> {
        let archetype = self.armory.archetype(name)?;
        let item = self.world.instantiate(archetype);
        Some(self.world.spawn(item, position))
    }

    /// Update the fire point and aim of a combatant
    pub fn set_view(&mut self, combatant: CombatantId, view: Transform) -> Result<(), RejectedIntent> {
        self.combatants
            .get_mut(&combatant)
            .ok_or(RejectedIntent::UnknownCombatant(combatant))?
            .set_view(view);
        Ok(())
    }

    /// Drain and execute every pending command. Returns how many were read.
    pub fn process_commands(&mut self, caster: &dyn RayCaster, damage: &mut dyn DamageSink) -> usize {
        let mut processed = 0;
        while let Some((from, envelope)) = self.channel.poll_command() {
            processed += 1;
            if let Err(reason) = self.handle_command(from, envelope, caster, damage) {
                debug!("Rejected command from {}: {}", from, reason);
            }
        }
        processed
    }

    /// Validate and execute one command
    pub fn handle_command(
        &mut self,
        from: ObserverId,
        envelope: CommandEnvelope,
        caster: &dyn RayCaster,
        damage: &mut dyn DamageSink,
    ) -> Result<(), RejectedIntent> {
        let id = envelope.combatant;
        let combatant = self
            .combatants
            .get_mut(&id)
            .ok_or(RejectedIntent::UnknownCombatant(id))?;
        if combatant.controller() != from {
            return Err(RejectedIntent::NotController {
                observer: from,
                combatant: id,
            });
        }
        if !combatant.is_alive() {
            return Err(RejectedIntent::Dead(id));
        }
        let position = combatant.view().position;

        let mut echo = None;
        match envelope.command {
            Command::TakeItem { slot_index } => {
                let index = combatant.equipment.request_equip(slot_index)?;
                echo = Some(Echo {
                    observer: from,
                    combatant: id,
                    slot_index: index,
                });
            }
            Command::Pickup {
                item,
                preferred_slot_index,
            } => {
                let candidate = self
                    .world
                    .get(item.id)
                    .ok_or(RejectedIntent::UnknownItem(item.id))?;
                combatant.equipment.check_pickup(candidate)?;
                let item_position = self.world.position(item.id).unwrap_or(position);
                let candidate = self
                    .world
                    .take(item.id)
                    .ok_or(RejectedIntent::UnknownItem(item.id))?;
                match combatant.equipment.request_pickup(candidate, preferred_slot_index) {
                    Ok(outcome) => {
                        if let Some(displaced) = outcome.displaced {
                            release_to_world(&mut self.world, displaced, position, self.now);
                        }
                    }
                    Err(rejected) => {
                        self.world.spawn(rejected.item, item_position);
                        return Err(rejected.reason);
                    }
                }
            }
            Command::Drop { slot_index } => {
                let item = combatant.equipment.request_drop(slot_index)?;
                release_to_world(&mut self.world, item, position, self.now);
            }
            Command::Reload => {
                combatant.equipment.reload(self.now)?;
            }
            Command::Throw => {
                let item = combatant.equipment.throw_held()?;
                debug!("{} threw {}", id, item);
            }
            Command::Fire => {
                let view = *combatant.view();
                let (item, discharge) = combatant.equipment.fire(self.now, &view, &mut self.rng)?;
                let outcome = hitscan::resolve(caster, &discharge);
                for hit in &outcome.target_hits {
                    damage.apply_damage(id, hit);
                }
                combatant.equipment.record_fire(item, outcome.report);
            }
        }

        self.flush(echo);
        Ok(())
    }

    /// Advance simulation time: weapon timers, automatic reloads and world
    /// item despawns.
    pub fn advance(&mut self, dt: f32) {
        self.now += f64::from(dt);
        for combatant in self.combatants.values_mut() {
            combatant.equipment.advance(dt, self.now, Role::Authority);
        }
        self.world.advance(dt);
        self.flush(None);
    }

    /// Send the full equipment state of every combatant to a new observer
    pub fn on_observer_joined(&mut self, observer: ObserverId) -> Result<(), NetError> {
        info!("{} joined session {}", observer, self.id);
        for combatant in self.combatants.values() {
            self.channel
                .send_targeted(observer, combatant.equipment.late_join_sync())?;
        }
        Ok(())
    }

    /// Remove every combatant the departed observer was driving
    pub fn on_observer_left(&mut self, observer: ObserverId) {
        let owned: Vec<CombatantId> = self
            .combatants
            .values()
            .filter(|c| c.controller() == observer)
            .map(Combatant::id)
            .collect();
        for id in owned {
            self.despawn_combatant(id);
        }
    }

    /// A combatant's health reached zero: release its items into the world.
    /// Droppable items linger; the rest are destroyed.
    pub fn on_depleted(&mut self, event: DepletionEvent) {
        let Some(combatant) = self.combatants.get_mut(&event.combatant) else {
            warn!("Depletion for unknown {}", event.combatant);
            return;
        };
        if !combatant.is_alive() {
            return;
        }
        combatant.mark_dead();
        info!(
            "{} died ({:?}, {:?}) to {:?}",
            event.combatant, event.part, event.attack_type, event.attacker
        );

        let position = combatant.view().position;
        for item in combatant.equipment.on_combatant_destroyed() {
            release_to_world(&mut self.world, item, position, self.now);
        }
        self.flush(None);
    }

    /// Remove a combatant and destroy everything it carried
    pub fn despawn_combatant(&mut self, id: CombatantId) -> bool {
        let Some(mut combatant) = self.combatants.remove(&id) else {
            return false;
        };
        let destroyed = combatant.equipment.on_combatant_destroyed();
        debug!("Despawned {} with {} items", id, destroyed.len());
        for event in combatant.equipment.drain_events() {
            self.publish(event, None);
        }
        self.channel
            .broadcast(Broadcast::CombatantRemoved { combatant: id }, None);
        true
    }

    /// Push every queued controller event to subscribers and observers
    fn flush(&mut self, echo: Option<Echo>) {
        let events: Vec<GameEvent> = self
            .combatants
            .values_mut()
            .flat_map(|c| c.equipment.drain_events())
            .collect();
        for event in events {
            let exclude = match (&event, echo) {
                (
                    GameEvent::EquipmentChanged {
                        combatant,
                        slot_index,
                    },
                    Some(echo),
                ) if *combatant == echo.combatant && *slot_index == echo.slot_index => {
                    Some(echo.observer)
                }
                _ => None,
            };
            self.publish(event, exclude);
        }
    }

    fn publish(&mut self, event: GameEvent, exclude: Option<ObserverId>) {
        self.bus.publish(&event);
        self.channel.broadcast(broadcast_for(event), exclude);
    }
}

/// Wire form of a game event
fn broadcast_for(event: GameEvent) -> Broadcast {
    match event {
        GameEvent::EquipmentChanged {
            combatant,
            slot_index,
        } => Broadcast::EquipmentSync {
            combatant,
            slot_index,
        },
        GameEvent::HandCleared { combatant } => Broadcast::HandCleared { combatant },
        GameEvent::AmmoChanged {
            combatant,
            item,
            current,
            reserve,
        } => Broadcast::AmmoSync {
            combatant,
            item,
            current,
            reserve,
        },
        GameEvent::ReloadStarted { combatant, item } => {
            Broadcast::ReloadStarted { combatant, item }
        }
        GameEvent::Fired {
            combatant,
            item,
            report,
        } => Broadcast::FireBroadcast {
            combatant,
            item,
            points: report.points,
            material_ids: report.material_ids,
            orientation: report.orientation,
        },
        GameEvent::ItemPickedUp {
            combatant,
            slot_index,
            snapshot,
        } => Broadcast::SlotSync {
            combatant,
            slot_index,
            occupant: Some(snapshot),
        },
        GameEvent::Thrown {
            combatant,
            item,
            charges,
        } => Broadcast::ThrowSync {
            combatant,
            item,
            charges,
        },
        GameEvent::ItemDropped {
            combatant,
            slot_index,
            ..
        } => Broadcast::SlotSync {
            combatant,
            slot_index,
            occupant: None,
        },
    }
}

fn release_to_world(world: &mut WorldItems, item: Item, position: Vec3, now: f64) {
    if item.is_droppable() {
        world.drop_item(item, position, now);
    } else {
        debug!("Destroyed non-droppable {}", item.id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hitscan::{BodyPart, HitTarget, SurfaceHit, TargetHit};
    use loadout_core::SlotKind;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingChannel {
        inbox: Vec<(ObserverId, CommandEnvelope)>,
        sent: Arc<Mutex<Vec<(Broadcast, Option<ObserverId>)>>>,
    }

    impl AuthorityChannel for RecordingChannel {
        fn poll_command(&mut self) -> Option<(ObserverId, CommandEnvelope)> {
            if self.inbox.is_empty() {
                None
            } else {
                Some(self.inbox.remove(0))
            }
        }

        fn broadcast(&self, message: Broadcast, exclude: Option<ObserverId>) {
            self.sent.lock().unwrap().push((message, exclude));
        }

        fn send_targeted(&self, _to: ObserverId, _sync: loadout_net::LateJoinSync) -> Result<(), NetError> {
            Ok(())
        }
    }

    /// Everything in front of the shooter is one victim's torso
    struct OneVictim(CombatantId);

    impl RayCaster for OneVictim {
        fn cast_ray(&self, origin: Vec3, direction: Vec3, _: f32, _: Option<CombatantId>) -> Vec<SurfaceHit> {
            vec![SurfaceHit {
                point: origin + direction * 5.0,
                normal: -direction,
                tag: "Flesh".to_string(),
                solid: false,
                target: Some(HitTarget {
                    combatant: self.0,
                    part: BodyPart::Torso,
                }),
            }]
        }
    }

    #[derive(Default)]
    struct RecordingSink(Vec<(CombatantId, TargetHit)>);

    impl DamageSink for RecordingSink {
        fn apply_damage(&mut self, attacker: CombatantId, hit: &TargetHit) {
            self.0.push((attacker, *hit));
        }
    }

    const ALICE: ObserverId = ObserverId(1);
    const BOB: ObserverId = ObserverId(2);

    fn make_session() -> (AuthoritySession<RecordingChannel>, Arc<Mutex<Vec<(Broadcast, Option<ObserverId>)>>>) {
        let channel = RecordingChannel::default();
        let sent = channel.sent.clone();
        (AuthoritySession::new(ArmoryConfig::default(), channel, 7), sent)
    }

    fn send(
        session: &mut AuthoritySession<RecordingChannel>,
        from: ObserverId,
        combatant: CombatantId,
        command: Command,
    ) -> Result<(), RejectedIntent> {
        let mut sink = RecordingSink::default();
        session.handle_command(from, CommandEnvelope::new(combatant, command), &OneVictim(CombatantId(99)), &mut sink)
    }

    #[test]
    fn test_spawn_arms_and_broadcasts() {
        let (mut session, sent) = make_session();
        let id = session.spawn_combatant(ALICE, Transform::default(), &["Rifle", "Pistol"]);

        let combatant = session.combatant(id).unwrap();
        assert_eq!(combatant.equipment.held_slot_index(), Some(0));
        assert!(combatant.equipment.owns_item_named("Pistol"));

        let sent = sent.lock().unwrap();
        assert!(matches!(sent[0].0, Broadcast::CombatantSpawned { .. }));
        assert!(matches!(
            sent.last().unwrap().0,
            Broadcast::EquipmentSync { slot_index: 0, .. }
        ));
    }

    #[test]
    fn test_take_echo_skips_requester() {
        let (mut session, sent) = make_session();
        let id = session.spawn_combatant(ALICE, Transform::default(), &["Rifle", "Pistol"]);
        sent.lock().unwrap().clear();

        send(&mut session, ALICE, id, Command::TakeItem { slot_index: 1 }).unwrap();
        let sent = sent.lock().unwrap();
        assert_eq!(
            *sent,
            vec![(Broadcast::EquipmentSync { combatant: id, slot_index: 1 }, Some(ALICE))]
        );
    }

    #[test]
    fn test_rejections_broadcast_nothing() {
        let (mut session, sent) = make_session();
        let id = session.spawn_combatant(ALICE, Transform::default(), &["Rifle"]);
        sent.lock().unwrap().clear();

        assert_eq!(
            send(&mut session, BOB, id, Command::Reload),
            Err(RejectedIntent::NotController { observer: BOB, combatant: id })
        );
        assert_eq!(
            send(&mut session, ALICE, id, Command::Reload),
            Err(RejectedIntent::MagazineFull)
        );
        assert_eq!(
            send(&mut session, ALICE, CombatantId(42), Command::Fire),
            Err(RejectedIntent::UnknownCombatant(CombatantId(42)))
        );
        assert!(sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_fire_damages_and_broadcasts() {
        let (mut session, sent) = make_session();
        let id = session.spawn_combatant(ALICE, Transform::default(), &["Rifle"]);
        sent.lock().unwrap().clear();

        let mut sink = RecordingSink::default();
        let envelope = CommandEnvelope::new(id, Command::Fire);
        session
            .handle_command(ALICE, envelope, &OneVictim(CombatantId(5)), &mut sink)
            .unwrap();

        assert_eq!(sink.0.len(), 1);
        assert_eq!(sink.0[0].0, id);
        assert_eq!(sink.0[0].1.damage, 25.0);

        let sent = sent.lock().unwrap();
        assert!(matches!(
            sent[0],
            (Broadcast::AmmoSync { current: 29, reserve: 90, .. }, None)
        ));
        assert!(matches!(
            &sent[1],
            (Broadcast::FireBroadcast { material_ids, .. }, None) if material_ids == &vec![1]
        ));
    }

    #[test]
    fn test_pickup_and_drop_through_world() {
        let (mut session, _sent) = make_session();
        let id = session.spawn_combatant(ALICE, Transform::default(), &["Rifle"]);
        let sniper = session.spawn_world_item("Sniper", Vec3::X).unwrap();
        let descriptor = session.world().get(sniper).unwrap().descriptor().clone();

        send(&mut session, ALICE, id, Command::Pickup { item: descriptor.clone(), preferred_slot_index: 1 }).unwrap();
        assert!(!session.world().contains(sniper));
        assert_eq!(
            session.combatant(id).unwrap().equipment.held_item().map(Item::id),
            Some(sniper)
        );

        // Second pickup of the same item fails: it is no longer in the world
        assert_eq!(
            send(&mut session, ALICE, id, Command::Pickup { item: descriptor, preferred_slot_index: 1 }),
            Err(RejectedIntent::UnknownItem(sniper))
        );

        send(&mut session, ALICE, id, Command::Drop { slot_index: 1 }).unwrap();
        assert!(session.world().contains(sniper));
        session.advance(15.0);
        assert!(!session.world().contains(sniper));
    }

    #[test]
    fn test_auto_reload_after_emptying_magazine() {
        let (mut session, sent) = make_session();
        let id = session.spawn_combatant(ALICE, Transform::default(), &["Sniper"]);
        for _ in 0..5 {
            send(&mut session, ALICE, id, Command::Fire).unwrap();
            session.advance(1.0);
        }
        assert!(sent
            .lock()
            .unwrap()
            .iter()
            .any(|(b, _)| matches!(b, Broadcast::ReloadStarted { .. })));

        session.advance(2.5);
        let weapon = session.combatant(id).unwrap().equipment.held_item().unwrap().weapon().unwrap().clone();
        assert_eq!(weapon.current_ammo(), 5);
        assert_eq!(weapon.reserve_ammo(), 10);
    }

    #[test]
    fn test_depletion_releases_droppable_items() {
        let (mut session, _sent) = make_session();
        let id = session.spawn_combatant(ALICE, Transform::default(), &["Rifle", "Knife"]);
        let depletion = DepletionEvent {
            combatant: id,
            part: BodyPart::Head,
            attack_type: hitscan::AttackType::Hitscan,
            attacker: None,
            force: 0.0,
        };
        session.on_depleted(depletion);
        session.on_depleted(depletion);

        assert_eq!(session.world().len(), 1);
        assert!(!session.combatant(id).unwrap().is_alive());
        assert_eq!(
            send(&mut session, ALICE, id, Command::TakeItem { slot_index: 0 }),
            Err(RejectedIntent::Dead(id))
        );
    }

    #[test]
    fn test_throw_spends_charge_and_broadcasts() {
        let (mut session, sent) = make_session();
        let id = session.spawn_combatant(ALICE, Transform::default(), &["Rifle", "Grenade"]);
        let rifle = session.combatant(id).unwrap().equipment.held_item().unwrap().id();
        assert_eq!(
            send(&mut session, ALICE, id, Command::Throw),
            Err(RejectedIntent::NotThrowable(rifle))
        );
        send(&mut session, ALICE, id, Command::TakeItem { slot_index: 3 }).unwrap();
        let grenade = session.combatant(id).unwrap().equipment.held_item().unwrap().id();
        sent.lock().unwrap().clear();

        send(&mut session, ALICE, id, Command::Throw).unwrap();
        assert_eq!(
            *sent.lock().unwrap(),
            vec![(Broadcast::ThrowSync { combatant: id, item: grenade, charges: 0 }, None)]
        );
        assert_eq!(send(&mut session, ALICE, id, Command::Throw), Err(RejectedIntent::NoCharges));
        assert_eq!(
            send(&mut session, ALICE, id, Command::TakeItem { slot_index: 0 }),
            Ok(())
        );
        assert_eq!(
            send(&mut session, ALICE, id, Command::TakeItem { slot_index: 3 }),
            Err(RejectedIntent::NotEquippable(3))
        );
    }

    #[test]
    fn test_observer_leaving_despawns_its_combatants() {
        let (mut session, sent) = make_session();
        let id = session.spawn_combatant(ALICE, Transform::default(), &["Rifle"]);
        session.spawn_combatant(BOB, Transform::default(), &[]);
        session.on_observer_left(ALICE);

        assert!(session.combatant(id).is_none());
        assert_eq!(session.combatants().count(), 1);
        assert!(session.world().is_empty());
        assert!(matches!(
            sent.lock().unwrap().last().unwrap().0,
            Broadcast::CombatantRemoved { combatant } if combatant == id
        ));
    }

    #[test]
    fn test_layout_comes_from_armory() {
        let (mut session, _sent) = make_session();
        let id = session.spawn_combatant(ALICE, Transform::default(), &[]);
        assert_eq!(
            session.combatant(id).unwrap().equipment.slot_kinds().last(),
            Some(&SlotKind::PocketItem)
        );
    }
}
