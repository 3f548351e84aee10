//! Loadout - headless demo of the equipment core
//!
//! Runs a scripted match on one authority with two observers, one of which
//! joins late, and logs what each side sees.

mod settings;

use std::collections::HashMap;

use anyhow::{Context, Result};
use glam::Vec3;
use loadout_core::{CombatantId, GameTime, Transform};
use loadout_game::{
    Arena, AuthoritySession, BodyPart, DamageSink, DepletionEvent, GameEvent, ObserverSession,
    SessionError, TargetHit,
};
use loadout_net::{AuthorityEndpoint, LocalHub, ObserverChannel, ObserverEndpoint};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::settings::Settings;

/// Health bookkeeping standing in for the game's health system
struct HealthLedger {
    health: HashMap<CombatantId, f32>,
    depleted: Vec<DepletionEvent>,
}

impl HealthLedger {
    fn new() -> Self {
        Self {
            health: HashMap::new(),
            depleted: Vec::new(),
        }
    }

    fn track(&mut self, combatant: CombatantId, health: f32) {
        self.health.insert(combatant, health);
    }
}

impl DamageSink for HealthLedger {
    fn apply_damage(&mut self, attacker: CombatantId, hit: &TargetHit) {
        let Some(health) = self.health.get_mut(&hit.target.combatant) else {
            return;
        };
        if *health <= 0.0 {
            return;
        }
        *health -= hit.damage;
        info!(
            "{} hit {} ({:?}) for {:.1}, {:.1} left",
            attacker, hit.target.combatant, hit.target.part, hit.damage, health.max(0.0)
        );
        if *health <= 0.0 {
            self.depleted.push(DepletionEvent {
                combatant: hit.target.combatant,
                part: hit.target.part,
                attack_type: hit.attack_type,
                attacker: Some(attacker),
                force: hit.damage,
            });
        }
    }
}

fn build_arena(shooter: CombatantId, target: CombatantId) -> Arena {
    let mut arena = Arena::new();
    arena.add_ground(0.0, "Concrete");
    arena.add_wall(Vec3::new(6.0, 3.0, 0.25), Vec3::new(0.0, 1.5, -20.0), "Concrete", true);
    arena.add_wall(Vec3::new(0.6, 1.0, 0.05), Vec3::new(0.0, 1.6, -4.0), "Wood", false);
    let half = Vec3::new(0.3, 0.8, 0.3);
    arena.add_hitbox(shooter, BodyPart::Torso, half, Vec3::new(0.0, 1.0, 0.0), Vec3::ZERO);
    arena.add_hitbox(target, BodyPart::Torso, half, Vec3::new(0.0, 1.0, -8.0), Vec3::ZERO);
    arena
}

fn log_view(name: &str, observer: &ObserverSession<ObserverEndpoint>, combatant: CombatantId) {
    let Some(controller) = observer.combatant(combatant) else {
        info!("{} does not know {}", name, combatant);
        return;
    };
    let items: Vec<String> = controller
        .slots()
        .iter()
        .map(|slot| slot.occupant().map_or("-".to_string(), |item| item.name().to_string()))
        .collect();
    let ammo = controller
        .held_item()
        .and_then(|item| item.weapon())
        .map(|w| format!("{}/{}", w.current_ammo(), w.reserve_ammo()))
        .unwrap_or_else(|| "n/a".to_string());
    info!(
        "{} sees {}: slots [{}], holding {:?}, ammo {}",
        name,
        combatant,
        items.join(", "),
        controller.held_slot_index(),
        ammo
    );
}

fn step_observer(observer: &mut ObserverSession<ObserverEndpoint>, dt: f32) {
    observer.sync();
    observer.advance(dt);
}

fn main() -> Result<()> {
    let (settings, outcome) = Settings::load();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.demo.log_filter));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")?;
    outcome.report();

    if std::env::args().any(|arg| arg == "--write-settings") {
        let path = settings.save()?;
        info!("Wrote settings to {:?}", path);
        return Ok(());
    }

    info!("Starting Loadout demo...");
    let (hub, endpoint) = LocalHub::new();
    let mut authority: AuthoritySession<AuthorityEndpoint> =
        AuthoritySession::new(settings.armory.clone(), endpoint, settings.demo.seed);

    let shooter_endpoint = hub.connect();
    let shooter_id = shooter_endpoint.id();
    let mut shooter = ObserverSession::new(settings.armory.clone(), shooter_endpoint, 1);
    authority.on_observer_joined(shooter_id)?;
    authority.subscribe(|event| debug!("[authority] {} {:?}", event.combatant(), event));

    shooter.subscribe(|event| {
        if let GameEvent::Fired { report, .. } = event {
            let impacts: Vec<_> = report.impacts().collect();
            debug!("Replaying shot: {} points, impacts {:?}", report.points.len(), impacts);
        }
    });

    let eye = Vec3::new(0.0, 1.6, 0.0);
    let view = Transform::looking_at(eye, eye + Vec3::NEG_Z);
    let hero = authority.spawn_combatant(shooter_id, view, &["Rifle", "Pistol", "Knife"]);
    let dummy = authority.spawn_combatant(hub.connect().id(), Transform::default(), &["Pistol"]);
    authority.spawn_world_item("Sniper", Vec3::new(1.0, 0.0, -1.0));
    authority.spawn_world_item("Grenade", Vec3::new(-1.0, 0.0, -1.0));
    shooter.control(hero);

    let arena = build_arena(hero, dummy);
    let mut ledger = HealthLedger::new();
    ledger.track(hero, settings.demo.health);
    ledger.track(dummy, settings.demo.health);

    let mut time = GameTime::new(settings.time.clone());
    let dt = time.step();
    if dt <= 0.0 {
        anyhow::bail!("fixed_timestep must be positive, got {}", dt);
    }
    let frame_time = settings.demo.frame_time.max(dt);
    let ticks = (settings.demo.duration / dt).ceil() as u64;
    let mut late_joiner: Option<ObserverSession<ObserverEndpoint>> = None;

    while time.tick() < ticks {
        for _ in 0..time.accumulate(frame_time) {
            if time.tick() >= ticks {
                break;
            }
            let tick = time.advance_tick();

            let intent = match tick {
                60 => shooter.take_item(1),
                90 => shooter.take_item(0),
                150 => shooter.reload(),
                200 => {
                    let grenades: Vec<_> = authority
                        .world()
                        .descriptors()
                        .filter(|item| item.name == "Grenade")
                        .cloned()
                        .collect();
                    grenades
                        .into_iter()
                        .try_for_each(|item| shooter.pickup(item, 3))
                }
                230 => shooter.throw_item(),
                260 => shooter.drop_item(1),
                300 => {
                    let endpoint = hub.connect();
                    authority.on_observer_joined(endpoint.id())?;
                    late_joiner = Some(ObserverSession::new(settings.armory.clone(), endpoint, 3));
                    Ok(())
                }
                t if t % 6 == 0 && t < 200 => shooter.fire(),
                _ => Ok(()),
            };
            match intent {
                Ok(()) | Err(SessionError::Rejected(_)) => {}
                Err(e) => return Err(e).context("Failed to send intent"),
            }

            authority.process_commands(&arena, &mut ledger);
            for depletion in ledger.depleted.drain(..) {
                authority.on_depleted(depletion);
            }
            authority.advance(dt);

            step_observer(&mut shooter, dt);
            if let Some(observer) = late_joiner.as_mut() {
                step_observer(observer, dt);
            }
        }
    }

    info!("Simulated {:.2}s over {} ticks", time.total_time(), time.tick());
    log_view("shooter", &shooter, hero);
    if let Some(observer) = &late_joiner {
        log_view("late joiner", observer, hero);
        log_view("late joiner", observer, dummy);
    }
    if let Some(combatant) = authority.combatant(dummy) {
        info!("{} alive: {}", dummy, combatant.is_alive());
    }
    info!("{} items lying in the world", authority.world().len());
    Ok(())
}
