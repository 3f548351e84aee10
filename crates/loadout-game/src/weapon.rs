//! Ranged weapon state
//!
//! Magazine and reserve counters, the reload phase machine, fire cooldown
//! and recoil for one gun instance.
//!
//! ```text
//! Idle --request_reload--> Reloading --timer elapses--> Idle (authority: ammo transferred)
//!   ^                          |
//!   +------cancel_reload-------+   (put-down, drop, death, ammo sync on observers)
//! ```
//!
//! On the authority the reload completion transfers ammunition. On an
//! observer the local timer only ends the phase; the counters move when the
//! authority's ammo sync arrives.

use glam::{Quat, Vec3};
use loadout_core::TaskSlot;
use loadout_net::AmmoSnapshot;
use rand::Rng;

use crate::config::{RecoilConfig, WeaponConfig};
use crate::error::RejectedIntent;

/// Who is driving a piece of state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Decisions here are final and get broadcast
    Authority,
    /// Local, optimistic effects that the authority may overwrite
    Prediction,
}

/// Reload phase of a weapon
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeaponPhase {
    Idle,
    Reloading {
        /// Simulation time the reload began
        started_at: f64,
        /// Seconds until completion
        remaining: f32,
    },
}

/// Local observation produced by a weapon, drained by its controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeaponEvent {
    AmmoChanged { current: u32, reserve: u32 },
    ReloadStarted,
}

/// Current aim spread, in degrees
#[derive(Debug, Clone)]
pub struct Recoil {
    config: RecoilConfig,
    current: f32,
}

impl Recoil {
    pub fn new(config: RecoilConfig) -> Self {
        let current = config.min_angle;
        Self { config, current }
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    /// Widen the cone after a discharge
    pub fn kick(&mut self) {
        self.current = (self.current + self.config.kick_per_shot).min(self.config.max_angle);
    }

    /// Recover towards the minimum spread
    pub fn stabilize(&mut self, dt: f32) {
        self.current =
            (self.current - self.config.stabilization_speed * dt).max(self.config.min_angle);
    }

    pub fn reset(&mut self) {
        self.current = self.config.min_angle;
    }

    /// Deflect a normalized aim direction by a random angle inside the cone
    pub fn apply(&self, direction: Vec3, rng: &mut impl Rng) -> Vec3 {
        if self.current <= 0.0 {
            return direction;
        }
        let spread = self.current.to_radians();
        let (a, b) = direction.any_orthonormal_pair();
        let pitch = Quat::from_axis_angle(a, rng.gen_range(-spread..=spread));
        let yaw = Quat::from_axis_angle(b, rng.gen_range(-spread..=spread));
        (yaw * pitch * direction).normalize()
    }
}

/// Per-instance ranged weapon state
#[derive(Debug, Clone)]
pub struct WeaponState {
    config: WeaponConfig,
    current_ammo: u32,
    reserve_ammo: u32,
    reload: TaskSlot,
    cooldown: TaskSlot,
    recoil: Recoil,
    events: Vec<WeaponEvent>,
}

impl WeaponState {
    /// A weapon with a full magazine and its starting reserve
    pub fn new(config: WeaponConfig) -> Self {
        let current = config.magazine_capacity;
        let reserve = config.starting_reserve;
        Self::with_ammo(config, current, reserve)
    }

    /// A weapon with explicit counters; `current` is clamped to the magazine
    pub fn with_ammo(config: WeaponConfig, current: u32, reserve: u32) -> Self {
        let recoil = Recoil::new(config.recoil.clone());
        Self {
            current_ammo: current.min(config.magazine_capacity),
            reserve_ammo: reserve,
            config,
            reload: TaskSlot::new(),
            cooldown: TaskSlot::new(),
            recoil,
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &WeaponConfig {
        &self.config
    }

    pub fn current_ammo(&self) -> u32 {
        self.current_ammo
    }

    pub fn reserve_ammo(&self) -> u32 {
        self.reserve_ammo
    }

    pub fn magazine_capacity(&self) -> u32 {
        self.config.magazine_capacity
    }

    pub fn recoil(&self) -> &Recoil {
        &self.recoil
    }

    pub fn phase(&self) -> WeaponPhase {
        match self.reload.pending() {
            Some(task) => WeaponPhase::Reloading {
                started_at: task.started_at,
                remaining: task.remaining(),
            },
            None => WeaponPhase::Idle,
        }
    }

    pub fn is_reloading(&self) -> bool {
        self.reload.is_pending()
    }

    pub fn snapshot(&self) -> AmmoSnapshot {
        AmmoSnapshot {
            current: self.current_ammo,
            reserve: self.reserve_ammo,
        }
    }

    /// Why the weapon cannot discharge right now, if anything prevents it.
    /// `melee_in_progress` is supplied by the owning item.
    pub fn check_fire(&self, melee_in_progress: bool) -> Result<(), RejectedIntent> {
        if self.is_reloading() {
            return Err(RejectedIntent::Reloading);
        }
        if self.current_ammo == 0 {
            return Err(RejectedIntent::OutOfAmmo);
        }
        if melee_in_progress {
            return Err(RejectedIntent::MeleeInProgress);
        }
        if self.cooldown.is_pending() {
            return Err(RejectedIntent::CoolingDown);
        }
        Ok(())
    }

    pub fn can_fire(&self, melee_in_progress: bool) -> bool {
        self.check_fire(melee_in_progress).is_ok()
    }

    /// Spend one round. Fire never interrupts a reload.
    pub fn fire(&mut self, now: f64, melee_in_progress: bool) -> Result<(), RejectedIntent> {
        self.check_fire(melee_in_progress)?;
        self.current_ammo -= 1;
        if self.config.fire_interval > 0.0 {
            self.cooldown.schedule(now, self.config.fire_interval);
        }
        self.recoil.kick();
        self.push_ammo_changed();
        Ok(())
    }

    /// Why a reload cannot start right now, if anything prevents it
    pub fn check_reload(&self) -> Result<(), RejectedIntent> {
        if self.is_reloading() {
            return Err(RejectedIntent::Reloading);
        }
        if self.current_ammo >= self.config.magazine_capacity {
            return Err(RejectedIntent::MagazineFull);
        }
        if self.reserve_ammo == 0 {
            return Err(RejectedIntent::NoReserve);
        }
        Ok(())
    }

    /// Enter the reloading phase if the magazine is not full and reserve remains
    pub fn request_reload(&mut self, now: f64) -> Result<(), RejectedIntent> {
        self.check_reload()?;
        self.begin_reload(now);
        Ok(())
    }

    /// Start the reload phase unconditionally. Used to mirror an authoritative
    /// reload on observers, whose counters may lag behind.
    pub fn begin_reload(&mut self, now: f64) {
        self.reload.schedule(now, self.config.reload_duration);
        self.recoil.reset();
        self.events.push(WeaponEvent::ReloadStarted);
    }

    /// Move `min(capacity - current, reserve)` rounds from reserve to magazine
    /// and return to idle.
    pub fn complete_reload(&mut self) {
        self.reload.cancel();
        let needed = self.config.magazine_capacity.saturating_sub(self.current_ammo);
        let transferred = needed.min(self.reserve_ammo);
        self.current_ammo += transferred;
        self.reserve_ammo -= transferred;
        self.push_ammo_changed();
    }

    /// Abort an in-progress reload without transferring ammunition.
    /// Returns whether a reload was pending.
    pub fn cancel_reload(&mut self) -> bool {
        self.reload.cancel().is_some()
    }

    /// Holstering cancels the reload and clears the fire cooldown
    pub fn put_down(&mut self) {
        self.cancel_reload();
        self.cooldown.cancel();
    }

    /// Authority: magazine empty, reserve left and not already reloading
    pub fn needs_auto_reload(&self) -> bool {
        self.current_ammo == 0 && self.reserve_ammo > 0 && !self.is_reloading()
    }

    /// Tick timers. A reload that comes due completes with a transfer on the
    /// authority and just ends the local phase under prediction.
    /// Returns whether a reload came due.
    pub fn advance(&mut self, dt: f32, role: Role) -> bool {
        self.cooldown.advance(dt);
        if self.reload.advance(dt).is_none() {
            return false;
        }
        if role == Role::Authority {
            self.complete_reload();
        }
        true
    }

    /// Let the spread settle back towards its resting angle
    pub fn stabilize_recoil(&mut self, dt: f32) {
        self.recoil.stabilize(dt);
    }

    /// Overwrite the counters with authoritative values and end any local
    /// reload phase.
    pub fn apply_ammo_sync(&mut self, current: u32, reserve: u32) {
        self.reload.cancel();
        self.current_ammo = current.min(self.config.magazine_capacity);
        self.reserve_ammo = reserve;
        self.push_ammo_changed();
    }

    pub fn drain_events(&mut self) -> Vec<WeaponEvent> {
        std::mem::take(&mut self.events)
    }

    fn push_ammo_changed(&mut self) {
        self.events.push(WeaponEvent::AmmoChanged {
            current: self.current_ammo,
            reserve: self.reserve_ammo,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn make_weapon(current: u32, reserve: u32) -> WeaponState {
        WeaponState::with_ammo(WeaponConfig::default(), current, reserve)
    }

    #[test]
    fn test_reload_tops_up_magazine() {
        let mut weapon = make_weapon(10, 30);
        weapon.request_reload(0.0).unwrap();
        assert!(weapon.advance(1.5, Role::Authority));
        assert_eq!(weapon.current_ammo(), 30);
        assert_eq!(weapon.reserve_ammo(), 10);
        assert_eq!(weapon.phase(), WeaponPhase::Idle);
    }

    #[test]
    fn test_reload_limited_by_reserve() {
        let mut weapon = make_weapon(0, 5);
        weapon.request_reload(0.0).unwrap();
        weapon.advance(2.0, Role::Authority);
        assert_eq!(weapon.current_ammo(), 5);
        assert_eq!(weapon.reserve_ammo(), 0);
    }

    #[test]
    fn test_reload_conserves_rounds() {
        for (current, reserve) in [(0, 0), (3, 100), (29, 1), (12, 7)] {
            let mut weapon = make_weapon(current, reserve);
            let before = weapon.current_ammo() + weapon.reserve_ammo();
            weapon.complete_reload();
            assert_eq!(weapon.current_ammo() + weapon.reserve_ammo(), before);
            assert!(weapon.current_ammo() <= weapon.magazine_capacity());
        }
    }

    #[test]
    fn test_fire_empty_magazine_is_noop() {
        let mut weapon = make_weapon(0, 30);
        assert_eq!(weapon.fire(0.0, false), Err(RejectedIntent::OutOfAmmo));
        assert_eq!(weapon.current_ammo(), 0);
        assert!(weapon.drain_events().is_empty());
    }

    #[test]
    fn test_fire_spends_one_round() {
        let mut weapon = make_weapon(3, 0);
        weapon.fire(0.0, false).unwrap();
        assert_eq!(weapon.current_ammo(), 2);
        assert_eq!(
            weapon.drain_events(),
            vec![WeaponEvent::AmmoChanged { current: 2, reserve: 0 }]
        );
    }

    #[test]
    fn test_fire_cooldown() {
        let mut weapon = make_weapon(30, 0);
        weapon.fire(0.0, false).unwrap();
        assert_eq!(weapon.fire(0.0, false), Err(RejectedIntent::CoolingDown));
        weapon.advance(0.1, Role::Authority);
        assert!(weapon.fire(0.1, false).is_ok());
    }

    #[test]
    fn test_fire_blocked_by_melee_and_reload() {
        let mut weapon = make_weapon(10, 30);
        assert_eq!(weapon.fire(0.0, true), Err(RejectedIntent::MeleeInProgress));
        weapon.request_reload(0.0).unwrap();
        assert_eq!(weapon.fire(0.0, false), Err(RejectedIntent::Reloading));
        assert!(weapon.is_reloading());
    }

    #[test]
    fn test_reload_rejections() {
        assert_eq!(make_weapon(30, 30).request_reload(0.0), Err(RejectedIntent::MagazineFull));
        assert_eq!(make_weapon(5, 0).request_reload(0.0), Err(RejectedIntent::NoReserve));

        let mut weapon = make_weapon(5, 30);
        weapon.request_reload(0.0).unwrap();
        assert_eq!(weapon.request_reload(0.5), Err(RejectedIntent::Reloading));
    }

    #[test]
    fn test_cancelled_reload_never_transfers() {
        let mut weapon = make_weapon(10, 30);
        weapon.request_reload(0.0).unwrap();
        weapon.advance(1.0, Role::Authority);
        weapon.put_down();
        assert!(!weapon.advance(5.0, Role::Authority));
        assert_eq!(weapon.current_ammo(), 10);
        assert_eq!(weapon.reserve_ammo(), 30);
    }

    #[test]
    fn test_predicted_reload_does_not_transfer() {
        let mut weapon = make_weapon(10, 30);
        weapon.request_reload(0.0).unwrap();
        assert!(weapon.advance(2.0, Role::Prediction));
        assert!(!weapon.is_reloading());
        assert_eq!(weapon.current_ammo(), 10);

        weapon.apply_ammo_sync(30, 10);
        assert_eq!(weapon.current_ammo(), 30);
        assert_eq!(weapon.reserve_ammo(), 10);
    }

    #[test]
    fn test_ammo_sync_ends_local_reload() {
        let mut weapon = make_weapon(0, 30);
        weapon.begin_reload(0.0);
        weapon.apply_ammo_sync(30, 0);
        assert_eq!(weapon.phase(), WeaponPhase::Idle);
    }

    #[test]
    fn test_needs_auto_reload() {
        assert!(make_weapon(0, 1).needs_auto_reload());
        assert!(!make_weapon(0, 0).needs_auto_reload());
        assert!(!make_weapon(1, 10).needs_auto_reload());
    }

    #[test]
    fn test_recoil_kick_and_recovery() {
        let mut weapon = make_weapon(30, 0);
        let rest = weapon.recoil().current();
        weapon.fire(0.0, false).unwrap();
        let kicked = weapon.recoil().current();
        assert!(kicked > rest);
        weapon.advance(10.0, Role::Authority);
        assert_eq!(weapon.recoil().current(), kicked);
        weapon.stabilize_recoil(10.0);
        assert_eq!(weapon.recoil().current(), rest);
    }

    #[test]
    fn test_recoil_stays_inside_cone() {
        let mut recoil = Recoil::new(RecoilConfig {
            min_angle: 2.0,
            ..Default::default()
        });
        recoil.kick();
        let mut rng = StdRng::seed_from_u64(7);
        let aim = Vec3::NEG_Z;
        for _ in 0..32 {
            let deflected = recoil.apply(aim, &mut rng);
            let angle = aim.angle_between(deflected).to_degrees();
            assert!(angle <= recoil.current() * 1.5 + 1e-3);
        }
    }
}
