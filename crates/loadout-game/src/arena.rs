//! Hitscan scene backed by the physics world
//!
//! The arena registers level geometry and combatant hitboxes with rapier,
//! remembers which surface each collider stands for, and answers the
//! resolver's ray queries. A shooter never hits its own hitboxes.

use std::collections::HashMap;

use glam::Vec3;
use loadout_core::CombatantId;
use loadout_physics::PhysicsWorld;
use rapier3d::prelude::{Collider, ColliderHandle, QueryFilter};
use tracing::debug;

use crate::hitscan::{BodyPart, HitTarget, RayCaster, SurfaceHit};

/// What a collider represents to the hitscan resolver
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pub tag: String,
    pub solid: bool,
    pub target: Option<HitTarget>,
}

impl Surface {
    /// Colliders registered without a surface behave like plain walls
    fn unknown() -> Self {
        Self {
            tag: String::new(),
            solid: true,
            target: None,
        }
    }
}

/// One hitbox of a combatant, positioned relative to the combatant
#[derive(Debug, Clone, Copy)]
struct Hitbox {
    collider: ColliderHandle,
    offset: Vec3,
}

/// Level geometry and combatant hitboxes
#[derive(Default)]
pub struct Arena {
    physics: PhysicsWorld,
    surfaces: HashMap<ColliderHandle, Surface>,
    hitboxes: HashMap<CombatantId, Vec<Hitbox>>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    /// Add a box of level geometry
    pub fn add_wall(&mut self, half_extents: Vec3, position: Vec3, tag: &str, solid: bool) -> ColliderHandle {
        let handle = self.physics.create_static_box(half_extents, position);
        self.surfaces.insert(
            handle,
            Surface {
                tag: tag.to_string(),
                solid,
                target: None,
            },
        );
        handle
    }

    pub fn add_ground(&mut self, y: f32, tag: &str) -> ColliderHandle {
        let handle = self.physics.create_ground(y);
        self.surfaces.insert(
            handle,
            Surface {
                tag: tag.to_string(),
                solid: true,
                target: None,
            },
        );
        handle
    }

    /// Attach a flesh hitbox to a combatant at `position + offset`
    pub fn add_hitbox(
        &mut self,
        combatant: CombatantId,
        part: BodyPart,
        half_extents: Vec3,
        position: Vec3,
        offset: Vec3,
    ) -> ColliderHandle {
        let handle = self
            .physics
            .create_hitbox(half_extents, position + offset, u128::from(combatant.0));
        self.surfaces.insert(
            handle,
            Surface {
                tag: "Flesh".to_string(),
                solid: false,
                target: Some(HitTarget { combatant, part }),
            },
        );
        self.hitboxes
            .entry(combatant)
            .or_default()
            .push(Hitbox { collider: handle, offset });
        handle
    }

    /// Move every hitbox of a combatant
    pub fn place_combatant(&mut self, combatant: CombatantId, position: Vec3) {
        let Some(hitboxes) = self.hitboxes.get(&combatant) else {
            debug!("{} has no hitboxes to move", combatant);
            return;
        };
        for hitbox in hitboxes {
            self.physics
                .set_collider_position(hitbox.collider, position + hitbox.offset);
        }
    }

    /// Remove every hitbox of a combatant
    pub fn remove_combatant(&mut self, combatant: CombatantId) {
        for hitbox in self.hitboxes.remove(&combatant).unwrap_or_default() {
            self.surfaces.remove(&hitbox.collider);
            self.physics.remove_collider(hitbox.collider);
        }
    }

    pub fn surface(&self, handle: ColliderHandle) -> Option<&Surface> {
        self.surfaces.get(&handle)
    }

    fn belongs_to(&self, handle: ColliderHandle, combatant: CombatantId) -> bool {
        self.surfaces
            .get(&handle)
            .and_then(|surface| surface.target)
            .is_some_and(|target| target.combatant == combatant)
    }
}

impl RayCaster for Arena {
    fn cast_ray(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_range: f32,
        exclude: Option<CombatantId>,
    ) -> Vec<SurfaceHit> {
        let predicate = |handle: ColliderHandle, _: &Collider| {
            exclude.map_or(true, |shooter| !self.belongs_to(handle, shooter))
        };
        let filter = QueryFilter::default().predicate(&predicate);

        self.physics
            .raycast_all(origin, direction, max_range, filter)
            .into_iter()
            .map(|hit| {
                let surface = self
                    .surfaces
                    .get(&hit.collider)
                    .cloned()
                    .unwrap_or_else(Surface::unknown);
                SurfaceHit {
                    point: hit.point,
                    normal: hit.normal,
                    tag: surface.tag,
                    solid: surface.solid,
                    target: surface.target,
                }
            })
            .collect()
    }
}
