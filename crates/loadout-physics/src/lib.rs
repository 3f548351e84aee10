//! Loadout Physics - Collision queries using rapier3d
//!
//! Owns the static level geometry and the per-combatant hitbox colliders, and
//! answers the ray queries used by hitscan resolution. Rigid-body dynamics are
//! not simulated here; hitboxes are positioned by the movement layer.

use glam::Vec3;
use nalgebra::{Isometry3, Unit};
use rapier3d::prelude::*;
use tracing::debug;

/// The collision world used for hitscan queries
pub struct PhysicsWorld {
    /// Always empty; rapier's removal and query calls still borrow it
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,

    /// Island manager (required for removals)
    island_manager: IslandManager,
    /// Query pipeline for raycasts
    query_pipeline: QueryPipeline,
}

impl PhysicsWorld {
    /// Create an empty collision world
    pub fn new() -> Self {
        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            island_manager: IslandManager::new(),
            query_pipeline: QueryPipeline::new(),
        }
    }

    /// Rebuild the query acceleration structure after colliders changed
    fn update_queries(&mut self) {
        self.query_pipeline.update(&self.collider_set);
    }

    /// Add a static collider (ground, walls, etc.)
    fn add_static_collider(&mut self, collider: Collider) -> ColliderHandle {
        let handle = self.collider_set.insert(collider);
        self.update_queries();
        handle
    }

    /// Remove a collider
    pub fn remove_collider(&mut self, handle: ColliderHandle) {
        self.collider_set
            .remove(handle, &mut self.island_manager, &mut self.rigid_body_set, true);
        self.update_queries();
    }

    /// Move a parentless collider (hitboxes follow their combatant this way)
    pub fn set_collider_position(&mut self, handle: ColliderHandle, position: Vec3) {
        if let Some(collider) = self.collider_set.get_mut(handle) {
            collider.set_position(Isometry3::translation(position.x, position.y, position.z));
            self.update_queries();
        } else {
            debug!("Ignoring move of unknown collider {:?}", handle);
        }
    }

    /// Cast a ray and collect every collider it crosses, nearest first
    pub fn raycast_all(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        filter: QueryFilter,
    ) -> Vec<RaycastHit> {
        let direction = direction.normalize_or_zero();
        if direction == Vec3::ZERO {
            return Vec::new();
        }
        let ray = make_ray(origin, direction);

        let mut hits = Vec::new();
        self.query_pipeline.intersections_with_ray(
            &self.rigid_body_set,
            &self.collider_set,
            &ray,
            max_distance,
            true,
            filter,
            |handle, intersection| {
                hits.push(self.make_hit(origin, direction, handle, intersection));
                true
            },
        );
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }

    fn make_hit(
        &self,
        origin: Vec3,
        direction: Vec3,
        handle: ColliderHandle,
        intersection: RayIntersection,
    ) -> RaycastHit {
        RaycastHit {
            collider: handle,
            distance: intersection.time_of_impact,
            point: origin + direction * intersection.time_of_impact,
            normal: Vec3::new(
                intersection.normal.x,
                intersection.normal.y,
                intersection.normal.z,
            ),
            user_data: self
                .collider_set
                .get(handle)
                .map(|collider| collider.user_data)
                .unwrap_or_default(),
        }
    }

    /// Create a ground plane collider
    pub fn create_ground(&mut self, y: f32) -> ColliderHandle {
        let normal = Unit::new_normalize(vector![0.0, 1.0, 0.0]);
        let ground = ColliderBuilder::halfspace(normal)
            .translation(vector![0.0, y, 0.0])
            .build();
        self.add_static_collider(ground)
    }

    /// Create a static box collider
    pub fn create_static_box(&mut self, half_extents: Vec3, position: Vec3) -> ColliderHandle {
        let collider = ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            .translation(vector![position.x, position.y, position.z])
            .build();
        self.add_static_collider(collider)
    }

    /// Create a movable box collider tagged with caller-defined data
    pub fn create_hitbox(&mut self, half_extents: Vec3, position: Vec3, user_data: u128) -> ColliderHandle {
        let collider = ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            .translation(vector![position.x, position.y, position.z])
            .user_data(user_data)
            .build();
        self.add_static_collider(collider)
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

fn make_ray(origin: Vec3, direction: Vec3) -> Ray {
    Ray::new(
        point![origin.x, origin.y, origin.z],
        vector![direction.x, direction.y, direction.z],
    )
}

/// Detailed raycast hit information
#[derive(Debug, Clone)]
pub struct RaycastHit {
    /// The collider that was hit
    pub collider: ColliderHandle,
    /// Distance along the ray to the hit point
    pub distance: f32,
    /// World-space hit point
    pub point: Vec3,
    /// Surface normal at hit point
    pub normal: Vec3,
    /// The collider's user data
    pub user_data: u128,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ground_blocks_downward_ray() {
        let mut world = PhysicsWorld::new();
        world.create_ground(0.0);

        let hits = world.raycast_all(
            Vec3::new(0.0, 10.0, 0.0),
            Vec3::new(0.0, -1.0, 0.0),
            100.0,
            QueryFilter::default(),
        );
        assert_eq!(hits.len(), 1);
        assert!((hits[0].distance - 10.0).abs() < 1e-4);
        assert!((hits[0].normal - Vec3::Y).length() < 1e-4);
    }

    #[test]
    fn test_removed_collider_is_not_queried() {
        let mut world = PhysicsWorld::new();
        let hitbox = world.create_hitbox(Vec3::splat(0.5), Vec3::new(0.0, 0.0, -3.0), 1);
        world.remove_collider(hitbox);
        let hits = world.raycast_all(Vec3::ZERO, -Vec3::Z, 50.0, QueryFilter::default());
        assert!(hits.is_empty());
    }

    #[test]
    fn test_zero_direction_hits_nothing() {
        let mut world = PhysicsWorld::new();
        world.create_ground(0.0);
        let hits = world.raycast_all(Vec3::new(0.0, 1.0, 0.0), Vec3::ZERO, 50.0, QueryFilter::default());
        assert!(hits.is_empty());
    }

    #[test]
    fn test_raycast_all_nearest_first() {
        let mut world = PhysicsWorld::new();
        let far = world.create_static_box(Vec3::splat(0.5), Vec3::new(0.0, 0.0, -10.0));
        let near = world.create_hitbox(Vec3::splat(0.5), Vec3::new(0.0, 0.0, -4.0), 42);

        let hits = world.raycast_all(Vec3::ZERO, -Vec3::Z, 100.0, QueryFilter::default());
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].collider, near);
        assert_eq!(hits[0].user_data, 42);
        assert_eq!(hits[1].collider, far);
        assert!((hits[0].distance - 3.5).abs() < 1e-4);
        assert!((hits[0].point - Vec3::new(0.0, 0.0, -3.5)).length() < 1e-4);
        assert!((hits[0].normal - Vec3::Z).length() < 1e-4);
    }

    #[test]
    fn test_raycast_all_respects_range() {
        let mut world = PhysicsWorld::new();
        world.create_static_box(Vec3::splat(0.5), Vec3::new(0.0, 0.0, -10.0));
        let hits = world.raycast_all(Vec3::ZERO, -Vec3::Z, 5.0, QueryFilter::default());
        assert!(hits.is_empty());
    }

    #[test]
    fn test_raycast_all_predicate_excludes() {
        let mut world = PhysicsWorld::new();
        world.create_hitbox(Vec3::splat(0.5), Vec3::new(0.0, 0.0, -2.0), 7);
        let exclude_seven = |_: ColliderHandle, collider: &Collider| collider.user_data != 7;
        let filter = QueryFilter::default().predicate(&exclude_seven);
        let hits = world.raycast_all(Vec3::ZERO, -Vec3::Z, 50.0, filter);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_moved_hitbox_is_queried_at_new_position() {
        let mut world = PhysicsWorld::new();
        let hitbox = world.create_hitbox(Vec3::splat(0.5), Vec3::new(0.0, 0.0, -3.0), 1);
        world.set_collider_position(hitbox, Vec3::new(20.0, 0.0, -3.0));
        let hits = world.raycast_all(Vec3::ZERO, -Vec3::Z, 50.0, QueryFilter::default());
        assert!(hits.is_empty());
    }
}
