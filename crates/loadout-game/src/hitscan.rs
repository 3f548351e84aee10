//! Penetrating hitscan resolution
//!
//! A discharge traces one ray through the scene, processes up to the
//! weapon's penetration limit of surfaces nearest-first, stops at the first
//! solid one, and reports damage for every combatant part it passed through.
//! Damage falls off as `base / (index + 1)`. A trace that processes nothing,
//! because it hit nothing or its limit is zero, is reported as a miss.

use glam::{Quat, Vec3};
use loadout_core::CombatantId;
use serde::{Deserialize, Serialize};

/// Damaged region of a combatant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyPart {
    Head,
    Torso,
    Limb,
}

/// Combatant body part attached to a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HitTarget {
    pub combatant: CombatantId,
    pub part: BodyPart,
}

/// How damage was delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttackType {
    /// First surface of a trace
    Hitscan,
    /// Any surface after the first
    HitscanPenetrated,
}

impl AttackType {
    pub fn for_index(index: usize) -> Self {
        if index == 0 {
            Self::Hitscan
        } else {
            Self::HitscanPenetrated
        }
    }
}

/// One ray intersection as seen by the resolver
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceHit {
    pub point: Vec3,
    pub normal: Vec3,
    /// Material tag, e.g. "Flesh" or "Wood"
    pub tag: String,
    /// Solid surfaces stop the trace after being processed
    pub solid: bool,
    pub target: Option<HitTarget>,
}

/// Scene query used by the resolver
pub trait RayCaster {
    /// All intersections along the ray, ordered nearest-first. Surfaces
    /// belonging to `exclude` are skipped.
    fn cast_ray(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_range: f32,
        exclude: Option<CombatantId>,
    ) -> Vec<SurfaceHit>;
}

/// Damage owed to one combatant part
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetHit {
    pub target: HitTarget,
    pub damage: f32,
    /// Position of the surface in the processed sequence
    pub index: usize,
    pub attack_type: AttackType,
}

/// Visual record of a discharge, replayed on every observer
#[derive(Debug, Clone, PartialEq)]
pub struct FireReport {
    /// Processed impact points, or a single far point when nothing was processed
    pub points: Vec<Vec3>,
    /// Material id per processed impact; empty when nothing was hit
    pub material_ids: Vec<u8>,
    /// Rotates forward onto the first impact normal
    pub orientation: Quat,
}

impl FireReport {
    pub fn is_miss(&self) -> bool {
        self.material_ids.is_empty()
    }

    /// Impact points paired with their material ids
    pub fn impacts(&self) -> impl Iterator<Item = (Vec3, u8)> + '_ {
        self.points.iter().copied().zip(self.material_ids.iter().copied())
    }
}

/// Everything one discharge produced
#[derive(Debug, Clone, PartialEq)]
pub struct HitscanOutcome {
    pub report: FireReport,
    pub target_hits: Vec<TargetHit>,
}

/// Parameters of one trace
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Discharge {
    /// Firing combatant; its own hitboxes are ignored
    pub shooter: CombatantId,
    pub origin: Vec3,
    pub direction: Vec3,
    pub max_range: f32,
    pub penetration: usize,
    pub base_damage: f32,
}

/// Stable material classification of a surface tag
pub fn material_id(tag: &str) -> u8 {
    match tag {
        "Flesh" => 1,
        "Wood" => 2,
        _ => 0,
    }
}

/// Resolve one discharge against the scene
pub fn resolve(caster: &dyn RayCaster, discharge: &Discharge) -> HitscanOutcome {
    let direction = discharge.direction.try_normalize().unwrap_or(Vec3::NEG_Z);
    let mut hits = caster.cast_ray(
        discharge.origin,
        direction,
        discharge.max_range,
        Some(discharge.shooter),
    );
    // Ordering is by distance from the muzzle regardless of the caster
    hits.sort_by(|a, b| {
        let da = a.point.distance_squared(discharge.origin);
        let db = b.point.distance_squared(discharge.origin);
        da.total_cmp(&db)
    });

    let mut points = Vec::new();
    let mut material_ids = Vec::new();
    let mut target_hits = Vec::new();

    for (index, hit) in hits.iter().take(discharge.penetration).enumerate() {
        points.push(hit.point);
        material_ids.push(material_id(&hit.tag));
        if let Some(target) = hit.target {
            target_hits.push(TargetHit {
                target,
                damage: discharge.base_damage / (index + 1) as f32,
                index,
                attack_type: AttackType::for_index(index),
            });
        }
        if hit.solid {
            break;
        }
    }

    if points.is_empty() {
        return HitscanOutcome {
            report: FireReport {
                points: vec![discharge.origin + direction * discharge.max_range],
                material_ids,
                orientation: Quat::IDENTITY,
            },
            target_hits,
        };
    }

    let normal = hits[0].normal.normalize_or_zero();
    let orientation = if normal == Vec3::ZERO {
        Quat::IDENTITY
    } else {
        Quat::from_rotation_arc(Vec3::NEG_Z, normal)
    };

    HitscanOutcome {
        report: FireReport {
            points,
            material_ids,
            orientation,
        },
        target_hits,
    }
}
