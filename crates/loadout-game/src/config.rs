//! Armory configuration
//!
//! Slot layout and item archetypes. Loaded from the `[armory]` table of the
//! settings file; every field has a default so partial files work.

use loadout_core::SlotKind;
use serde::{Deserialize, Serialize};

/// Seconds a dropped item stays in the world before it despawns
pub const DEFAULT_DROPPED_ITEM_LIFETIME: f32 = 15.0;

/// Slot layout and item catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmoryConfig {
    /// Ordered slot kinds every combatant spawns with
    pub slots: Vec<SlotKind>,
    /// Every item kind that can exist in the world
    pub items: Vec<ItemArchetype>,
    /// Seconds before an unclaimed dropped item is removed
    pub dropped_item_lifetime: f32,
}

impl Default for ArmoryConfig {
    fn default() -> Self {
        Self {
            slots: vec![
                SlotKind::Normal,
                SlotKind::Normal,
                SlotKind::Normal,
                SlotKind::PocketItem,
            ],
            items: vec![
                ItemArchetype::gun("Rifle", WeaponConfig::default()),
                ItemArchetype::gun(
                    "Pistol",
                    WeaponConfig {
                        magazine_capacity: 12,
                        starting_reserve: 36,
                        reload_duration: 1.2,
                        fire_interval: 0.25,
                        penetration: 1,
                        base_damage: 20.0,
                        ..Default::default()
                    },
                ),
                ItemArchetype::gun(
                    "Sniper",
                    WeaponConfig {
                        magazine_capacity: 5,
                        starting_reserve: 15,
                        reload_duration: 2.5,
                        fire_interval: 1.0,
                        penetration: 3,
                        base_damage: 90.0,
                        max_range: 500.0,
                        recoil: RecoilConfig {
                            min_angle: 0.0,
                            max_angle: 4.0,
                            kick_per_shot: 4.0,
                            stabilization_speed: 3.0,
                        },
                    },
                ),
                ItemArchetype {
                    name: "Knife".to_string(),
                    slot_kind: SlotKind::Normal,
                    pickupable: true,
                    droppable: false,
                    kind: ArchetypeKind::Melee,
                },
                ItemArchetype {
                    name: "Grenade".to_string(),
                    slot_kind: SlotKind::PocketItem,
                    pickupable: true,
                    droppable: true,
                    kind: ArchetypeKind::Throwable(ThrowableConfig::default()),
                },
            ],
            dropped_item_lifetime: DEFAULT_DROPPED_ITEM_LIFETIME,
        }
    }
}

impl ArmoryConfig {
    /// Look up an archetype by item name
    pub fn archetype(&self, name: &str) -> Option<&ItemArchetype> {
        self.items.iter().find(|a| a.name == name)
    }
}

/// Static description of one kind of item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemArchetype {
    /// Identity used by the duplicate-ownership guard
    pub name: String,
    /// Which slot kind accepts this item
    pub slot_kind: SlotKind,
    #[serde(default = "default_true")]
    pub pickupable: bool,
    #[serde(default = "default_true")]
    pub droppable: bool,
    pub kind: ArchetypeKind,
}

fn default_true() -> bool {
    true
}

impl ItemArchetype {
    /// A pickup-able, droppable gun for a normal slot
    pub fn gun(name: impl Into<String>, weapon: WeaponConfig) -> Self {
        Self {
            name: name.into(),
            slot_kind: SlotKind::Normal,
            pickupable: true,
            droppable: true,
            kind: ArchetypeKind::Gun(weapon),
        }
    }
}

/// Capability set of an archetype
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ArchetypeKind {
    Gun(WeaponConfig),
    Melee,
    Throwable(ThrowableConfig),
}

/// Immutable ranged-weapon parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponConfig {
    /// Rounds a full magazine holds
    pub magazine_capacity: u32,
    /// Backup rounds the weapon spawns with
    pub starting_reserve: u32,
    /// Seconds from reload start to completion
    pub reload_duration: f32,
    /// Minimum seconds between discharges
    pub fire_interval: f32,
    /// Surfaces one trace may process; 0 makes every shot a miss
    pub penetration: usize,
    /// Damage dealt to the first surface hit
    pub base_damage: f32,
    /// Trace length in world units
    pub max_range: f32,
    pub recoil: RecoilConfig,
}

impl Default for WeaponConfig {
    fn default() -> Self {
        Self {
            magazine_capacity: 30,
            starting_reserve: 90,
            reload_duration: 1.5,
            fire_interval: 0.1,
            penetration: 2,
            base_damage: 25.0,
            max_range: 250.0,
            recoil: RecoilConfig::default(),
        }
    }
}

/// Recoil cone parameters, in degrees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoilConfig {
    /// Spread while fully stabilised
    pub min_angle: f32,
    /// Spread ceiling
    pub max_angle: f32,
    /// Spread added per discharge
    pub kick_per_shot: f32,
    /// Degrees per second recovered while held
    pub stabilization_speed: f32,
}

impl Default for RecoilConfig {
    fn default() -> Self {
        Self {
            min_angle: 0.5,
            max_angle: 3.0,
            kick_per_shot: 0.4,
            stabilization_speed: 6.0,
        }
    }
}

/// Throwable parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrowableConfig {
    /// Throws before the item is spent
    pub charges: u32,
}

impl Default for ThrowableConfig {
    fn default() -> Self {
        Self { charges: 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let config = ArmoryConfig::default();
        assert_eq!(config.slots.len(), 4);
        assert_eq!(config.slots[3], SlotKind::PocketItem);
    }

    #[test]
    fn test_archetype_lookup() {
        let config = ArmoryConfig::default();
        assert!(matches!(
            config.archetype("Rifle").map(|a| &a.kind),
            Some(ArchetypeKind::Gun(_))
        ));
        assert!(!config.archetype("Knife").unwrap().droppable);
        assert!(config.archetype("Railgun").is_none());
    }

    #[test]
    fn test_names_are_unique() {
        let config = ArmoryConfig::default();
        for (i, a) in config.items.iter().enumerate() {
            for b in &config.items[i + 1..] {
                assert_ne!(a.name, b.name);
            }
        }
    }
}
