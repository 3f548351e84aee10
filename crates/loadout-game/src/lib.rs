//! Loadout Game - Equipment, weapons and hitscan for a multiplayer shooter
//!
//! Provides the per-combatant equipment controller, ranged weapon state,
//! penetrating hitscan resolution, and the authority/observer sessions that
//! replicate them over a [`loadout_net`] channel.

pub mod arena;
pub mod authority;
pub mod combatant;
pub mod config;
pub mod equipment;
pub mod error;
pub mod events;
pub mod hitscan;
pub mod item;
pub mod replica;
pub mod weapon;
pub mod world;

pub use arena::{Arena, Surface};
pub use authority::AuthoritySession;
pub use combatant::{Combatant, DamageSink, DepletionEvent};
pub use config::{
    ArchetypeKind, ArmoryConfig, ItemArchetype, RecoilConfig, ThrowableConfig,
    WeaponConfig,
};
pub use equipment::{EquipmentController, PickupOutcome, PickupRejected, Slot};
pub use error::{RejectedIntent, SessionError};
pub use events::{EventBus, GameEvent};
pub use hitscan::{
    material_id, AttackType, BodyPart, Discharge, FireReport, HitTarget, HitscanOutcome,
    RayCaster, SurfaceHit, TargetHit,
};
pub use item::{Equippable, Gun, Item, ItemKind, Meleeable, Melee, Penetrating, Perspective, Reloadable, Throwable};
pub use replica::ObserverSession;
pub use weapon::{Recoil, Role, WeaponEvent, WeaponPhase, WeaponState};
pub use world::WorldItems;
