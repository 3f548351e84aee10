//! Loadout Core - Core types and utilities for the Loadout equipment core
//!
//! This crate provides the foundational types used throughout the workspace:
//! - Mathematical primitives (re-exported from glam)
//! - Network ids for combatants, items, and observers
//! - Item descriptors and slot kinds shared by the game and wire layers
//! - Transform component for view and fire-point positioning
//! - Fixed-step game time and cancellable scheduled tasks

pub mod schedule;
pub mod time;
pub mod types;

pub use glam::{Quat, Vec3};
pub use schedule::{ScheduledTask, TaskId, TaskSlot};
pub use time::{GameTime, TimeConfig};
pub use types::{CombatantId, ItemId, ItemRef, ObserverId, SessionId, SlotKind, Transform};
