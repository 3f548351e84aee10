use loadout_core::{CombatantId, ItemId, ObserverId, SlotKind};
use loadout_net::NetError;
use thiserror::Error;

/// Why an intent was discarded.
///
/// Rejections are values, not failures: the intent is dropped, state is left
/// unchanged and nothing is broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectedIntent {
    #[error("slot index {0} is out of range")]
    InvalidSlot(i32),

    #[error("combatant has no slots")]
    NoSlots,

    #[error("slot {0} already holds the item in hand")]
    AlreadyHeld(usize),

    #[error("pocket slot {0} is empty")]
    EmptyPocketSlot(usize),

    #[error("item in slot {0} cannot be equipped right now")]
    NotEquippable(usize),

    #[error("slot {0} is empty")]
    EmptySlot(usize),

    #[error("{0} cannot be picked up")]
    NotPickupable(ItemId),

    #[error("an item named '{0}' is already owned")]
    AlreadyOwned(String),

    #[error("no {} slot exists", .0.name())]
    NoMatchingSlot(SlotKind),

    #[error("{0} cannot be dropped")]
    NotDroppable(ItemId),

    #[error("nothing is held")]
    NothingHeld,

    #[error("{0} is not a ranged weapon")]
    NotAWeapon(ItemId),

    #[error("{0} cannot be thrown")]
    NotThrowable(ItemId),

    #[error("no charges left")]
    NoCharges,

    #[error("magazine is empty")]
    OutOfAmmo,

    #[error("weapon is reloading")]
    Reloading,

    #[error("weapon is cooling down")]
    CoolingDown,

    #[error("weapon is blocked by a melee attack")]
    MeleeInProgress,

    #[error("magazine is already full")]
    MagazineFull,

    #[error("no reserve ammunition")]
    NoReserve,

    #[error("{0} is dead")]
    Dead(CombatantId),

    #[error("unknown {0}")]
    UnknownCombatant(CombatantId),

    #[error("{observer} does not control {combatant}")]
    NotController {
        observer: ObserverId,
        combatant: CombatantId,
    },

    #[error("{0} is not in the world")]
    UnknownItem(ItemId),

    #[error("equipment has been destroyed")]
    Destroyed,
}

/// Failure of an observer-side action
#[derive(Debug, Error)]
pub enum SessionError {
    /// Refused locally; nothing was sent
    #[error(transparent)]
    Rejected(#[from] RejectedIntent),

    #[error(transparent)]
    Net(#[from] NetError),

    #[error("no combatant is under local control")]
    NoControlledCombatant,
}
