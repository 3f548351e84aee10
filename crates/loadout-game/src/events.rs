//! Push-only game observations
//!
//! Controllers record what happened into an outbox; sessions drain it and
//! fan the events out to subscribers and onto the wire.

use loadout_core::{CombatantId, ItemId, ItemRef};
use loadout_net::ItemSnapshot;

use crate::hitscan::FireReport;

/// Something observable that changed in a combatant's loadout
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// The hand now points at `slot_index`
    EquipmentChanged {
        combatant: CombatantId,
        slot_index: usize,
    },
    /// The hand holds no slot at all
    HandCleared { combatant: CombatantId },
    AmmoChanged {
        combatant: CombatantId,
        item: ItemId,
        current: u32,
        reserve: u32,
    },
    ReloadStarted {
        combatant: CombatantId,
        item: ItemId,
    },
    /// A discharge resolved on the authority, or replayed on an observer
    Fired {
        combatant: CombatantId,
        item: ItemId,
        report: FireReport,
    },
    ItemPickedUp {
        combatant: CombatantId,
        slot_index: usize,
        snapshot: ItemSnapshot,
    },
    /// A throwable was spent down to `charges`
    Thrown {
        combatant: CombatantId,
        item: ItemId,
        charges: u32,
    },
    ItemDropped {
        combatant: CombatantId,
        slot_index: usize,
        item: ItemRef,
    },
}

impl GameEvent {
    /// The combatant this event concerns
    pub fn combatant(&self) -> CombatantId {
        match self {
            Self::EquipmentChanged { combatant, .. }
            | Self::HandCleared { combatant }
            | Self::AmmoChanged { combatant, .. }
            | Self::ReloadStarted { combatant, .. }
            | Self::Fired { combatant, .. }
            | Self::ItemPickedUp { combatant, .. }
            | Self::Thrown { combatant, .. }
            | Self::ItemDropped { combatant, .. } => *combatant,
        }
    }
}

type Subscriber = Box<dyn FnMut(&GameEvent) + Send>;

/// Fan-out of game events to local listeners (HUD, audio, visuals)
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Subscriber>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; it sees every event published afterwards
    pub fn subscribe(&mut self, f: impl FnMut(&GameEvent) + Send + 'static) {
        self.subscribers.push(Box::new(f));
    }

    pub fn publish(&mut self, event: &GameEvent) {
        for subscriber in &mut self.subscribers {
            subscriber(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let mut bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in 0..2 {
            let seen = seen.clone();
            bus.subscribe(move |e| seen.lock().unwrap().push((tag, e.combatant())));
        }

        bus.publish(&GameEvent::EquipmentChanged {
            combatant: CombatantId(7),
            slot_index: 1,
        });

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![(0, CombatantId(7)), (1, CombatantId(7))]);
        assert_eq!(bus.subscriber_count(), 2);
    }
}
