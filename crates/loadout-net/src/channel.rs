//! Replication channel
//!
//! [`AuthorityChannel`] and [`ObserverChannel`] are the two ends of the
//! message-passing contract. [`LocalHub`] implements both over in-process
//! tokio channels carrying encoded frames, so everything that crosses it goes
//! through the same codec a socket transport would use.
//!
//! Every observer has its own FIFO inbox and broadcasts are fanned out under
//! one lock, so all recipients see broadcasts in the order the authority
//! emitted them.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use loadout_core::ObserverId;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use crate::codec::{decode, encode};
use crate::error::NetError;
use crate::message::{Broadcast, CommandEnvelope, LateJoinSync, ServerMessage};

/// The authority's side of the replication channel.
pub trait AuthorityChannel {
    /// Next pending command, in arrival order, with the observer that sent it
    fn poll_command(&mut self) -> Option<(ObserverId, CommandEnvelope)>;

    /// Deliver a broadcast to every observer, optionally skipping one
    fn broadcast(&self, message: Broadcast, exclude: Option<ObserverId>);

    /// Deliver a late-join sync to a single observer
    fn send_targeted(&self, to: ObserverId, sync: LateJoinSync) -> Result<(), NetError>;
}

/// An observer's side of the replication channel.
pub trait ObserverChannel {
    /// Id the authority knows this observer by
    fn id(&self) -> ObserverId;

    /// Send an intent to the authority
    fn send_command(&self, envelope: CommandEnvelope) -> Result<(), NetError>;

    /// Next message from the authority, in emission order
    fn poll_message(&mut self) -> Option<ServerMessage>;
}

struct HubInner {
    observers: Mutex<BTreeMap<ObserverId, UnboundedSender<String>>>,
    commands: UnboundedSender<(ObserverId, String)>,
    next_observer: AtomicU32,
}

impl HubInner {
    fn deliver(&self, to: ObserverId, message: &ServerMessage) -> Result<(), NetError> {
        let frame = encode(message)?;
        let mut observers = self.observers.lock();
        let sender = observers.get(&to).ok_or(NetError::UnknownObserver(to))?;
        if sender.send(frame).is_err() {
            observers.remove(&to);
            return Err(NetError::UnknownObserver(to));
        }
        Ok(())
    }
}

/// In-memory transport connecting one authority with its observers.
#[derive(Clone)]
pub struct LocalHub {
    inner: Arc<HubInner>,
}

impl LocalHub {
    /// Create a hub and the authority endpoint attached to it
    pub fn new() -> (Self, AuthorityEndpoint) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(HubInner {
            observers: Mutex::new(BTreeMap::new()),
            commands: commands_tx,
            next_observer: AtomicU32::new(1),
        });
        let endpoint = AuthorityEndpoint {
            inner: Arc::clone(&inner),
            commands: commands_rx,
        };
        (Self { inner }, endpoint)
    }

    /// Connect a new observer
    pub fn connect(&self) -> ObserverEndpoint {
        let id = ObserverId(self.inner.next_observer.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.observers.lock().insert(id, tx);
        debug!("{} connected", id);
        ObserverEndpoint {
            id,
            inner: Arc::clone(&self.inner),
            inbox: rx,
        }
    }

    /// Disconnect an observer; frames already queued for it are discarded
    pub fn disconnect(&self, id: ObserverId) {
        if self.inner.observers.lock().remove(&id).is_some() {
            debug!("{} disconnected", id);
        }
    }

    /// Number of connected observers
    pub fn observer_count(&self) -> usize {
        self.inner.observers.lock().len()
    }
}

/// The authority's endpoint on a [`LocalHub`].
pub struct AuthorityEndpoint {
    inner: Arc<HubInner>,
    commands: UnboundedReceiver<(ObserverId, String)>,
}

impl AuthorityChannel for AuthorityEndpoint {
    fn poll_command(&mut self) -> Option<(ObserverId, CommandEnvelope)> {
        while let Ok((from, frame)) = self.commands.try_recv() {
            match decode(&frame) {
                Ok(envelope) => return Some((from, envelope)),
                Err(e) => warn!("Dropping malformed command from {}: {}", from, e),
            }
        }
        None
    }

    fn broadcast(&self, message: Broadcast, exclude: Option<ObserverId>) {
        let frame = match encode(&ServerMessage::Broadcast(message)) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to encode broadcast: {}", e);
                return;
            }
        };

        let mut observers = self.inner.observers.lock();
        let mut closed = Vec::new();
        for (id, sender) in observers.iter() {
            if Some(*id) == exclude {
                continue;
            }
            if sender.send(frame.clone()).is_err() {
                closed.push(*id);
            }
        }
        for id in closed {
            observers.remove(&id);
            debug!("Removed closed {}", id);
        }
    }

    fn send_targeted(&self, to: ObserverId, sync: LateJoinSync) -> Result<(), NetError> {
        self.inner.deliver(to, &ServerMessage::Targeted(sync))
    }
}

/// An observer's endpoint on a [`LocalHub`].
pub struct ObserverEndpoint {
    id: ObserverId,
    inner: Arc<HubInner>,
    inbox: UnboundedReceiver<String>,
}

impl ObserverChannel for ObserverEndpoint {
    fn id(&self) -> ObserverId {
        self.id
    }

    fn send_command(&self, envelope: CommandEnvelope) -> Result<(), NetError> {
        let frame = encode(&envelope)?;
        self.inner
            .commands
            .send((self.id, frame))
            .map_err(|_| NetError::AuthorityGone)
    }

    fn poll_message(&mut self) -> Option<ServerMessage> {
        while let Ok(frame) = self.inbox.try_recv() {
            match decode(&frame) {
                Ok(message) => return Some(message),
                Err(e) => warn!("{} dropping malformed frame: {}", self.id, e),
            }
        }
        None
    }
}
