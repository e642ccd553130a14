//! Fan-out of interpreter output to connected sessions.
//!
//! The registry maps logged-in users to the sender half of their session's
//! outbound channel. Delivery is best effort: a recipient who disconnected
//! mid-dispatch is silently skipped, and room recipients are expanded from
//! the store's occupancy view at delivery time.

use std::collections::HashMap;

use log::trace;
use parking_lot::RwLock;
use tokio::sync::mpsc::UnboundedSender;

use crate::engine::interpreter::{Outgoing, Recipient};
use crate::world::store::WorldStore;
use crate::world::types::EntityId;

#[derive(Default)]
pub struct SessionRegistry {
    inner: RwLock<HashMap<EntityId, UnboundedSender<String>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a user to a session channel, replacing any previous binding.
    /// Logging in from a second client takes over the account.
    pub fn connect(&self, user: EntityId, tx: UnboundedSender<String>) {
        self.inner.write().insert(user, tx);
    }

    /// Remove the binding only if it still belongs to `tx`. After a login
    /// takeover the stale connection's teardown must not unbind the newer
    /// session.
    pub fn disconnect_if_current(&self, user: EntityId, tx: &UnboundedSender<String>) {
        let mut sessions = self.inner.write();
        let current = sessions.get(&user).map(|s| s.same_channel(tx)).unwrap_or(false);
        if current {
            sessions.remove(&user);
        }
    }

    pub fn connected_count(&self) -> usize {
        self.inner.read().len()
    }

    /// Deliver one batch of messages produced for `actor`. Send failures
    /// mean the receiving session is gone; nothing to do but move on.
    pub fn deliver(&self, store: &WorldStore, actor: EntityId, messages: &[Outgoing]) {
        for message in messages {
            match &message.to {
                Recipient::Actor => self.send(actor, &message.body),
                Recipient::User(user) => self.send(*user, &message.body),
                Recipient::Room { room, exclude } => {
                    for occupant in store.occupants(*room) {
                        if !exclude.contains(&occupant) {
                            self.send(occupant, &message.body);
                        }
                    }
                }
            }
        }
    }

    fn send(&self, user: EntityId, body: &str) {
        let sessions = self.inner.read();
        if let Some(tx) = sessions.get(&user) {
            if tx.send(body.to_string()).is_err() {
                trace!("dropping message for disconnected user {}", user);
            }
        }
    }
}
