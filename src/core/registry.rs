//! # Registration registry: key → listener.
//!
//! The only shared mutable state in the runtime. Request handlers register
//! listeners from arbitrary tasks while the dispatcher looks them up; neither
//! side takes a lock over the whole map (the map is sharded).
//!
//! ## Architecture
//! ```text
//! register(key, channel)
//!     ├─► QueuedChannel::spawn(channel)        (bounded queue + worker)
//!     ├─► entries[key] = Registration{id, ..}  (ConflictPolicy decides on collision)
//!     └─► spawn close watcher:
//!           channel closed ─► unregister_registration(key, id)
//!
//! Dispatcher ─► lookup(key) ─► Registration ─► enqueue(message)
//! ```
//!
//! ## Rules
//! - Last writer wins by default: a second `register` for the same key replaces
//!   the first, which then receives nothing.
//! - Each registration gets a process-unique [`RegistrationId`]; close-driven
//!   cleanup removes an entry only if the id still matches, so a stale listener
//!   closing never evicts its replacement.
//! - Keys are not validated (pre-registration before invoice creation is allowed).
//! - [`close`](RegistrationRegistry::close) is final: later `register` calls fail
//!   with [`RegistryError::Closed`].

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info};

use crate::channels::{ChannelRef, QueuedChannel};
use crate::error::RegistryError;
use crate::key::RegistrationKey;
use crate::policies::ConflictPolicy;

/// Process-unique identity of one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationId(u64);

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A listener registered under a key.
#[derive(Clone)]
pub struct Registration {
    id: RegistrationId,
    key: RegistrationKey,
    channel: Arc<QueuedChannel>,
}

impl Registration {
    pub fn id(&self) -> RegistrationId {
        self.id
    }

    pub fn key(&self) -> &RegistrationKey {
        &self.key
    }

    pub fn channel(&self) -> &Arc<QueuedChannel> {
        &self.channel
    }
}

/// Settings applied to every channel the registry wraps.
#[derive(Clone, Copy, Debug)]
pub struct RegistryParams {
    pub conflict: ConflictPolicy,
    /// Per-listener queue capacity (min 1).
    pub queue_capacity: usize,
    /// Per-send timeout (`None` = wait forever).
    pub send_timeout: Option<Duration>,
}

impl Default for RegistryParams {
    fn default() -> Self {
        Self {
            conflict: ConflictPolicy::default(),
            queue_capacity: 64,
            send_timeout: Some(Duration::from_secs(10)),
        }
    }
}

/// Concurrent key → listener map.
pub struct RegistrationRegistry {
    entries: DashMap<RegistrationKey, Registration>,
    next_id: AtomicU64,
    closed: AtomicBool,
    params: RegistryParams,
}

impl RegistrationRegistry {
    /// Creates an empty registry.
    pub fn new(params: RegistryParams) -> Arc<Self> {
        Arc::new(Self {
            entries: DashMap::new(),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            params,
        })
    }

    /// Registers `channel` under `key`.
    ///
    /// Must be called inside a Tokio runtime (the channel worker is spawned here).
    /// Under [`ConflictPolicy::Replace`] this always succeeds and evicts any
    /// current holder of `key`; under [`ConflictPolicy::Reject`] it fails while
    /// the current holder is still open.
    pub fn register(
        self: &Arc<Self>,
        key: RegistrationKey,
        channel: ChannelRef,
    ) -> Result<RegistrationId, RegistryError> {
        if self.is_closed() {
            return Err(RegistryError::Closed);
        }
        let id = RegistrationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let queued = Arc::new(QueuedChannel::spawn(
            channel,
            self.params.queue_capacity,
            self.params.send_timeout,
        ));
        let registration = Registration {
            id,
            key: key.clone(),
            channel: Arc::clone(&queued),
        };

        let replaced = match self.entries.entry(key.clone()) {
            Entry::Occupied(mut current) => {
                let live = !current.get().channel.is_closed();
                if live && self.params.conflict == ConflictPolicy::Reject {
                    drop(current);
                    queued.close();
                    debug!(key = %key, "registration rejected: key held");
                    return Err(RegistryError::Conflict {
                        key: key.into_string(),
                    });
                }
                Some(current.insert(registration).id)
            }
            Entry::Vacant(slot) => {
                slot.insert(registration);
                None
            }
        };

        match replaced {
            Some(old) => info!(
                key = %key,
                registration = %id,
                replaced = %old,
                channel = queued.name(),
                "listener registered, previous listener evicted"
            ),
            None => info!(
                key = %key,
                registration = %id,
                channel = queued.name(),
                "listener registered"
            ),
        }

        // A close() racing this insert may have swept before it landed.
        if self.is_closed() {
            self.entries.remove_if(key.as_str(), |_, reg| reg.id == id);
            queued.close();
            return Err(RegistryError::Closed);
        }

        self.watch_close(key, id, &queued);
        Ok(id)
    }

    /// Returns the listener currently registered under `key`.
    pub fn lookup(&self, key: &str) -> Option<Registration> {
        self.entries.get(key).map(|r| r.clone())
    }

    /// Removes whatever is registered under `key`.
    ///
    /// Messages already queued for that listener are still delivered.
    pub fn unregister(&self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some((_, reg)) => {
                info!(key = %key, registration = %reg.id, "listener unregistered");
                true
            }
            None => false,
        }
    }

    /// Removes the entry under `key` only if it is still registration `id`.
    pub fn unregister_registration(&self, key: &str, id: RegistrationId) -> bool {
        let removed = self.entries.remove_if(key, |_, reg| reg.id == id).is_some();
        if removed {
            info!(key = %key, registration = %id, "listener unregistered");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns sorted list of registered keys.
    pub fn keys(&self) -> Vec<RegistrationKey> {
        let mut keys: Vec<RegistrationKey> = self.entries.iter().map(|r| r.key().clone()).collect();
        keys.sort_unstable();
        keys
    }

    /// `true` once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Closes every listener, empties the registry and refuses new registrations.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.entries.retain(|_, reg| {
            reg.channel.close();
            false
        });
    }

    /// Drops the registration once its channel closes.
    fn watch_close(self: &Arc<Self>, key: RegistrationKey, id: RegistrationId, queued: &QueuedChannel) {
        let token = queued.close_token();
        let registry: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            token.cancelled().await;
            if let Some(registry) = registry.upgrade() {
                registry.unregister_registration(key.as_str(), id);
            }
        });
    }
}
