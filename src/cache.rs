mod resolve;
mod slot;

pub use resolve::Resolve;
pub use slot::SlotState;
pub(crate) use slot::Slot;

use crate::error::{Error, Result};

use futures::future::{BoxFuture, FutureExt, Shared};
use hashbrown::hash_map::{DefaultHashBuilder, Entry, HashMap};
use parking_lot::RwLock;

use std::any::Any;
use std::fmt::Debug;
use std::future::Future;
use std::hash::{BuildHasher, Hash};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// The shared handle of a load in flight, every caller asking for the same key polls the same one.
pub type SlotFuture<V> = Shared<BoxFuture<'static, Result<V>>>;

/// A map of per key slots, each either loading, loaded or failed.
///
/// At most one load is ever started per key: once a slot exists, later calls observe it rather than
/// loading again, and that includes a slot whose load failed.
/// A resolved value is never overwritten or evicted.
#[derive(Clone)]
pub struct IdentityCache<K, V, S = DefaultHashBuilder> {
    slots: Arc<RwLock<HashMap<K, Slot<V>, S>>>,
}

impl<K, V> IdentityCache<K, V> {
    pub fn new() -> Self {
        IdentityCache {
            slots: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        IdentityCache {
            slots: Arc::new(RwLock::new(HashMap::with_capacity(capacity))),
        }
    }
}

impl<K, V> Default for IdentityCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> IdentityCache<K, V, S> {
    pub fn with_hasher(build_hasher: S) -> Self {
        IdentityCache {
            slots: Arc::new(RwLock::new(HashMap::with_hasher(build_hasher))),
        }
    }

    /// The number of slots, including pending and failed ones
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V, S> IdentityCache<K, V, S>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: BuildHasher + Send + Sync + 'static,
{
    /// Get the value for `key`, starting `load` in the background if the key has never been seen.
    ///
    /// Returns `None` while the load is pending, after it failed, and on the call that starts it.
    /// Use [`Self::state`] to tell those apart.
    ///
    /// ### Note
    /// This spawns onto the current Tokio runtime, calling it outside of one will panic.
    /// `load` runs under the cache's write lock, so it must not call back into this cache.
    pub fn get_or_load<F, Fut>(&self, key: K, load: F) -> Option<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        match self.slot_or_start(key, load) {
            Slot::Resolved(v) => Some(v),
            _ => None,
        }
    }

    /// Resolve the value for `key`, joining the pending load if there is one or starting `load` otherwise.
    ///
    /// A failed slot resolves to its stored error without calling `load`.
    pub fn resolve_with<F, Fut>(&self, key: K, load: F) -> Resolve<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        self.slot_or_start(key, load).into()
    }

    /// Wait on an existing slot, `None` if nothing was ever requested for `key`
    pub fn wait(&self, key: &K) -> Option<Resolve<V>> {
        self.slots.read().get(key).cloned().map(Resolve::from)
    }

    /// Get a resolved value without starting a load
    pub fn peek(&self, key: &K) -> Option<V> {
        match self.slots.read().get(key) {
            Some(Slot::Resolved(v)) => Some(v.clone()),
            _ => None,
        }
    }

    pub fn state(&self, key: &K) -> SlotState<V> {
        self.slots
            .read()
            .get(key)
            .map(Slot::snapshot)
            .unwrap_or(SlotState::Absent)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.slots.read().contains_key(key)
    }

    /// Store a value loaded elsewhere, eg. by a page of a collection walk.
    ///
    /// Returns false, leaving the cache untouched, if `key` already holds a resolved value.
    /// A pending load for `key` will not overwrite the value once it finishes.
    pub fn insert(&self, key: K, value: V) -> bool {
        match self.slots.write().entry(key) {
            Entry::Occupied(mut entry) => {
                if matches!(entry.get(), Slot::Resolved(_)) {
                    return false;
                }

                entry.insert(Slot::Resolved(value));
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(Slot::Resolved(value));
                true
            }
        }
    }

    /// Drop a failed slot so the next request for `key` loads it again.
    ///
    /// Returns false if the slot is absent, pending or resolved.
    pub fn clear_failed(&self, key: &K) -> bool {
        let mut slots = self.slots.write();

        if matches!(slots.get(key), Some(Slot::Failed(_))) {
            slots.remove(key);
            true
        } else {
            false
        }
    }

    fn slot_or_start<F, Fut>(&self, key: K, load: F) -> Slot<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        if let Some(slot) = self.slots.read().get(&key) {
            return slot.clone();
        }

        let mut slots = self.slots.write();
        match slots.entry(key) {
            // someone beat us to it between the two locks
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                tracing::trace!(key = ?entry.key(), "starting load");

                let pending = spawn_load(Arc::clone(&self.slots), entry.key().clone(), load());
                entry.insert(Slot::Pending(pending.clone()));

                Slot::Pending(pending)
            }
        }
    }
}

fn spawn_load<K, V, S, Fut>(
    slots: Arc<RwLock<HashMap<K, Slot<V>, S>>>,
    key: K,
    fut: Fut,
) -> SlotFuture<V>
where
    K: Eq + Hash + Debug + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: BuildHasher + Send + Sync + 'static,
    Fut: Future<Output = Result<V>> + Send + 'static,
{
    let task_slots = Arc::clone(&slots);
    let task_key = key.clone();

    // the task settles the slot itself, even if nobody ever awaits the shared handle
    let handle = tokio::spawn(async move {
        let result = match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(Error::Interrupted(panic_message(panic.as_ref()))),
        };
        settle(&task_slots, &task_key, &result);

        result
    });

    async move {
        match handle.await {
            Ok(result) => result,
            Err(join_err) => {
                // cancelled by a runtime shutdown before reaching `settle`
                let err = Error::from(join_err);
                settle(&slots, &key, &Err(err.clone()));

                Err(err)
            }
        }
    }
    .boxed()
    .shared()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("load panicked: {msg}")
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("load panicked: {msg}")
    } else {
        "load panicked".to_string()
    }
}

fn settle<K, V, S>(slots: &RwLock<HashMap<K, Slot<V>, S>>, key: &K, result: &Result<V>)
where
    K: Eq + Hash + Debug,
    V: Clone,
    S: BuildHasher,
{
    let mut slots = slots.write();

    // only a pending slot is settled, a value merged in while we were loading wins
    if let Some(slot) = slots.get_mut(key) {
        if matches!(slot, Slot::Pending(_)) {
            *slot = match result {
                Ok(v) => Slot::Resolved(v.clone()),
                Err(err) => {
                    // logged once where it happened, not per slot
                    tracing::debug!(?key, %err, "slot failed");
                    Slot::Failed(err.clone())
                }
            };
        }
    }
}
