use crate::cache::{IdentityCache, Resolve, SlotState};
use crate::error::{Error, Result};
use crate::identity::{Identifiable, Identity};

use futures::future::{BoxFuture, FutureExt, TryFutureExt};
use hashbrown::HashMap;
use parking_lot::Mutex;

use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock};

/// The state holding an item's own base fields, usually seeded at construction
pub const WHOLE_ITEM: &str = "*";

pub type StateLoader<V> = Arc<dyn Fn(Identity) -> BoxFuture<'static, Result<V>> + Send + Sync>;

/// The declared states of an item type, each with the loader that fills it in.
///
/// Build it once per item type and share it between every item through an `Arc`.
pub struct States<V> {
    loaders: HashMap<String, StateLoader<V>>,
}

impl<V> States<V> {
    pub fn new() -> Self {
        States {
            loaders: HashMap::new(),
        }
    }

    /// Declare `name`, loaded on demand by `loader`
    pub fn state<F, Fut>(mut self, name: impl Into<String>, loader: F) -> Self
    where
        F: Fn(Identity) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        self.loaders
            .insert(name.into(), Arc::new(move |id: Identity| loader(id).boxed()));
        self
    }

    pub fn whole_item<F, Fut>(self, loader: F) -> Self
    where
        F: Fn(Identity) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        self.state(WHOLE_ITEM, loader)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.loaders.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.loaders.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }

    fn loader(&self, name: &str) -> Option<&StateLoader<V>> {
        self.loaders.get(name)
    }
}

impl<V> Default for States<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for States<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.loaders.keys()).finish()
    }
}

/// An item whose fields arrive in named groups, each loaded lazily and on its own.
///
/// Asking for one state never waits on, or changes, any other state, including [`WHOLE_ITEM`].
///
/// ```rust,ignore
/// struct Book(LazyFieldItem<BookField>);
///
/// impl Book {
///     fn pages(&self) -> Option<Vec<String>> {
///         match self.0.wait_for("pages")? {
///             BookField::Pages(pages) => Some(pages),
///             _ => None,
///         }
///     }
/// }
/// ```
pub struct LazyFieldItem<V> {
    id: Identity,
    states: Arc<States<V>>,
    // consumed when the state map is first built
    initial: Mutex<Option<HashMap<String, V>>>,
    state_map: OnceLock<IdentityCache<String, V>>,
}

impl<V> LazyFieldItem<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(id: Identity, states: Arc<States<V>>) -> Self {
        Self::with_initial(id, states, HashMap::new())
    }

    /// An item with some states already known, those are never loaded.
    ///
    /// Seeds for undeclared states are dropped, except [`WHOLE_ITEM`] which is always accepted.
    pub fn with_initial(id: Identity, states: Arc<States<V>>, initial: HashMap<String, V>) -> Self {
        LazyFieldItem {
            id,
            states,
            initial: Mutex::new(Some(initial)),
            state_map: OnceLock::new(),
        }
    }

    /// An item whose base fields came with it, eg. from a collection page
    pub fn with_content(id: Identity, states: Arc<States<V>>, content: V) -> Self {
        let mut initial = HashMap::with_capacity(1);
        initial.insert(WHOLE_ITEM.to_owned(), content);

        Self::with_initial(id, states, initial)
    }

    pub fn states(&self) -> &Arc<States<V>> {
        &self.states
    }

    /// The value of `state` if it has loaded, otherwise starts its loader (once) and returns `None`.
    ///
    /// ### Note
    /// Loads are spawned onto the current Tokio runtime, calling this outside of one will panic.
    pub fn wait_for(&self, state: &str) -> Option<V> {
        let state_map = self.state_map();

        match self.states.loader(state) {
            Some(loader) => state_map.get_or_load(state.to_owned(), self.load_state(state, loader)),
            None => {
                let value = state_map.peek(&state.to_owned());
                if value.is_none() {
                    tracing::warn!(id = %self.id, state, "no loader declared for state");
                }

                value
            }
        }
    }

    /// Wait for `state` to load, starting its loader if needed
    pub fn resolve(&self, state: &str) -> Resolve<V> {
        let state_map = self.state_map();

        match self.states.loader(state) {
            Some(loader) => state_map.resolve_with(state.to_owned(), self.load_state(state, loader)),
            None => state_map
                .wait(&state.to_owned())
                .unwrap_or_else(|| Resolve::Ready(Some(Err(Error::UnknownState(state.to_owned()))))),
        }
    }

    pub fn state(&self, state: &str) -> SlotState<V> {
        self.state_map().state(&state.to_owned())
    }

    fn load_state(
        &self,
        state: &str,
        loader: &StateLoader<V>,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<V>> {
        let loader = Arc::clone(loader);
        let id = self.id.clone();
        let state = state.to_owned();

        move || {
            let key = id.clone();

            loader(id)
                .inspect_err(move |err| tracing::error!(id = %key, state = %state, %err, "state load failed"))
                .boxed()
        }
    }

    fn state_map(&self) -> &IdentityCache<String, V> {
        self.state_map.get_or_init(|| {
            let state_map = IdentityCache::with_capacity(self.states.len() + 1);

            for (name, value) in self.initial.lock().take().unwrap_or_default() {
                if name == WHOLE_ITEM || self.states.contains(&name) {
                    state_map.insert(name, value);
                } else {
                    tracing::warn!(id = %self.id, state = %name, "dropping seed for undeclared state");
                }
            }

            state_map
        })
    }
}

impl<V> Identifiable for LazyFieldItem<V> {
    fn id(&self) -> Identity {
        self.id.clone()
    }
}

impl<V> fmt::Debug for LazyFieldItem<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyFieldItem")
            .field("id", &self.id)
            .field("states", &self.states)
            .finish_non_exhaustive()
    }
}
