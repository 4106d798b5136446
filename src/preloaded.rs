use crate::identity::{Collected, Identity};

use hashbrown::HashMap;

/// A collection whose identities are known up front, every item is built at construction.
///
/// Pair it with [`crate::LazyFieldItem`] or a cached [`crate::Batch`] inside the item to fill in
/// the details lazily.
pub struct Preloaded<V> {
    items: HashMap<Identity, V>,
    order: Vec<Identity>,
}

impl<V> Preloaded<V> {
    pub fn new<I, F>(ids: I, mut new_item: F) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Identity>,
        F: FnMut(&Identity) -> V,
    {
        let mut items = HashMap::new();
        let mut order = Vec::new();

        for id in ids {
            let id = id.into();
            let item = new_item(&id);

            // a repeated identity replaces the item but keeps its first position
            if items.insert(id.clone(), item).is_none() {
                order.push(id);
            }
        }

        Preloaded { items, order }
    }

    pub fn get(&self, id: &Identity) -> Option<&V> {
        self.items.get(id)
    }

    /// Every item, in the order their identities were given
    pub fn get_all(&self) -> impl Iterator<Item = &V> {
        self.order.iter().filter_map(|id| self.items.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl<V: Clone> Collected<V> for Preloaded<V> {
    fn get(&self, id: &Identity) -> Option<V> {
        Preloaded::get(self, id).cloned()
    }
}
