use std::collections::BTreeMap;

/// Binding point → backing store, iterated in ascending binding order.
///
/// Lookups never precede insertion and bindings are never reused; both are
/// contract violations of the rewrite and panic.
#[derive(Clone, Debug)]
pub struct BackingStoreMap<T> {
    stores: BTreeMap<u32, T>,
}

impl<T> Default for BackingStoreMap<T> {
    fn default() -> Self {
        Self {
            stores: BTreeMap::new(),
        }
    }
}

impl<T> BackingStoreMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_new(&mut self, binding: u32, store: T) {
        if self.stores.insert(binding, store).is_some() {
            panic!(
                "internal error: binding {} already has a backing store",
                binding
            );
        }
    }

    pub fn find(&self, binding: u32) -> &T {
        match self.stores.get(&binding) {
            Some(store) => store,
            None => panic!("internal error: no backing store for binding {}", binding),
        }
    }

    pub fn ordered_entries(&self) -> impl Iterator<Item = (u32, &T)> {
        self.stores.iter().map(|(&binding, store)| (binding, store))
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}
