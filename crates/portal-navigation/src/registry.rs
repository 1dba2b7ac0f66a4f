use indexmap::IndexMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

/// Deferred rendering of one screen.
pub type Producer<T> = Rc<dyn Fn() -> T>;

/// Insertion-ordered mapping from view id to screen producer.
///
/// Built once through [`ViewRegistryBuilder`] and read-only afterwards.
pub struct ViewRegistry<V, T> {
    entries: IndexMap<V, Producer<T>>,
}

impl<V, T> ViewRegistry<V, T>
where
    V: Copy + Eq + Hash + Debug,
{
    pub fn builder() -> ViewRegistryBuilder<V, T> {
        ViewRegistryBuilder {
            entries: IndexMap::new(),
        }
    }

    pub fn get(&self, view: &V) -> Option<Producer<T>> {
        self.entries.get(view).cloned()
    }

    pub fn contains(&self, view: &V) -> bool {
        self.entries.contains_key(view)
    }

    /// Registered ids in registration order.
    pub fn views(&self) -> impl Iterator<Item = V> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct ViewRegistryBuilder<V, T> {
    entries: IndexMap<V, Producer<T>>,
}

impl<V, T> ViewRegistryBuilder<V, T>
where
    V: Copy + Eq + Hash + Debug,
{
    /// Register a screen. Registering an id twice replaces the producer but
    /// keeps the original position.
    pub fn register<F>(mut self, view: V, producer: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        self.entries.insert(view, Rc::new(producer));
        self
    }

    pub fn build(self) -> ViewRegistry<V, T> {
        ViewRegistry {
            entries: self.entries,
        }
    }
}
