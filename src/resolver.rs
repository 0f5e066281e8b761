//! Pluggable collection-type resolvers.
//!
//! Typed lists and maps carry a wire type name (for example
//! `java.util.HashMap`). A resolver can map such a name to a pre-sized or
//! otherwise special container instance; anything unresolved falls back to
//! the default growable containers. The registry is a plain value handed to
//! the decoder at construction time, so two decoders never share state.

use std::cell::RefCell;
use std::rc::Rc;

use crate::value::{Value, ValueMap};

/// Shared handle to a list container.
pub type ListHandle = Rc<RefCell<Vec<Value>>>;
/// Shared handle to a map container.
pub type MapHandle = Rc<RefCell<ValueMap>>;

/// Supplies list containers for wire type names.
pub trait ListResolver {
    /// Returns a container for `type_name`, or `None` to pass to the next
    /// resolver. `capacity` is the fixed-length hint, when the wire has one.
    fn resolve(&self, type_name: &str, capacity: Option<usize>) -> Option<ListHandle>;
}

/// Supplies map containers for wire type names.
pub trait MapResolver {
    fn resolve(&self, type_name: &str) -> Option<MapHandle>;
}

impl<F> ListResolver for F
where
    F: Fn(&str, Option<usize>) -> Option<ListHandle>,
{
    fn resolve(&self, type_name: &str, capacity: Option<usize>) -> Option<ListHandle> {
        self(type_name, capacity)
    }
}

impl<F> MapResolver for F
where
    F: Fn(&str) -> Option<MapHandle>,
{
    fn resolve(&self, type_name: &str) -> Option<MapHandle> {
        self(type_name)
    }
}

/// Ordered resolver registry. First match wins.
#[derive(Default)]
pub struct CollectionResolvers {
    lists: Vec<Box<dyn ListResolver>>,
    maps: Vec<Box<dyn MapResolver>>,
}

impl CollectionResolvers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_list(&mut self, resolver: impl ListResolver + 'static) {
        self.lists.push(Box::new(resolver));
    }

    pub fn register_map(&mut self, resolver: impl MapResolver + 'static) {
        self.maps.push(Box::new(resolver));
    }

    /// Container for a list slot. Untyped lists skip the resolvers.
    pub(crate) fn list_for(
        &self,
        type_name: Option<&str>,
        capacity: Option<usize>,
    ) -> ListHandle {
        if let Some(name) = type_name {
            for resolver in &self.lists {
                if let Some(handle) = resolver.resolve(name, capacity) {
                    return handle;
                }
            }
        }
        Rc::new(RefCell::new(match capacity {
            Some(n) => Vec::with_capacity(n),
            None => Vec::new(),
        }))
    }

    /// Container for a map slot. Untyped maps skip the resolvers.
    pub(crate) fn map_for(&self, type_name: Option<&str>) -> MapHandle {
        if let Some(name) = type_name {
            for resolver in &self.maps {
                if let Some(handle) = resolver.resolve(name) {
                    return handle;
                }
            }
        }
        Rc::new(RefCell::new(ValueMap::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closure_resolver_matches_by_name() {
        let mut resolvers = CollectionResolvers::new();
        resolvers.register_list(|name: &str, capacity: Option<usize>| {
            if name == "java.util.ArrayList" {
                Some(Rc::new(RefCell::new(Vec::with_capacity(capacity.unwrap_or(8)))))
            } else {
                None
            }
        });
        let hit = resolvers.list_for(Some("java.util.ArrayList"), Some(16));
        assert!(hit.borrow().capacity() >= 16);
        // Unknown names fall back to the default container.
        let miss = resolvers.list_for(Some("other"), None);
        assert!(miss.borrow().is_empty());
    }

    #[test]
    fn untyped_slots_skip_resolvers() {
        let mut resolvers = CollectionResolvers::new();
        resolvers.register_map(|_: &str| -> Option<MapHandle> {
            panic!("resolver must not run for untyped maps")
        });
        let map = resolvers.map_for(None);
        assert!(map.borrow().is_empty());
    }

    #[test]
    fn first_matching_resolver_wins() {
        let first: MapHandle = Rc::new(RefCell::new(ValueMap::default()));
        let marker = Rc::clone(&first);
        let mut resolvers = CollectionResolvers::new();
        resolvers.register_map(move |_: &str| Some(Rc::clone(&marker)));
        resolvers.register_map(|_: &str| -> Option<MapHandle> {
            panic!("second resolver must not run")
        });
        let chosen = resolvers.map_for(Some("anything"));
        assert!(Rc::ptr_eq(&chosen, &first));
    }
}
