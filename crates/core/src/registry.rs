use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u64);

/// Live engine instances owned by the host layer, keyed by id.
///
/// Ids are never reused within one registry.
#[derive(Debug)]
pub struct EngineRegistry<T> {
    next_id: u64,
    instances: BTreeMap<InstanceId, T>,
}

impl<T> Default for EngineRegistry<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            instances: BTreeMap::new(),
        }
    }
}

impl<T> EngineRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, instance: T) -> InstanceId {
        let id = InstanceId(self.next_id);
        self.next_id += 1;
        self.instances.insert(id, instance);
        id
    }

    pub fn get(&self, id: InstanceId) -> Option<&T> {
        self.instances.get(&id)
    }

    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut T> {
        self.instances.get_mut(&id)
    }

    pub fn remove(&mut self, id: InstanceId) -> Option<T> {
        self.instances.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstanceId, &T)> {
        self.instances.iter().map(|(id, instance)| (*id, instance))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (InstanceId, &mut T)> {
        self.instances
            .iter_mut()
            .map(|(id, instance)| (*id, instance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = EngineRegistry::new();
        let a = registry.register("a");
        let b = registry.register("b");

        assert_ne!(a, b);
        assert_eq!(registry.get(a), Some(&"a"));
        assert_eq!(registry.get(b), Some(&"b"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_ids_not_reused_after_remove() {
        let mut registry = EngineRegistry::new();
        let a = registry.register(1);
        assert_eq!(registry.remove(a), Some(1));
        assert!(registry.is_empty());

        let b = registry.register(2);
        assert_ne!(a, b);
        assert_eq!(registry.get(a), None);
    }

    #[test]
    fn test_iter_mut_updates() {
        let mut registry = EngineRegistry::new();
        registry.register(1);
        registry.register(2);
        for (_, value) in registry.iter_mut() {
            *value *= 10;
        }
        let values: Vec<i32> = registry.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![10, 20]);
    }
}
