//! Name registry

use std::collections::HashMap;

use cosim_core::{CosimError, CosimResult};

/// Unique name to value mapping, owned by whoever runs the simulation
#[derive(Debug)]
pub struct NameRegistry<K> {
    names: HashMap<String, K>,
}

impl<K: Copy + PartialEq> NameRegistry<K> {
    pub fn new() -> Self {
        NameRegistry {
            names: HashMap::new(),
        }
    }

    /// Register `name`; fails if it is taken
    pub fn add(&mut self, name: &str, key: K) -> CosimResult<()> {
        if self.names.contains_key(name) {
            return Err(CosimError::DuplicateName(name.to_string()));
        }
        self.names.insert(name.to_string(), key);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<K> {
        self.names.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<K> {
        self.names.get(name).copied()
    }

    /// Name registered for `key`, if any
    pub fn name_of(&self, key: K) -> Option<&str> {
        self.names
            .iter()
            .find(|(_, k)| **k == key)
            .map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }
}

impl<K: Copy + PartialEq> Default for NameRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_unique() {
        let mut names = NameRegistry::new();
        names.add("A", 1u32).unwrap();

        assert_eq!(
            names.add("A", 2),
            Err(CosimError::DuplicateName("A".into()))
        );
        assert_eq!(names.get("A"), Some(1));
        assert_eq!(names.name_of(1), Some("A"));
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_remove_frees_name() {
        let mut names = NameRegistry::new();
        names.add("A", 1u32).unwrap();
        assert_eq!(names.remove("A"), Some(1));
        assert!(names.is_empty());
        names.add("A", 3).unwrap();
        assert_eq!(names.get("A"), Some(3));
    }
}
