//! Insertion-ordered string collections with ASCII case-insensitive keys.
//!
//! Watermark tags, watermark entries, cleanup manifests and component
//! settings all use these so that `Name` and `name` address the same entry
//! while the original spelling and order survive a save/load cycle.

/// Ordered string -> string map with case-insensitive keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoCaseMap {
    entries: Vec<(String, String)>,
}

impl NoCaseMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(key))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.position(key).map(|i| self.entries[i].1.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Insert or replace a value. An existing entry keeps its position and
    /// original key spelling. Returns the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.position(&key) {
            Some(i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.position(key).map(|i| self.entries.remove(i).1)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for NoCaseMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = NoCaseMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// Ordered string set with case-insensitive membership
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoCaseSet {
    items: Vec<String>,
}

impl NoCaseSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, value: &str) -> bool {
        self.items.iter().any(|v| v.eq_ignore_ascii_case(value))
    }

    /// Returns false when an equivalent value was already present
    pub fn insert(&mut self, value: impl Into<String>) -> bool {
        let value = value.into();
        if self.contains(&value) {
            return false;
        }
        self.items.push(value);
        true
    }

    pub fn remove(&mut self, value: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|v| !v.eq_ignore_ascii_case(value));
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for NoCaseSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = NoCaseSet::new();
        for item in iter {
            set.insert(item);
        }
        set
    }
}
