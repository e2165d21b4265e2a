use std::collections::HashMap;

/// Raw column key → human-readable label, applied only when serializing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldDisplayMap {
    names: HashMap<String, String>,
}

impl FieldDisplayMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, raw_key: impl Into<String>, display_name: impl Into<String>) {
        self.names.insert(raw_key.into(), display_name.into());
    }

    /// Returns the mapped name, or the raw key unchanged
    pub fn display_name<'a>(&'a self, raw_key: &'a str) -> &'a str {
        self.names.get(raw_key).map_or(raw_key, String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldDisplayMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = FieldDisplayMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}
