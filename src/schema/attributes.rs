use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named integer state tracked across a playthrough ("affection", "money", ...).
///
/// No bounds are enforced here. Names that were never set read as 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, i64>);

impl Attributes {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Current value of an attribute, 0 if unspecified.
    pub fn get(&self, name: &str) -> i64 {
        self.0.get(name).copied().unwrap_or(0)
    }

    pub fn set(&mut self, name: impl Into<String>, value: i64) {
        self.0.insert(name.into(), value);
    }

    /// Add `delta` to an attribute. Saturates instead of overflowing, so
    /// delta order only matters once a value reaches an `i64` bound.
    pub fn apply_delta(&mut self, name: &str, delta: i64) {
        let entry = self.0.entry(name.to_string()).or_insert(0);
        *entry = entry.saturating_add(delta);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, i64)> for Attributes {
    fn from_iter<T: IntoIterator<Item = (K, i64)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// The set of distinct items held during a playthrough.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inventory(FxHashSet<String>);

impl Inventory {
    pub fn new() -> Self {
        Self(FxHashSet::default())
    }

    pub fn has(&self, item: &str) -> bool {
        self.0.contains(item)
    }

    /// Returns true if the item was not already held.
    pub fn insert(&mut self, item: impl Into<String>) -> bool {
        self.0.insert(item.into())
    }

    pub fn remove(&mut self, item: &str) -> bool {
        self.0.remove(item)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Items in sorted order, for stable display.
    pub fn sorted(&self) -> Vec<&str> {
        let mut items: Vec<&str> = self.0.iter().map(String::as_str).collect();
        items.sort_unstable();
        items
    }
}

impl<S: Into<String>> FromIterator<S> for Inventory {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unspecified_attribute_reads_zero() {
        let attrs = Attributes::new();
        assert_eq!(attrs.get("affection"), 0);
        assert!(!attrs.contains("affection"));
    }

    #[test]
    fn apply_delta_creates_and_adds() {
        let mut attrs: Attributes = [("alertness", 40)].into_iter().collect();
        attrs.apply_delta("alertness", -5);
        attrs.apply_delta("affection", 5);
        assert_eq!(attrs.get("alertness"), 35);
        assert_eq!(attrs.get("affection"), 5);
        assert_eq!(attrs.len(), 2);
    }

    #[test]
    fn apply_delta_saturates() {
        let mut attrs: Attributes = [("money", i64::MAX - 1)].into_iter().collect();
        attrs.apply_delta("money", 10);
        assert_eq!(attrs.get("money"), i64::MAX);
    }

    #[test]
    fn saturated_deltas_depend_on_order() {
        let mut up_first: Attributes = [("money", i64::MAX)].into_iter().collect();
        up_first.apply_delta("money", 1);
        up_first.apply_delta("money", -1);

        let mut down_first: Attributes = [("money", i64::MAX)].into_iter().collect();
        down_first.apply_delta("money", -1);
        down_first.apply_delta("money", 1);

        assert_eq!(up_first.get("money"), i64::MAX - 1);
        assert_eq!(down_first.get("money"), i64::MAX);

        let mut a: Attributes = [("money", 5)].into_iter().collect();
        let mut b = a.clone();
        a.apply_delta("money", 7);
        a.apply_delta("money", -3);
        b.apply_delta("money", -3);
        b.apply_delta("money", 7);
        assert_eq!(a, b);
    }

    #[test]
    fn iteration_is_name_ordered() {
        let attrs: Attributes = [("day", 1), ("affection", 0), ("money", 30)]
            .into_iter()
            .collect();
        let names: Vec<&str> = attrs.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["affection", "day", "money"]);
    }

    #[test]
    fn inventory_is_a_set() {
        let mut inv = Inventory::new();
        assert!(inv.insert("umbrella"));
        assert!(!inv.insert("umbrella"));
        inv.insert("ticket");
        assert_eq!(inv.len(), 2);
        assert_eq!(inv.sorted(), vec!["ticket", "umbrella"]);
        assert!(inv.remove("ticket"));
        assert!(!inv.has("ticket"));
        inv.clear();
        assert!(inv.is_empty());
    }
}
