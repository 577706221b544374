use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::attributes::{Attributes, Inventory};

/// What resolving a choice does to the playthrough.
///
/// Deltas are added to attributes; attributes the effect does not name are
/// untouched. Items are granted after deltas, then removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effect {
    #[serde(default)]
    pub deltas: BTreeMap<String, i64>,
    #[serde(default)]
    pub gain_items: Vec<String>,
    #[serde(default)]
    pub lose_items: Vec<String>,
}

impl Effect {
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty() && self.gain_items.is_empty() && self.lose_items.is_empty()
    }

    pub fn apply(&self, attributes: &mut Attributes, inventory: &mut Inventory) {
        for (name, delta) in &self.deltas {
            attributes.apply_delta(name, *delta);
        }
        for item in &self.gain_items {
            inventory.insert(item.clone());
        }
        for item in &self.lose_items {
            inventory.remove(item);
        }
    }
}
