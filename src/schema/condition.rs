use serde::{Deserialize, Serialize};

use super::attributes::{Attributes, Inventory};

/// A single constraint inside a [`Condition`]. Attribute bounds are inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Clause {
    AtLeast { attribute: String, min: i64 },
    AtMost { attribute: String, max: i64 },
    HasItem(String),
    DistinctItems(usize),
}

impl Clause {
    fn holds(&self, attributes: &Attributes, inventory: &Inventory) -> bool {
        match self {
            Self::AtLeast { attribute, min } => attributes.get(attribute) >= *min,
            Self::AtMost { attribute, max } => attributes.get(attribute) <= *max,
            Self::HasItem(item) => inventory.has(item),
            Self::DistinctItems(k) => inventory.len() >= *k,
        }
    }

    /// The attribute this clause reads, if any.
    pub fn attribute(&self) -> Option<&str> {
        match self {
            Self::AtLeast { attribute, .. } | Self::AtMost { attribute, .. } => Some(attribute.as_str()),
            Self::HasItem(_) | Self::DistinctItems(_) => None,
        }
    }
}

/// A conjunction of clauses. An empty condition always holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub clauses: Vec<Clause>,
}

impl Condition {
    pub fn always() -> Self {
        Self::default()
    }

    pub fn is_unconditional(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn is_met(&self, attributes: &Attributes, inventory: &Inventory) -> bool {
        check_condition(self, attributes, inventory)
    }
}

/// Evaluate a condition against a playthrough's attributes and inventory.
///
/// Every clause must hold. Pure: no state is touched.
pub fn check_condition(condition: &Condition, attributes: &Attributes, inventory: &Inventory) -> bool {
    condition
        .clauses
        .iter()
        .all(|clause| clause.holds(attributes, inventory))
}
