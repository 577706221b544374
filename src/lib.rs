//! Story Engine — attribute-tracking branching dialogue for games.
//!
//! Holds a playthrough's attributes and inventory, walks an authored graph
//! of event nodes and choices, gates choices behind conditions, and resolves
//! terminal endings. Authored content is loaded from RON and validated once.

pub mod core;
pub mod schema;
