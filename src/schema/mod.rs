//! Authored data types shared by the loader and the engine.

pub mod attributes;
pub mod condition;
pub mod effect;
pub mod node;
