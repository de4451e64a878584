//! Subsystem implementations built on the core storage plane.

pub mod context;
pub mod memory;
pub mod research;
pub mod todo;
pub mod vault;
