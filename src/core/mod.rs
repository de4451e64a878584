//! Core modules for Mnemo's storage plane.
//!
//! Shared primitives live here: the connection layer, schema definitions,
//! the mutation broker, configuration, crypto, and time/id helpers.

pub mod broker;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod schemas;
pub mod store;
pub mod time;
