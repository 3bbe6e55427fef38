//! Shared data model and wire protocol for the cchat relay and its clients.

pub mod events;
pub mod models;
