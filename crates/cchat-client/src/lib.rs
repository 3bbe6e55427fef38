//! cchat terminal client: session mirror, view-state machine, reconnect
//! supervision and a line-oriented console on top.

pub mod app;
pub mod compose;
pub mod config;
pub mod mirror;
pub mod session;
pub mod supervisor;
pub mod transcript;
pub mod transport;
pub mod view;
