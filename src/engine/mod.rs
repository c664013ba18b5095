//! Core engine — the evaluate → detect → dispatch loop.

pub mod evaluator;
pub mod crossing;
pub mod dispatch;
pub mod monitor;
