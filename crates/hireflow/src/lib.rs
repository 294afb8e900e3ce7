//! Lifecycle engine for a contractor/employer job marketplace.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
