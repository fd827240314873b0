//! loadpair-core — wire format, traffic categories, snapshot type and
//! configuration. All other loadpair crates depend on this one.

pub mod config;
pub mod snapshot;
pub mod wire;

pub use snapshot::QueueSnapshot;
pub use wire::{Category, Inbound};
