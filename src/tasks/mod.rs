//! Background Tasks Module
//!
//! # Tasks
//! - TTL Sweep: reclaims expired entries of a local cache instance

mod sweep;

pub(crate) use sweep::{spawn_sweep_task, sweep_expired};
