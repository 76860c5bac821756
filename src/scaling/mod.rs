//! # Auto-Scaling
//!
//! Pure scaling decisions for the worker pool. The [`Autoscaler`] maps a
//! snapshot of engine state (queue depth, latency, in-flight count) to an
//! up/down/hold recommendation with cooldown and hysteresis. It performs no
//! I/O and takes the clock as an argument, so every branch is exercisable
//! from deterministic tests.
//!
//! Applying a decision (spawning or stopping workers) is the pool's job, see
//! [`crate::worker`].

pub mod autoscaler;
pub mod types;

pub use autoscaler::Autoscaler;
pub use types::{EngineState, ScaleDecision, ScaleDirection, ScalingPolicy};
