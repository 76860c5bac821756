//! # Graph Model
//!
//! DAG definitions and the pure graph algorithms the runner is built on:
//!
//! - [`model`] - `Dag`/`Task` types, YAML loading, ancestor traversal
//! - [`validate`] - structural validation (ids, references, acyclicity)
//! - [`toposort`] - Kahn's algorithm with deterministic tie-breaking
//! - [`payloads`] - namespaced merging of upstream task outputs
//!
//! Everything here is synchronous and side-effect-free; execution concerns
//! live in [`crate::runner`].

pub mod model;
pub mod payloads;
pub mod toposort;
pub mod validate;

pub use model::{Dag, Task, TaskType};
pub use payloads::merge_payloads;
pub use toposort::toposort;
pub use validate::validate;
