//! # Error Types
//!
//! Structured error handling for the orchestration core using thiserror
//! for typed errors instead of `Box<dyn Error>` patterns.
//!
//! Validation and cycle errors surface before any execution; task failures
//! surface after retries are exhausted; storage errors are only raised when a
//! store cannot be written at all (readers degrade by skipping bad records).

use thiserror::Error;

/// Errors produced by the orchestration core
#[derive(Error, Debug)]
pub enum FlowgateError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Cycle detected in DAG '{dag_name}': {message}")]
    CycleDetected { dag_name: String, message: String },

    #[error("Unknown workflow reference: {workflow_ref}")]
    UnknownWorkflow { workflow_ref: String },

    #[error("Task '{task_id}' failed after {attempts} attempt(s): {message}")]
    TaskFailed {
        task_id: String,
        attempts: u32,
        message: String,
    },

    #[error("Checkpoint '{checkpoint_id}' rejected by {approver}: run {dag_run_id} failed")]
    CheckpointRejected {
        dag_run_id: String,
        checkpoint_id: String,
        approver: String,
    },

    #[error("No pause record found for run {dag_run_id}")]
    CheckpointNotFound { dag_run_id: String },

    #[error("Queue operation failed: {operation}: {message}")]
    Queue { operation: String, message: String },

    #[error("Storage error: {path}: {message}")]
    Storage { path: String, message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Configuration error: {field}: {message}")]
    Configuration { field: String, message: String },
}

impl FlowgateError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a cycle-detected error
    pub fn cycle_detected(dag_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CycleDetected {
            dag_name: dag_name.into(),
            message: message.into(),
        }
    }

    /// Create an unknown-workflow error
    pub fn unknown_workflow(workflow_ref: impl Into<String>) -> Self {
        Self::UnknownWorkflow {
            workflow_ref: workflow_ref.into(),
        }
    }

    /// Create a task-failed error (retries exhausted)
    pub fn task_failed(
        task_id: impl Into<String>,
        attempts: u32,
        message: impl Into<String>,
    ) -> Self {
        Self::TaskFailed {
            task_id: task_id.into(),
            attempts,
            message: message.into(),
        }
    }

    /// Create a queue operation error
    pub fn queue(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Queue {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for FlowgateError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for FlowgateError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

/// Result type alias for orchestration operations
pub type Result<T> = std::result::Result<T, FlowgateError>;
