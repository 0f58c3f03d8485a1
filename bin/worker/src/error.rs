//! Domain error types for worker bootstrap and the event loop.

use std::fmt;

/// Errors that stop the worker.
#[derive(Debug)]
pub enum WorkerError {
    /// Configuration could not be loaded.
    Config { details: String },
    /// The fixtures file could not be read or parsed.
    Fixtures { path: String, details: String },
    /// A fixture workflow failed validation.
    InvalidWorkflow { name: String, details: String },
    /// The trigger index rejected a workflow's registrations.
    TriggerSync { name: String, details: String },
    /// An outbound client could not be constructed.
    Client { details: String },
    /// The event input could not be read.
    Input { details: String },
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "invalid configuration: {details}"),
            Self::Fixtures { path, details } => {
                write!(f, "cannot load fixtures from '{path}': {details}")
            }
            Self::InvalidWorkflow { name, details } => {
                write!(f, "fixture workflow '{name}' is invalid: {details}")
            }
            Self::TriggerSync { name, details } => {
                write!(f, "cannot register triggers of '{name}': {details}")
            }
            Self::Client { details } => write!(f, "cannot build outbound client: {details}"),
            Self::Input { details } => write!(f, "cannot read events: {details}"),
        }
    }
}

impl std::error::Error for WorkerError {}
