//! Core domain types and utilities for the relaydesk messaging CRM.
//!
//! This crate provides the identifiers and the error-handling foundation
//! shared by the automation engine, the outbound integrations and the worker.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ContactId, NodeExecutionId, ParseIdError, TenantId, TriggerId, WorkflowId, WorkflowRunId};
