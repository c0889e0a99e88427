//! Asynchronous services and external integrations
//!
//! This module contains the code that deals with the history backend and
//! process-wide setup such as logging.

pub mod history;
pub mod tracing_setup;
