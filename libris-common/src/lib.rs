//! # Libris Common Library
//!
//! Shared code for the Libris cataloging services:
//! - Error and result types
//! - Configuration loading (root folder, TOML file)
//! - Record store schema initialization
//! - Event types and the EventBus used for realtime updates
//! - Timestamp helpers

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
