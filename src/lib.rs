// ABOUTME: Library root for tagwatch - container image update detection.
// ABOUTME: The main binary is in main.rs.

pub mod components;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod event;
pub mod model;
pub mod output;
pub mod registry;
pub mod runtime;
pub mod store;
pub mod tag;
pub mod template;
pub mod types;
pub mod watcher;
