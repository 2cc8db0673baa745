#![doc = include_str!("../README.md")]

/// Configuration options
pub mod config;

/// Pure topic/entry operations and selection fallback
pub mod crud;

/// Error (common error types)
pub mod error;

/// JSON import and export
pub mod exchange;

/// Filesystem abstraction
pub mod fs;

/// Schema detection and legacy migration
pub mod migrate;

/// Document model
pub mod model;

/// Debounced save state machine
pub mod save;

/// Editing session (selection, confirmations, autosave)
pub mod session;

/// Local persistence adapters
pub mod store;

/// Cloud sync (OAuth + application folder)
pub mod cloud;

#[cfg(test)]
pub mod test_utils;
