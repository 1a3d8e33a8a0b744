//! CLI tests module (manifest).
//!
//! Split by concern under `src/cli/tests/*` to keep files small and localize
//! global env/CWD mutation patterns.

#![allow(clippy::items_after_test_module)]
#![allow(clippy::await_holding_lock)]

// Test support utilities
mod support;

// Test modules by command/feature
mod args;
mod status;
