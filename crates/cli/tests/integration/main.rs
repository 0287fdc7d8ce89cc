//! CLI integration tests.
//!
//! External tools are replaced by shell scripts on an isolated `PATH`.

#![cfg(unix)]

mod common;

mod check_tests;
mod render_tests;
mod validate_tests;
