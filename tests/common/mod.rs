//! Common test utilities and helpers
//!
//! This module provides shared test infrastructure including:
//! - Test fixtures and factories
//! - A recording mock signing service

#![allow(dead_code)]

pub mod factories;
pub mod fixtures;
pub mod mocks;

pub use factories::*;
pub use fixtures::*;
pub use mocks::*;
