//! Test utilities.
//!
//! This module provides:
//! - Test data factories for creating valid test fixtures
//! - In-memory repository and gateway mocks
//! - A builder for constructing `AppState` over the mocks

mod app_state_builder;
mod factories;
mod mocks;

pub use app_state_builder::*;
pub use factories::*;
pub use mocks::*;
