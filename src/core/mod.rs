//! Core domain values for dispatch and scheduling
//!
//! This module defines the fundamental data structures shared by the
//! executor contract and the dispatch protocol.

pub mod context;
pub mod state;

pub use context::*;
pub use state::*;
