//! # Tether Testkit
//!
//! Test utilities for Tether entity stores.
//!
//! This crate provides:
//! - Sample entities and store constructors
//! - Property-based test generators using proptest
//! - A script runner that checks store invariants after every step
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tether_testkit::prelude::*;
//!
//! #[test]
//! fn scripts_converge() {
//!     let runner = run_script(sample_goals(), &script);
//!     runner.assert_consistent();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod scenario;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::scenario::*;
}

pub use fixtures::*;
pub use generators::*;
pub use scenario::*;
