//! # Blittable Testkit
//!
//! Test utilities for blittable documents.
//!
//! This crate provides:
//! - Fixture documents and pool/context helpers
//! - Property-based JSON generators using proptest
//! - A concurrent read harness for shared documents
//!
//! ## Usage
//!
//! ```rust
//! use blittable_testkit::prelude::*;
//!
//! let mut env = TestEnv::new();
//! let doc = env.encode(&employee_json());
//! let root = doc.reader(env.context()).unwrap();
//! assert_eq!(root.len(), 4);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
