//! Shared foundational types used across the Tessel transaction system.
//!
//! This crate provides interned identifiers for transaction, method and module
//! names, content hashing for structural netlist comparison, and the internal
//! error type used for invariant violations inside the elaborator.

#![warn(missing_docs)]

pub mod hash;
pub mod ident;
pub mod result;

pub use hash::{ContentHash, ContentHasher};
pub use ident::{Ident, Interner};
pub use result::{InternalError, TesselResult};
