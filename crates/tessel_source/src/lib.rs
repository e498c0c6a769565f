//! Source locations of user declarations.
//!
//! Transactions, methods, call sites and relations are declared from Rust
//! code, so their origin is the caller's file, line and column as captured by
//! `#[track_caller]`. [`SrcLoc`] carries that origin into the graph and from
//! there into every diagnostic.

#![warn(missing_docs)]

pub mod loc;

pub use loc::SrcLoc;
