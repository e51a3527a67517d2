//! Core types shared by the comfy-relay crates.
//!
//! This crate provides the error-handling foundation and the strongly-typed
//! identifiers handed out by the generation backend.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{JobId, NodeId, ParseIdError};
