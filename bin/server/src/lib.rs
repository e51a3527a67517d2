//! comfy-relay HTTP server.
//!
//! Exposes the request gateway over HTTP: image generation, queue and
//! history passthrough, and health probes.

pub mod config;
pub mod error;
pub mod routes;
