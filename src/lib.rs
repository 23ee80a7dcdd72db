//! Minimal HTTP/1.0 file server.
//!
//! Core library: request handling, path resolution and the accept loop.

pub mod config;
pub mod http;
pub mod server;
