//! Local control service for a single frpc client process.
//!
//! The service keeps a JSON configuration document, renders it into the INI
//! and TOML files frpc reads, supervises the frpc child process, buffers its
//! output and probes the configured frps server.

pub mod api;
pub mod config;
pub mod materialize;
pub mod probe;
pub mod supervisor;
