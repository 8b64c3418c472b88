//! Core library for the Whisper speech-to-text server.
//!
//! The binary entry point (`src/main.rs`) is a thin shell around this crate:
//! it resolves configuration, wires up application state, and either runs
//! the `--download` fast path or serves the HTTP surface built here.

pub mod admission;
pub mod audio;
pub mod config;
pub mod engine;
pub mod http;
pub mod models;
pub mod provisioner;
pub mod temp;
