// Compliance Check Processing Service - API Core
//
// This crate provides the backend for screening submitted marketing content
// against per-organization regulated-claims dictionaries, with AI-backed
// rewriting of violating phrases.
//
// Background work (checks, dictionary re-embedding) runs through the bounded
// dispatcher in kernel/dispatch; progress is pushed to clients over SSE.

pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
