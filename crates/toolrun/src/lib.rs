//! Toolrun - streaming gateway for prompt-templated AI tools
//!
//! This crate provides a daemon that resolves a tool by slug, compiles its
//! prompt template from caller inputs, and relays the upstream model's token
//! stream back to the caller as raw text.

pub mod classifier;
pub mod config;
pub mod error;
pub mod gateway;
pub mod registry;
pub mod template;
pub mod testing;
pub mod upstream;

pub use error::ToolrunError;
