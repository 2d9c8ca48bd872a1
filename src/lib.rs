#![deny(missing_docs)]
//! Testsmith core library.
//!
//! Staged LLM pipeline for test generation, with a rate-limited Telegram
//! front end and a one-shot CLI runner sharing the same backend.

/// Telegram bot: dispatcher, handlers, messaging.
pub mod bot;
/// Configuration management (env settings + crew YAML).
pub mod config;
/// LLM providers and client.
pub mod llm;
/// Generation pipeline: request/result types, crew, runner.
pub mod pipeline;
/// Text processing utilities (code extraction, formatting).
pub mod utils;
