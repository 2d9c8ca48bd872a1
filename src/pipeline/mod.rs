//! Generation pipeline: request/result model and the pipeline seam.
//!
//! The actual code understanding happens in the external LLM; this module
//! only defines what goes in (a `GenerationRequest`), what comes out (a
//! `GenerationResult`) and the `TestPipeline` capability trait that lets
//! the dispatcher be tested against a deterministic stub.

/// The staged analyze → write → validate crew
pub mod crew;
/// One-shot file-in, file-out runner
pub mod runner;

use crate::llm::LlmError;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Source file missing or unreadable; no pipeline call is made
    #[error("cannot read source file {path}: {source}")]
    Input {
        /// Offending path
        path: String,
        /// Underlying I/O error
        source: std::io::Error,
    },
    /// External LLM call failed (network, provider, malformed output)
    #[error("LLM pipeline failure: {0}")]
    Llm(#[from] LlmError),
    /// The model produced no usable test code
    #[error("pipeline produced no test code")]
    EmptyResult,
    /// Generated tests could not be written to disk
    #[error("cannot write output file {path}: {source}")]
    Output {
        /// Offending path
        path: String,
        /// Underlying I/O error
        source: std::io::Error,
    },
}

/// Kind of tests to generate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    /// Unit tests (default)
    #[default]
    Unit,
    /// Integration tests
    Integration,
    /// End-to-end tests
    E2e,
}

/// Test framework the generated tests target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestFramework {
    /// pytest (default)
    #[default]
    Pytest,
    /// Python stdlib unittest
    Unittest,
    /// Jest (JavaScript/TypeScript)
    Jest,
    /// Mocha (JavaScript)
    Mocha,
}

/// Source language of the submitted code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Python (default)
    #[default]
    Python,
    /// JavaScript
    Javascript,
    /// TypeScript
    Typescript,
}

impl Language {
    /// File extension for generated test files in this language
    #[must_use]
    pub const fn test_file_extension(self) -> &'static str {
        match self {
            Self::Python => "py",
            Self::Javascript => "js",
            Self::Typescript => "ts",
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unit => "unit",
            Self::Integration => "integration",
            Self::E2e => "e2e",
        };
        f.write_str(s)
    }
}

impl fmt::Display for TestFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pytest => "pytest",
            Self::Unittest => "unittest",
            Self::Jest => "jest",
            Self::Mocha => "mocha",
        };
        f.write_str(s)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Python => "python",
            Self::Javascript => "javascript",
            Self::Typescript => "typescript",
        };
        f.write_str(s)
    }
}

/// One test-generation request. Immutable once constructed; consumed by
/// a single pipeline invocation.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// The source code under test
    pub source: String,
    /// Display name of the source (path or a synthetic name for chat input)
    pub source_name: String,
    /// Kind of tests to generate
    pub test_type: TestType,
    /// Framework the tests target
    pub framework: TestFramework,
    /// Language of the source
    pub language: Language,
    /// File to write the result to; `None` keeps it in memory
    pub output_path: Option<PathBuf>,
}

impl GenerationRequest {
    /// Build a request for in-memory source with default options
    #[must_use]
    pub fn for_source(source: String, source_name: String) -> Self {
        Self {
            source,
            source_name,
            test_type: TestType::default(),
            framework: TestFramework::default(),
            language: Language::default(),
            output_path: None,
        }
    }
}

/// Outcome of one successful pipeline invocation
#[derive(Debug, Clone)]
pub struct GenerationResult {
    /// The generated test code (fences already stripped)
    pub tests: String,
    /// Analysis stage output
    pub analysis: String,
    /// Validation stage output
    pub validation: String,
}

/// The capability seam to the external LLM pipeline: one request, one
/// external call chain, one outcome. No retries, no caching.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TestPipeline: Send + Sync {
    /// Run the staged pipeline for one request
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, PipelineError>;
}
