//! One-shot pipeline runner: file in, generated test file out.

use super::{GenerationRequest, GenerationResult, PipelineError, TestPipeline};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Thin wrapper translating a request into exactly one pipeline invocation
/// and persisting its output. One request, one external call, one outcome.
pub struct PipelineRunner {
    pipeline: Arc<dyn TestPipeline>,
}

impl PipelineRunner {
    /// Create a runner over a pipeline implementation
    #[must_use]
    pub fn new(pipeline: Arc<dyn TestPipeline>) -> Self {
        Self { pipeline }
    }

    /// Run the pipeline for an already-built request.
    ///
    /// On success the tests are written to `request.output_path` when set;
    /// the result is returned in-memory either way.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError` on any pipeline or output failure.
    pub async fn run(&self, request: &GenerationRequest) -> Result<GenerationResult, PipelineError> {
        let result = self.pipeline.generate(request).await?;

        if let Some(path) = &request.output_path {
            write_tests(path, &result.tests)?;
            info!(path = %path.display(), "Tests saved");
        }

        Ok(result)
    }

    /// Read `path`, run the pipeline and write the result.
    ///
    /// When the request carries no explicit output path, the original
    /// naming scheme applies: `src/calc.py` becomes `tests/test_calc.py`.
    /// Returns the path the tests were written to.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Input` without invoking the pipeline when
    /// the file cannot be read, or any downstream pipeline/output error.
    pub async fn run_file(
        &self,
        path: &Path,
        mut request: GenerationRequest,
    ) -> Result<(PathBuf, GenerationResult), PipelineError> {
        request.source = std::fs::read_to_string(path).map_err(|source| PipelineError::Input {
            path: path.display().to_string(),
            source,
        })?;
        request.source_name = path.display().to_string();

        let output_path = request
            .output_path
            .clone()
            .unwrap_or_else(|| default_output_path(path, request.language.test_file_extension()));
        request.output_path = Some(output_path.clone());

        let result = self.run(&request).await?;
        Ok((output_path, result))
    }
}

/// Default output location: `tests/test_<stem>.<ext>` next to the
/// current working directory.
fn default_output_path(source: &Path, extension: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map_or_else(|| "generated".to_string(), |s| s.to_string_lossy().to_string());
    PathBuf::from("tests").join(format!("test_{stem}.{extension}"))
}

fn write_tests(path: &Path, tests: &str) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|source| PipelineError::Output {
                path: path.display().to_string(),
                source,
            })?;
        }
    }
    std::fs::write(path, tests).map_err(|source| PipelineError::Output {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{GenerationRequest, MockTestPipeline};

    fn ok_result() -> GenerationResult {
        GenerationResult {
            tests: "def test_ok():\n    assert True".to_string(),
            analysis: "analysis".to_string(),
            validation: "valid".to_string(),
        }
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("src/calc.py"), "py"),
            PathBuf::from("tests/test_calc.py")
        );
        assert_eq!(
            default_output_path(Path::new("widget.ts"), "ts"),
            PathBuf::from("tests/test_widget.ts")
        );
    }

    #[tokio::test]
    async fn test_missing_file_makes_no_pipeline_call() {
        let mut pipeline = MockTestPipeline::new();
        pipeline.expect_generate().times(0);

        let runner = PipelineRunner::new(Arc::new(pipeline));
        let request = GenerationRequest::for_source(String::new(), String::new());

        let err = runner
            .run_file(Path::new("definitely/not/here.py"), request)
            .await
            .expect_err("missing file must fail");
        assert!(matches!(err, PipelineError::Input { .. }));
    }

    #[tokio::test]
    async fn test_run_file_writes_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source_path = dir.path().join("calc.py");
        std::fs::write(&source_path, "def add(a, b):\n    return a + b\n").expect("write source");
        let output_path = dir.path().join("out").join("test_calc.py");

        let mut pipeline = MockTestPipeline::new();
        pipeline
            .expect_generate()
            .times(1)
            .withf(|req| req.source.contains("def add"))
            .returning(|_| Ok(ok_result()));

        let runner = PipelineRunner::new(Arc::new(pipeline));
        let mut request = GenerationRequest::for_source(String::new(), String::new());
        request.output_path = Some(output_path.clone());

        let (written, result) = runner
            .run_file(&source_path, request)
            .await
            .expect("run succeeds");

        assert_eq!(written, output_path);
        assert_eq!(
            std::fs::read_to_string(&written).expect("read output"),
            result.tests
        );
    }
}
