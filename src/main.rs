//! Testsmith entry point: one-shot pipeline runs and the Telegram bot.

use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use testsmith::bot::run_bot;
use testsmith::config::{CrewConfig, Settings};
use testsmith::llm::LlmClient;
use testsmith::pipeline::crew::TestingCrew;
use testsmith::pipeline::runner::PipelineRunner;
use testsmith::pipeline::{GenerationRequest, Language, TestFramework, TestType};
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Bundled example file used by `run --example`.
const EXAMPLE_SOURCE: &str = include_str!("../demos/calculator.py");

#[derive(Parser)]
#[command(name = "testsmith")]
#[command(about = "AI-powered test generation", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Directory holding agents.yaml and tasks.yaml
    #[arg(long, default_value = "config", global = true)]
    config_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate tests for one source file
    Run {
        /// Path to the file to generate tests for
        file: Option<PathBuf>,
        /// Type of tests to generate
        #[arg(short = 't', long = "type", value_enum, default_value_t = TestType::Unit)]
        test_type: TestType,
        /// Test framework to use
        #[arg(short, long, value_enum, default_value_t = TestFramework::Pytest)]
        framework: TestFramework,
        /// Programming language of the source
        #[arg(short, long, value_enum, default_value_t = Language::Python)]
        language: Language,
        /// Output path for generated tests (default: tests/test_<stem>.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Run against the bundled example calculator file
        #[arg(long)]
        example: bool,
    },
    /// Run the Telegram bot
    Bot,
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    let settings = init_settings();

    let result = match cli.command {
        Commands::Run {
            file,
            test_type,
            framework,
            language,
            output,
            example,
        } => {
            run_once(
                settings.as_ref(),
                &cli.config_dir,
                RunOptions {
                    file,
                    test_type,
                    framework,
                    language,
                    output,
                    example,
                },
            )
            .await
        }
        Commands::Bot => run_bot(settings, &cli.config_dir).await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

struct RunOptions {
    file: Option<PathBuf>,
    test_type: TestType,
    framework: TestFramework,
    language: Language,
    output: Option<PathBuf>,
    example: bool,
}

/// Materialize the bundled example calculator so the pipeline has a real
/// file to read, mirroring how a user-supplied path is handled.
fn create_example_file() -> anyhow::Result<PathBuf> {
    let dir = PathBuf::from("demos");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("calculator.py");
    std::fs::write(&path, EXAMPLE_SOURCE)?;
    info!(path = %path.display(), "Created example file");
    Ok(path)
}

async fn run_once(
    settings: &Settings,
    config_dir: &Path,
    opts: RunOptions,
) -> anyhow::Result<()> {
    settings.require_llm_key()?;

    let file = if opts.example {
        create_example_file()?
    } else {
        opts.file
            .ok_or_else(|| anyhow::anyhow!("provide a file path or use --example"))?
    };

    let crew_config = CrewConfig::load(config_dir)?;
    let llm = LlmClient::new(settings)?;

    info!(
        file = %file.display(),
        test_type = %opts.test_type,
        framework = %opts.framework,
        language = %opts.language,
        provider = llm.provider_name(),
        "Starting test generation"
    );

    let crew = TestingCrew::new(llm, crew_config);
    let runner = PipelineRunner::new(Arc::new(crew));

    let request = GenerationRequest {
        source: String::new(),
        source_name: String::new(),
        test_type: opts.test_type,
        framework: opts.framework,
        language: opts.language,
        output_path: opts.output,
    };

    let (output_path, _result) = runner.run_file(&file, request).await?;

    info!(path = %output_path.display(), "Test generation completed");
    if let Some(hint) = run_hint(opts.framework, &output_path) {
        info!("Run tests with: {hint}");
    }
    Ok(())
}

/// Shell command for running the generated tests, for frameworks that
/// have an obvious one.
fn run_hint(framework: TestFramework, output_path: &Path) -> Option<String> {
    match framework {
        TestFramework::Pytest => Some(format!("pytest {} -v", output_path.display())),
        TestFramework::Unittest => Some(format!("python -m unittest {} -v", output_path.display())),
        TestFramework::Jest | TestFramework::Mocha => None,
    }
}
