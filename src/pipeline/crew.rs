//! The testing crew: a sequential analyze → write tests → validate pipeline.
//!
//! Each stage is one chat completion. The agent's role/goal/backstory from
//! `agents.yaml` becomes the system prompt; the task description from
//! `tasks.yaml`, with its `{placeholder}` slots filled, becomes the user
//! message. Stage outputs feed the next stage as context.

use super::{GenerationRequest, GenerationResult, PipelineError, TestPipeline};
use crate::config::{AgentSpec, CrewConfig, TaskSpec};
use crate::llm::LlmClient;
use crate::utils::extract_tests;
use std::collections::HashMap;
use tracing::{debug, info};

/// Sequential three-stage test-generation crew over a single LLM client.
pub struct TestingCrew {
    llm: LlmClient,
    config: CrewConfig,
}

impl TestingCrew {
    /// Assemble the crew from a client and the loaded crew documents
    #[must_use]
    pub const fn new(llm: LlmClient, config: CrewConfig) -> Self {
        Self { llm, config }
    }

    /// Name of the LLM provider backing this crew
    #[must_use]
    pub const fn provider_name(&self) -> &'static str {
        self.llm.provider_name()
    }

    fn system_prompt(agent: &AgentSpec) -> String {
        format!(
            "You are {role}.\n\nYour goal: {goal}\n\n{backstory}",
            role = agent.role.trim(),
            goal = agent.goal.trim(),
            backstory = agent.backstory.trim(),
        )
    }

    fn user_message(task: &TaskSpec, inputs: &HashMap<&str, String>) -> String {
        let mut description = task.description.clone();
        let mut expected = task.expected_output.trim().to_string();
        for (key, value) in inputs {
            let slot = format!("{{{key}}}");
            description = description.replace(&slot, value);
            expected = expected.replace(&slot, value);
        }
        format!("{description}\n\nExpected output:\n{expected}")
    }

    async fn run_stage(
        &self,
        agent_name: &str,
        task_name: &str,
        inputs: &HashMap<&str, String>,
    ) -> Result<String, PipelineError> {
        let agent = self.config.agent(agent_name);
        let task = self.config.task(task_name);

        debug!(stage = task_name, agent = agent_name, "Running crew stage");

        let output = self
            .llm
            .chat_completion(&Self::system_prompt(agent), &Self::user_message(task, inputs))
            .await?;

        debug!(
            stage = task_name,
            output_chars = output.len(),
            "Crew stage completed"
        );
        Ok(output)
    }
}

#[async_trait::async_trait]
impl TestPipeline for TestingCrew {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, PipelineError> {
        info!(
            source = %request.source_name,
            test_type = %request.test_type,
            framework = %request.framework,
            language = %request.language,
            "Starting test generation"
        );

        let mut inputs: HashMap<&str, String> = HashMap::from([
            ("file_path", request.source_name.clone()),
            ("code_content", request.source.clone()),
            ("test_type", request.test_type.to_string()),
            ("test_framework", request.framework.to_string()),
            ("language", request.language.to_string()),
        ]);

        let analysis = self
            .run_stage("code_analyzer_agent", "analyze_code_task", &inputs)
            .await?;
        inputs.insert("analysis", analysis.clone());

        let raw_tests = self
            .run_stage("qa_test_agent", "write_tests_task", &inputs)
            .await?;
        inputs.insert("tests", raw_tests.clone());

        let validation = self
            .run_stage("test_validator_agent", "validate_tests_task", &inputs)
            .await?;

        let tests = extract_tests(&raw_tests).ok_or(PipelineError::EmptyResult)?;

        info!(
            source = %request.source_name,
            tests_chars = tests.len(),
            "Test generation completed"
        );

        Ok(GenerationResult {
            tests,
            analysis,
            validation,
        })
    }
}
