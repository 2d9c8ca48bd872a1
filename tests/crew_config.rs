//! Validation of the shipped crew documents.
//!
//! Meta-testing: the prompts are data, so a broken YAML edit should fail
//! here rather than at bot startup.

use std::path::Path;
use testsmith::config::{CrewConfig, REQUIRED_AGENTS, REQUIRED_TASKS};

#[test]
fn shipped_crew_config_loads() {
    let config = CrewConfig::load(Path::new("config")).expect("shipped config must be valid");

    for name in REQUIRED_AGENTS {
        assert!(config.agents.contains_key(*name), "missing agent {name}");
    }
    for name in REQUIRED_TASKS {
        assert!(config.tasks.contains_key(*name), "missing task {name}");
    }
}

#[test]
fn agents_have_nonempty_prompt_fields() {
    let config = CrewConfig::load(Path::new("config")).expect("shipped config must be valid");

    for (name, agent) in &config.agents {
        assert!(!agent.role.trim().is_empty(), "agent {name} has empty role");
        assert!(!agent.goal.trim().is_empty(), "agent {name} has empty goal");
        assert!(
            !agent.backstory.trim().is_empty(),
            "agent {name} has empty backstory"
        );
    }
}

#[test]
fn tasks_reference_expected_placeholders() {
    let config = CrewConfig::load(Path::new("config")).expect("shipped config must be valid");

    let analyze = config.task("analyze_code_task");
    assert!(analyze.description.contains("{code_content}"));
    assert!(analyze.description.contains("{file_path}"));

    let write = config.task("write_tests_task");
    assert!(write.description.contains("{analysis}"));
    assert!(write.description.contains("{test_framework}"));
    assert!(write.description.contains("{test_type}"));

    let validate = config.task("validate_tests_task");
    assert!(validate.description.contains("{tests}"));
}

#[test]
fn tasks_have_expected_output_templates() {
    let config = CrewConfig::load(Path::new("config")).expect("shipped config must be valid");

    for (name, task) in &config.tasks {
        assert!(
            !task.expected_output.trim().is_empty(),
            "task {name} has empty expected_output"
        );
    }
}
