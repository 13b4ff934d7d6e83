//! Workflow file discovery, loading, and the starter template.

use gantry_core::Result;
use gantry_core::workflow::WorkflowDefinition;
use std::path::{Path, PathBuf};

/// Starter workflow: lint, a five-version unittest matrix, and a strict
/// docs build for a Python package.
pub const DEFAULT_WORKFLOW: &str = r#"name: ci
on:
  events: [push, pull_request]
  branch: master

jobs:
  - name: lint
    runs_on: ubuntu-latest
    steps:
      - name: lint
        uses: astral-sh/ruff-action@v3
        with:
          src: winappdbg
        continue_on_error: true
      - name: fix check
        run: ruff check --fix
        continue_on_error: true
      - name: format check
        run: ruff format --exit-non-zero-on-format
        continue_on_error: true

  - name: unittest
    runs_on: windows-latest
    environment:
      runtime: "${{ matrix.python }}"
      extras: [disasm, db, search, test]
    matrix:
      key: python
      values: ["3.9", "3.10", "3.11", "3.12", "3.13"]
    steps:
      - name: run tests
        run: pytest tests/

  - name: docs
    runs_on: ubuntu-latest
    environment:
      runtime: "3.12"
      extras: [disasm, db, search, docs]
    steps:
      - name: build docs
        run: sphinx-build -W docs/source docs/build
"#;

/// Find a workflow file in standard locations.
pub fn find_workflow_file(path: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = path {
        if p.exists() {
            return Some(p.to_path_buf());
        }
        return None;
    }

    let candidates = [
        "gantry.yaml",
        "gantry.yml",
        ".gantry/workflow.yaml",
        ".gantry/workflow.yml",
    ];

    for candidate in candidates {
        let path = PathBuf::from(candidate);
        if path.exists() {
            return Some(path);
        }
    }

    None
}

/// Load and parse a workflow file.
pub fn load_workflow(path: &Path) -> Result<WorkflowDefinition> {
    let content = std::fs::read_to_string(path)?;
    let definition: WorkflowDefinition = serde_yaml::from_str(&content)
        .map_err(|e| gantry_core::Error::InvalidWorkflow(e.to_string()))?;
    Ok(definition)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_workflow_parses_and_validates() {
        let wf: WorkflowDefinition = serde_yaml::from_str(DEFAULT_WORKFLOW).unwrap();
        wf.validate().unwrap();

        assert_eq!(wf.jobs.len(), 3);
        assert_eq!(wf.on.branch, "master");

        let unittest = wf.jobs.iter().find(|j| j.name == "unittest").unwrap();
        assert_eq!(unittest.matrix.as_ref().unwrap().values.len(), 5);
        assert_eq!(
            unittest.environment.as_ref().unwrap().extras,
            vec!["disasm", "db", "search", "test"]
        );

        let lint = wf.jobs.iter().find(|j| j.name == "lint").unwrap();
        assert!(lint.steps.iter().all(|s| s.continue_on_error));

        let docs = wf.jobs.iter().find(|j| j.name == "docs").unwrap();
        assert_eq!(docs.environment.as_ref().unwrap().runtime, "3.12");
    }

    #[test]
    fn test_load_workflow_missing_file() {
        assert!(load_workflow(Path::new("/no/such/workflow.yaml")).is_err());
    }

    #[test]
    fn test_find_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wf.yaml");
        std::fs::write(&path, DEFAULT_WORKFLOW).unwrap();

        assert_eq!(find_workflow_file(Some(&path)), Some(path.clone()));
        assert_eq!(find_workflow_file(Some(Path::new("/missing.yaml"))), None);
    }
}
