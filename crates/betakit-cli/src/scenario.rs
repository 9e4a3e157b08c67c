//! Scenario definition loading.
//!
//! Scenarios are externally supplied YAML or JSON files: an ordered list of
//! named steps whose operation names and parameters are opaque to the
//! engine. A file may omit the scenario name, in which case the file stem is
//! used.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use betakit_proto::{Scenario, ScenarioStep};

#[derive(Debug, Deserialize)]
struct ScenarioFile {
    #[serde(default)]
    name: Option<String>,
    steps: Vec<ScenarioStep>,
}

/// Locates and loads the scenario named `name` from `dir`.
///
/// Looks for `<name>.yaml`, `<name>.yml`, then `<name>.json`.
pub fn load_scenario(dir: &Path, name: &str) -> Result<Scenario> {
    let path = find_scenario_file(dir, name)
        .with_context(|| format!("no scenario file for {name:?} under {}", dir.display()))?;
    load_scenario_file(&path, name)
}

fn find_scenario_file(dir: &Path, name: &str) -> Option<PathBuf> {
    ["yaml", "yml", "json"]
        .iter()
        .map(|ext| dir.join(format!("{name}.{ext}")))
        .find(|candidate| candidate.exists())
}

fn load_scenario_file(path: &Path, fallback_name: &str) -> Result<Scenario> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let parsed: ScenarioFile = if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(&content)
            .with_context(|| format!("malformed scenario file {}", path.display()))?
    } else {
        serde_yaml::from_str(&content)
            .with_context(|| format!("malformed scenario file {}", path.display()))?
    };

    if parsed.steps.is_empty() {
        bail!("scenario file {} has no steps", path.display());
    }

    Ok(Scenario::new(
        parsed.name.unwrap_or_else(|| fallback_name.to_string()),
        parsed.steps,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_yaml_scenario() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("onboarding.yaml"),
            r"
name: onboarding
steps:
  - operation: page_load
    parameters:
      path: /signup
  - operation: form_submit
",
        )
        .unwrap();

        let scenario = load_scenario(dir.path(), "onboarding").unwrap();
        assert_eq!(scenario.name, "onboarding");
        assert_eq!(scenario.steps.len(), 2);
        assert_eq!(scenario.steps[0].parameters["path"], "/signup");
    }

    #[test]
    fn test_load_json_scenario_with_fallback_name() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("edgecases.json"),
            r#"{"steps": [{"operation": "giant_upload"}]}"#,
        )
        .unwrap();

        let scenario = load_scenario(dir.path(), "edgecases").unwrap();
        assert_eq!(scenario.name, "edgecases");
        assert_eq!(scenario.steps[0].operation, "giant_upload");
    }

    #[test]
    fn test_missing_scenario_file() {
        let dir = TempDir::new().unwrap();
        let err = load_scenario(dir.path(), "poweruser").unwrap_err();
        assert!(err.to_string().contains("poweruser"));
    }

    #[test]
    fn test_empty_steps_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("empty.yaml"), "steps: []\n").unwrap();
        let err = load_scenario(dir.path(), "empty").unwrap_err();
        assert!(err.to_string().contains("no steps"));
    }
}
