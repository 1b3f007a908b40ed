//! Scenario document loading, discovery, and listing.
//!
//! Every `.json` file under a scenario directory is a scenario document.
//! Discovery is sorted so listings and run order are reproducible.
use super::{PreparedScenario, Scenario};
use crate::errors::EngineError;
use crate::util::display_path;
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// A parsed scenario document and where it came from.
#[derive(Debug, Clone)]
pub struct LoadedScenario {
    pub path: PathBuf,
    /// Path relative to the scenario root it was discovered under.
    pub display: String,
    pub scenario: Scenario,
}

impl LoadedScenario {
    pub fn prepare(self) -> PreparedScenario {
        PreparedScenario::new(self.scenario, Some(self.display))
    }
}

/// Job and tag selection applied after loading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioFilter {
    /// Exact job name, compared case-insensitively.
    pub job: Option<String>,
    /// Tags that must all be present on a scenario.
    pub tags: Vec<String>,
}

impl ScenarioFilter {
    pub fn matches(&self, scenario: &Scenario) -> bool {
        if let Some(job) = self.job.as_deref() {
            if !scenario.job.eq_ignore_ascii_case(job) {
                return false;
            }
        }
        self.tags.iter().all(|tag| scenario.tags.contains(tag))
    }

    pub fn is_empty(&self) -> bool {
        self.job.is_none() && self.tags.is_empty()
    }
}

/// Load and validate one scenario document.
pub fn load_scenario_file(path: &Path) -> Result<Scenario> {
    if !path.exists() {
        return Err(EngineError::NotFound {
            path: path.to_path_buf(),
        }
        .into());
    }
    let bytes = fs::read(path).with_context(|| format!("read scenario {}", path.display()))?;
    let scenario: Scenario = serde_json::from_slice(&bytes).map_err(|err| {
        let message = err.to_string();
        match missing_field_regex().captures(&message) {
            Some(captures) => EngineError::MissingField {
                path: path.to_path_buf(),
                field: captures[1].to_string(),
            },
            None => EngineError::Parse {
                path: path.to_path_buf(),
                message,
            },
        }
    })?;
    validate_scenario(&scenario).map_err(|err| EngineError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    Ok(scenario)
}

/// Structural checks serde cannot express.
pub fn validate_scenario(scenario: &Scenario) -> Result<()> {
    if scenario.name.trim().is_empty() {
        return Err(anyhow!("scenario name must not be empty"));
    }
    if scenario.job.trim().is_empty() {
        return Err(anyhow!("scenario {:?} job must not be empty", scenario.name));
    }
    let mut aliases = BTreeSet::new();
    for (idx, step) in scenario.steps.iter().enumerate() {
        if step.command.trim().is_empty() {
            return Err(anyhow!("steps[{idx}] command must not be empty"));
        }
        if let Some(alias) = step.alias.as_deref() {
            if alias.is_empty() || alias.contains(['.', '[', ']']) {
                return Err(anyhow!("steps[{idx}] alias {alias:?} is not a plain name"));
            }
            if !aliases.insert(alias) {
                return Err(anyhow!("steps[{idx}] alias {alias:?} is declared twice"));
            }
        }
    }
    Ok(())
}

/// Every `.json` file under `root`, sorted.
pub fn discover_scenarios(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !root.exists() {
        return Ok(files);
    }
    for entry in fs::read_dir(root).with_context(|| format!("read {}", root.display()))? {
        let entry = entry?;
        let path = entry.path();
        // Symlinked directories are not followed; a link cycle would never end.
        let file_type = entry
            .file_type()
            .with_context(|| format!("stat {}", path.display()))?;
        if file_type.is_dir() {
            files.extend(discover_scenarios(&path)?);
        } else if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Load scenarios from a mix of directories and explicit files, keeping
/// only those the filter accepts. Sources are visited in the order given;
/// a file reached twice is loaded once.
pub fn load_scenarios(sources: &[PathBuf], filter: &ScenarioFilter) -> Result<Vec<LoadedScenario>> {
    let mut seen = BTreeSet::new();
    let mut loaded = Vec::new();
    for source in sources {
        if !source.exists() {
            return Err(EngineError::NotFound {
                path: source.clone(),
            }
            .into());
        }
        let (paths, base) = if source.is_dir() {
            (discover_scenarios(source)?, Some(source.as_path()))
        } else {
            (vec![source.clone()], None)
        };
        for path in paths {
            if !seen.insert(path.clone()) {
                continue;
            }
            let scenario = load_scenario_file(&path)?;
            if !filter.matches(&scenario) {
                tracing::debug!(path = %path.display(), "scenario filtered out");
                continue;
            }
            loaded.push(LoadedScenario {
                display: display_path(&path, base),
                path,
                scenario,
            });
        }
    }
    Ok(loaded)
}

/// One row of a scenario listing.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScenarioSummary {
    pub path: String,
    pub name: String,
    pub job: String,
    pub tags: Vec<String>,
    pub step_count: usize,
    pub has_fixture: bool,
}

/// Scenario inventory with the distinct jobs and tags it covers.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScenarioListing {
    pub total: usize,
    pub total_steps: usize,
    pub jobs: Vec<String>,
    pub tags: Vec<String>,
    pub scenarios: Vec<ScenarioSummary>,
}

/// Summarize loaded scenarios, sorted by path.
pub fn build_listing(loaded: &[LoadedScenario]) -> ScenarioListing {
    let mut jobs = BTreeSet::new();
    let mut tags = BTreeSet::new();
    let mut scenarios: Vec<ScenarioSummary> = loaded
        .iter()
        .map(|entry| {
            jobs.insert(entry.scenario.job.clone());
            tags.extend(entry.scenario.tags.iter().cloned());
            ScenarioSummary {
                path: entry.display.clone(),
                name: entry.scenario.name.clone(),
                job: entry.scenario.job.clone(),
                tags: entry.scenario.tags.iter().cloned().collect(),
                step_count: entry.scenario.steps.len(),
                has_fixture: entry.scenario.fixture.is_some(),
            }
        })
        .collect();
    scenarios.sort_by(|a, b| a.path.cmp(&b.path));
    ScenarioListing {
        total: scenarios.len(),
        total_steps: scenarios.iter().map(|summary| summary.step_count).sum(),
        jobs: jobs.into_iter().collect(),
        tags: tags.into_iter().collect(),
        scenarios,
    }
}

/// Plain-text listing, one scenario per line.
pub fn format_listing(listing: &ScenarioListing) -> String {
    let mut out = String::new();
    for summary in &listing.scenarios {
        let tags = if summary.tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", summary.tags.join(", "))
        };
        out.push_str(&format!(
            "{}  {} ({}; {} steps){}\n",
            summary.path, summary.name, summary.job, summary.step_count, tags
        ));
    }
    out.push_str(&format!(
        "{} scenarios, {} steps, {} jobs\n",
        listing.total,
        listing.total_steps,
        listing.jobs.len()
    ));
    out
}

fn missing_field_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"missing field `([^`]+)`").expect("valid missing field regex"))
}
