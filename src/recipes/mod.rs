//! The recipe gallery and its batch runner.
//!
//! A recipe is a pure function from the loaded datasets to a prepared table
//! and a chart spec. Rendering and writing happen here, once per recipe.

mod bar;
mod boxplot;
mod distribution;
mod line;

use crate::artifact::{save, Artifact, ArtifactOptions, OutputFormat};
use crate::chart::ChartSpec;
use crate::data::Dataset;
use crate::datasets::Sources;
use crate::error::{Error, Result};
use crate::runtime::render_chart;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// A recipe's output before rendering.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub data: Dataset,
    pub spec: ChartSpec,
}

#[derive(Debug, Clone, Copy)]
pub struct Recipe {
    /// File stem of the artifact
    pub name: &'static str,
    pub title: &'static str,
    pub build: fn(&Sources) -> Result<Prepared>,
}

impl Recipe {
    pub fn prepare(&self, sources: &Sources) -> Result<Prepared> {
        (self.build)(sources)
    }
}

/// Every recipe in gallery order.
pub fn all() -> Vec<Recipe> {
    let mut recipes = Vec::new();
    recipes.extend(bar::recipes());
    recipes.extend(boxplot::recipes());
    recipes.extend(line::recipes());
    recipes.extend(distribution::recipes());
    recipes
}

pub fn find(name: &str) -> Option<Recipe> {
    all().into_iter().find(|r| r.name == name)
}

/// Pick recipes by name; an empty list selects the whole gallery.
pub fn select(names: &[String]) -> Result<Vec<Recipe>> {
    if names.is_empty() {
        return Ok(all());
    }
    names
        .iter()
        .map(|n| find(n).ok_or_else(|| Error::InvalidArgument(format!("unknown recipe '{}'", n))))
        .collect()
}

/// Render one recipe to `out_dir/<name>.<ext>`.
pub fn run(
    recipe: &Recipe,
    sources: &Sources,
    out_dir: &Path,
    format: OutputFormat,
    options: &ArtifactOptions,
) -> Result<Artifact> {
    let prepared = recipe.prepare(sources)?;
    let chart = render_chart(&prepared.spec, &prepared.data)?;
    let path = out_dir.join(format!("{}.{}", recipe.name, format.extension()));
    save(&chart, path, options)
}

/// Outcome of one recipe in a batch.
#[derive(Debug)]
pub struct RecipeOutcome {
    pub name: &'static str,
    pub result: Result<Artifact>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<RecipeOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &Artifact> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&'static str, &Error)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.name, e)))
    }

    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }
}

/// Render every recipe independently. A failing recipe is logged and
/// recorded; the others still run. Outcomes keep the input order.
pub fn run_batch(
    recipes: &[Recipe],
    sources: &Sources,
    out_dir: &Path,
    format: OutputFormat,
    options: &ArtifactOptions,
    parallel: bool,
) -> BatchReport {
    let run_one = |recipe: &Recipe| {
        let result = run(recipe, sources, out_dir, format, options);
        match &result {
            Ok(artifact) => info!(recipe = recipe.name, path = %artifact.path.display(), "rendered"),
            Err(e) => error!(recipe = recipe.name, error = %e, "recipe failed"),
        }
        RecipeOutcome {
            name: recipe.name,
            result,
        }
    };

    let outcomes = if parallel {
        recipes.par_iter().map(run_one).collect()
    } else {
        recipes.iter().map(run_one).collect()
    };
    BatchReport { outcomes }
}

/// Gallery settings, loadable from JSON. CLI flags override fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    pub out_dir: PathBuf,
    pub format: OutputFormat,
    pub artifact: ArtifactOptions,
    /// Worker threads; `None` lets rayon decide, `Some(1)` runs sequentially
    pub jobs: Option<usize>,
    /// `false` forces sequential rendering whatever `jobs` says
    pub parallel: bool,
    /// Case table replacing the embedded one
    pub coronavirus: Option<PathBuf>,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("gallery"),
            format: OutputFormat::Png,
            artifact: ArtifactOptions::default(),
            jobs: None,
            parallel: true,
            coronavirus: None,
        }
    }
}

impl GalleryConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidArgument(format!("gallery config: {}", e)))
    }

    /// Whether the batch renders on the rayon pool.
    pub fn runs_parallel(&self) -> bool {
        self.parallel && self.jobs.map_or(true, |n| n > 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_gallery_names_are_unique() {
        let names: Vec<_> = all().iter().map(|r| r.name).collect();
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(names.len(), unique.len());
        assert_eq!(names.len(), 14);
    }

    #[test]
    fn test_every_recipe_prepares() {
        let sources = Sources::builtin().unwrap();
        for recipe in all() {
            let prepared = recipe
                .prepare(&sources)
                .unwrap_or_else(|e| panic!("{} failed: {}", recipe.name, e));
            render_chart(&prepared.spec, &prepared.data)
                .unwrap_or_else(|e| panic!("{} failed to render: {}", recipe.name, e));
        }
    }

    #[test]
    fn test_select_unknown_recipe() {
        assert!(select(&["bar1".to_string()]).is_ok());
        assert!(matches!(select(&["pie1".to_string()]), Err(Error::InvalidArgument(_))));
        assert_eq!(select(&[]).unwrap().len(), all().len());
    }

    #[test]
    fn test_config_defaults() {
        let config = GalleryConfig::from_json(r#"{"format": "svg", "jobs": 2}"#).unwrap();
        assert_eq!(config.format, OutputFormat::Svg);
        assert_eq!(config.jobs, Some(2));
        assert_eq!(config.artifact, ArtifactOptions::default());
        assert!(GalleryConfig::from_json("{\"format\": \"pdf\"}").is_err());
    }

    #[test]
    fn test_single_job_runs_sequentially() {
        assert!(GalleryConfig::default().runs_parallel());
        assert!(GalleryConfig::from_json(r#"{"jobs": 4}"#).unwrap().runs_parallel());
        assert!(!GalleryConfig::from_json(r#"{"jobs": 1}"#).unwrap().runs_parallel());
        assert!(!GalleryConfig::from_json(r#"{"jobs": 4, "parallel": false}"#).unwrap().runs_parallel());
    }

    #[test]
    fn test_untrimmable_output_still_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let sources = Sources::builtin().unwrap();
        let batch = vec![find("bar1").unwrap()];
        let report = run_batch(&batch, &sources, dir.path(), OutputFormat::Svg, &ArtifactOptions::default(), false);
        assert!(report.is_success());
        let artifact = report.succeeded().next().unwrap();
        assert!(matches!(artifact.trim, crate::artifact::TrimOutcome::Unavailable(_)));
    }
}
