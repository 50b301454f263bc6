//! Recommendation runs
//!
//! A run moves through `Idle -> Loaded -> Prepared -> MetricBuilt -> Searching -> Done`.
//! Each transition consumes the previous state, so a dataset handed to the
//! run cannot be observed half-prepared and the metric is always built over
//! the dataset it searches.

use crate::config::{DatasetMode, RecommendConfig};
use crate::output::Recommendations;
use crate::Result;
use std::fmt;
use std::path::Path;
use tonematch_core::{merge, DataSet, FILENAME_DESCRIPTOR, SAMPLE_TYPES};
use tonematch_similarity::{build_metric, find_similar_in, LinearCombination};
use tonematch_storage::load_dataset;
use tonematch_transform::prepare;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Loaded,
    Prepared,
    MetricBuilt,
    Searching,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Loaded => "loaded",
            Stage::Prepared => "prepared",
            Stage::MetricBuilt => "metric-built",
            Stage::Searching => "searching",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

pub trait RunState {
    const STAGE: Stage;
}

pub struct Idle;

/// Global and user points summed into one dataset
pub struct Loaded {
    dataset: DataSet,
    queries: Vec<String>,
}

pub struct Prepared {
    dataset: DataSet,
    queries: Vec<String>,
}

pub struct MetricBuilt {
    dataset: DataSet,
    queries: Vec<String>,
    metric: LinearCombination,
}

impl RunState for Idle {
    const STAGE: Stage = Stage::Idle;
}

impl RunState for Loaded {
    const STAGE: Stage = Stage::Loaded;
}

impl RunState for Prepared {
    const STAGE: Stage = Stage::Prepared;
}

impl RunState for MetricBuilt {
    const STAGE: Stage = Stage::MetricBuilt;
}

pub struct RecommendationRun<'c, S: RunState> {
    config: &'c RecommendConfig,
    state: S,
}

impl<'c, S: RunState> RecommendationRun<'c, S> {
    pub fn stage(&self) -> Stage {
        S::STAGE
    }

    fn with_state(config: &'c RecommendConfig, state: S) -> Self {
        debug!(stage = %S::STAGE, "recommendation run advanced");
        Self { config, state }
    }
}

impl<'c> RecommendationRun<'c, Idle> {
    pub fn new(config: &'c RecommendConfig) -> Self {
        Self { config, state: Idle }
    }

    /// Sum `user` into `global`; the user's points become the queries
    ///
    /// A user point whose identifier already exists in `global` keeps the
    /// global values but is still queried and excluded from every result.
    pub fn load(self, global: DataSet, user: DataSet) -> Result<RecommendationRun<'c, Loaded>> {
        let queries = user.point_ids();
        info!(
            global = global.name(),
            user = user.name(),
            global_points = global.len(),
            user_points = queries.len(),
            "loading datasets"
        );
        let dataset = merge::sum(global, user)?;
        Ok(RecommendationRun::with_state(self.config, Loaded { dataset, queries }))
    }
}

impl<'c> RecommendationRun<'c, Loaded> {
    pub fn dataset(&self) -> &DataSet {
        &self.state.dataset
    }

    pub fn prepare(self) -> Result<RecommendationRun<'c, Prepared>> {
        let config = self.config;
        let Loaded { dataset, queries } = self.state;
        let dataset = prepare(dataset, &config.pipeline_config())?;
        Ok(RecommendationRun::with_state(config, Prepared { dataset, queries }))
    }
}

impl<'c> RecommendationRun<'c, Prepared> {
    pub fn dataset(&self) -> &DataSet {
        &self.state.dataset
    }

    pub fn build_metric(self) -> Result<RecommendationRun<'c, MetricBuilt>> {
        let config = self.config;
        let Prepared { dataset, queries } = self.state;
        let metric = build_metric(dataset.layout(), &config.metric_config())?;
        Ok(RecommendationRun::with_state(
            config,
            MetricBuilt {
                dataset,
                queries,
                metric,
            },
        ))
    }
}

impl<'c> RecommendationRun<'c, MetricBuilt> {
    pub fn metric(&self) -> &LinearCombination {
        &self.state.metric
    }

    /// Recommendations for every user point, labeled by file name
    pub fn search(self) -> Result<Recommendations> {
        let MetricBuilt {
            dataset,
            queries,
            metric,
        } = self.state;
        debug!(stage = %Stage::Searching, queries = queries.len(), "searching");
        let found = find_similar_in(
            &dataset,
            &metric,
            queries.as_slice(),
            self.config.recommended_samples_number,
            FILENAME_DESCRIPTOR,
        )?;
        info!(stage = %Stage::Done, queries = found.len(), "recommendation run finished");
        Ok(Recommendations::from(found))
    }
}

/// Recommend global samples for every point of `user`
pub fn find_similar(global: DataSet, user: DataSet, config: &RecommendConfig) -> Result<Recommendations> {
    RecommendationRun::new(config)
        .load(global, user)?
        .prepare()?
        .build_metric()?
        .search()
}

/// Run the recommender over the per-type datasets stored under `store_root`
///
/// A type without a user dataset has no user samples and is skipped. A type
/// without a global dataset has no reference samples and is skipped too.
pub fn recommend(config: &RecommendConfig, store_root: &Path) -> Result<Recommendations> {
    config.validate()?;
    let mut result = Recommendations::new();
    let mut users = Vec::new();
    let mut globals = Vec::new();

    for ty in SAMPLE_TYPES {
        let user_path = config.user_dataset_path(store_root, ty);
        if !user_path.exists() {
            debug!(bucket = %ty, "no user samples of this type");
            continue;
        }
        let global_path = config.global_dataset_path(store_root, ty);
        if !global_path.exists() {
            warn!(bucket = %ty, path = %global_path.display(), "no reference dataset, skipping bucket");
            continue;
        }

        let user = load_dataset(&user_path)?;
        let global = load_dataset(&global_path)?;
        match config.dataset_mode {
            DatasetMode::Many => {
                info!(bucket = %ty, "recommending within bucket");
                result.extend(find_similar(global, user, config)?);
            }
            DatasetMode::One => {
                users.push(user);
                globals.push(global);
            }
        }
    }

    if config.dataset_mode == DatasetMode::One && !users.is_empty() {
        info!(buckets = users.len(), "recommending across all buckets");
        let user = merge::sum_all(users)?;
        let global = merge::sum_all(globals)?;
        result = find_similar(global, user, config)?;
    }

    info!(mode = %config.dataset_mode, queries = result.len(), "recommendations ready");
    Ok(result)
}
