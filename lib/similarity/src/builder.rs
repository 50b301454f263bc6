//! Composite metric construction
//!
//! The recommender compares samples with three group metrics: Euclidean over
//! the PCA block, Kullback-Leibler over the MFCC Gaussian and weighted Pearson
//! over the high-level tag probabilities. [`MetricConfig`] says where those
//! groups live in the layout and how much each one weighs.

use crate::metric::{DistanceFunction, Euclidean, ExponentialCompress, KullbackLeibler, LinearCombination, WeightedPearson};
use serde::{Deserialize, Serialize};
use tonematch_core::{DescriptorKind, DescriptorType, Error, Layout, Result};
use tracing::debug;

/// Default alpha of the exponential compression
pub const DEFAULT_COMPRESSION_ALPHA: f32 = 0.01;

pub const LOWLEVEL_LABEL: &str = "lowlevel";
pub const TIMBRE_LABEL: &str = "timbre";
pub const HIGHLEVEL_LABEL: &str = "highlevel";

/// Weights of the three group metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricWeights {
    #[serde(default = "default_weight")]
    pub lowlevel: f32,
    #[serde(default = "default_weight")]
    pub timbre: f32,
    #[serde(default = "default_weight")]
    pub highlevel: f32,
}

fn default_weight() -> f32 {
    1.0
}

impl Default for MetricWeights {
    fn default() -> Self {
        Self {
            lowlevel: 1.0,
            timbre: 1.0,
            highlevel: 1.0,
        }
    }
}

impl MetricWeights {
    pub fn new(lowlevel: f32, timbre: f32, highlevel: f32) -> Self {
        Self {
            lowlevel,
            timbre,
            highlevel,
        }
    }

    /// Reject negative or non-finite weights and an all-zero combination
    pub fn validate(&self) -> Result<()> {
        for (label, weight) in self.labeled() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{} weight must be a non-negative number, got {}",
                    label, weight
                )));
            }
        }
        if self.labeled().iter().all(|&(_, w)| w == 0.0) {
            return Err(Error::InvalidConfig("total weight cannot be zero".to_string()));
        }
        Ok(())
    }

    pub fn labeled(&self) -> [(&'static str, f32); 3] {
        [
            (LOWLEVEL_LABEL, self.lowlevel),
            (TIMBRE_LABEL, self.timbre),
            (HIGHLEVEL_LABEL, self.highlevel),
        ]
    }
}

/// Where the metric groups live and how they are combined
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricConfig {
    pub weights: MetricWeights,
    /// Wrap every group metric in `1 - exp(-alpha * d)`
    pub compressed: bool,
    pub alpha: f32,
    pub lowlevel_descriptors: Vec<String>,
    /// Prefix of the `.mean`/`.cov`/`.icov` triple
    pub timbre_prefix: String,
    pub highlevel_patterns: Vec<String>,
}

impl Default for MetricConfig {
    fn default() -> Self {
        Self {
            weights: MetricWeights::default(),
            compressed: true,
            alpha: DEFAULT_COMPRESSION_ALPHA,
            lowlevel_descriptors: vec!["pca".to_string()],
            timbre_prefix: "lowlevel.mfcc".to_string(),
            highlevel_patterns: vec!["highlevel.*.all.*".to_string()],
        }
    }
}

impl MetricConfig {
    pub fn with_weights(mut self, weights: MetricWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn raw(mut self) -> Self {
        self.compressed = false;
        self
    }
}

/// Fixed-length numeric descriptors matching the high-level patterns, each weighted 1.0
pub fn highlevel_weights(layout: &Layout, patterns: &[String]) -> Result<Vec<(String, f32)>> {
    let names = layout.descriptor_names(patterns, &[], Some(DescriptorKind::Real))?;
    Ok(names
        .into_iter()
        .filter(|n| matches!(layout.get(n).map(|d| d.ty), Some(DescriptorType::Real(_))))
        .map(|n| (n, 1.0))
        .collect())
}

/// Build the weighted combination of the three group metrics for `layout`
///
/// Groups with a zero weight are left out entirely, so their descriptors do
/// not need to be present.
pub fn build_metric(layout: &Layout, config: &MetricConfig) -> Result<LinearCombination> {
    config.weights.validate()?;
    let mut combination = LinearCombination::new();

    for (label, weight) in config.weights.labeled() {
        if weight == 0.0 {
            continue;
        }
        let metric: Box<dyn DistanceFunction> = match label {
            LOWLEVEL_LABEL => wrap(Euclidean::new(layout, &config.lowlevel_descriptors)?, config)?,
            TIMBRE_LABEL => wrap(KullbackLeibler::from_prefix(layout, &config.timbre_prefix)?, config)?,
            _ => {
                let weights = highlevel_weights(layout, &config.highlevel_patterns)?;
                debug!(descriptors = weights.len(), "high-level metric descriptors");
                wrap(WeightedPearson::new(layout, &weights)?, config)?
            }
        };
        combination.add(label, weight, metric)?;
    }

    debug!(
        compressed = config.compressed,
        terms = combination.terms().len(),
        "built composite metric"
    );
    Ok(combination)
}

fn wrap<M: DistanceFunction + 'static>(metric: M, config: &MetricConfig) -> Result<Box<dyn DistanceFunction>> {
    if config.compressed {
        Ok(Box::new(ExponentialCompress::new(metric, config.alpha)?))
    } else {
        Ok(Box::new(metric))
    }
}
